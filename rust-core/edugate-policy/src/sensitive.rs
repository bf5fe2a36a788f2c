// SPDX-License-Identifier: PMPL-1.0-or-later
//! Sensitive Operation Gate.
//!
//! Classifies permissions that need an explicit secondary confirmation
//! before a caller acts on a granted decision. The gate only classifies; it
//! never blocks and never prompts.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::permission::{PermissionCatalog, PermissionKey};

/// How a caller must treat a granted permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Act on the grant directly.
    Routine,
    /// Obtain an explicit confirmation first.
    RequiresConfirmation,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Routine => write!(f, "routine"),
            OperationClass::RequiresConfirmation => write!(f, "requires confirmation"),
        }
    }
}

/// Static set of sensitive permission keys.
#[derive(Debug, Clone, Default)]
pub struct SensitiveOperationGate {
    keys: BTreeSet<PermissionKey>,
}

impl SensitiveOperationGate {
    /// Catalog entries flagged `sensitive`, plus any `extra` keys.
    pub fn from_catalog(
        catalog: &PermissionCatalog,
        extra: impl IntoIterator<Item = PermissionKey>,
    ) -> Self {
        let keys = catalog.sensitive_keys().cloned().chain(extra).collect();
        Self { keys }
    }

    pub fn is_sensitive(&self, key: &PermissionKey) -> bool {
        self.keys.contains(key)
    }

    /// Classify a raw key; malformed keys are routine (they are denied anyway).
    pub fn classify(&self, raw: &str) -> OperationClass {
        match PermissionKey::parse(raw) {
            Ok(key) if self.is_sensitive(&key) => OperationClass::RequiresConfirmation,
            _ => OperationClass::Routine,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Permission;

    fn key(raw: &str) -> PermissionKey {
        PermissionKey::parse(raw).unwrap()
    }

    fn gate() -> SensitiveOperationGate {
        let catalog = PermissionCatalog::from_entries(vec![
            Permission::new(key("homework.view"), "View homework"),
            Permission::new(key("homework.delete"), "Delete homework").sensitive(),
            Permission::new(key("family.bind_child"), "Bind a child account"),
        ])
        .unwrap();
        SensitiveOperationGate::from_catalog(&catalog, vec![key("family.bind_child")])
    }

    #[test]
    fn test_catalog_flag_and_extra_keys() {
        let gate = gate();
        assert_eq!(gate.len(), 2);
        assert!(gate.is_sensitive(&key("homework.delete")));
        assert!(gate.is_sensitive(&key("family.bind_child")));
        assert!(!gate.is_sensitive(&key("homework.view")));
    }

    #[test]
    fn test_classify() {
        let gate = gate();
        assert_eq!(gate.classify("homework.delete"), OperationClass::RequiresConfirmation);
        assert_eq!(gate.classify("homework.view"), OperationClass::Routine);
        assert_eq!(gate.classify("garbage"), OperationClass::Routine);
    }
}
