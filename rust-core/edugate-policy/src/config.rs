// SPDX-License-Identifier: PMPL-1.0-or-later
//! Policy configuration loading.
//!
//! The on-disk form is JSON. A [`PolicyConfig`] is the raw, serde-facing
//! document; [`PolicyConfig::compile`] validates it and produces the
//! immutable [`PolicySet`] the engine evaluates against.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combination::CombinationRules;
use crate::condition::ConditionKind;
use crate::error::{PolicyError, PolicyResult};
use crate::group::{GroupRegistry, PermissionGroup};
use crate::page::{PageAccessPolicy, PageAccessTable};
use crate::permission::{Permission, PermissionCatalog, PermissionKey};
use crate::policy::PolicySet;
use crate::role::{Role, RolePolicyMap};
use crate::sensitive::SensitiveOperationGate;

/// Built-in school policy shipped with the crate.
const SCHOOL_POLICY_JSON: &str = include_str!("../config/school_policy.json");

/// A complete, versioned policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub version: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub groups: Vec<PermissionGroup>,
    #[serde(default)]
    pub combination_rules: CombinationRules,
    /// Permission key → built-in condition name (`ownership`,
    /// `guardianship`, `class_membership`).
    #[serde(default)]
    pub dynamic_rules: BTreeMap<PermissionKey, String>,
    #[serde(default)]
    pub pages: Vec<PageAccessPolicy>,
    /// Sensitive keys in addition to the catalog's own `sensitive` flags.
    #[serde(default)]
    pub sensitive: BTreeSet<PermissionKey>,
}

impl PolicyConfig {
    /// An empty document: every query against it is denied.
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            permissions: Vec::new(),
            roles: Vec::new(),
            groups: Vec::new(),
            combination_rules: CombinationRules::default(),
            dynamic_rules: BTreeMap::new(),
            pages: Vec::new(),
            sensitive: BTreeSet::new(),
        }
    }

    /// The built-in student / parent / teacher / admin policy.
    pub fn school_default() -> PolicyResult<Self> {
        Self::from_json_str(SCHOOL_POLICY_JSON)
    }

    pub fn from_json_str(json: &str) -> PolicyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), version = %config.version, "Loaded policy configuration");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> PolicyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate structure (duplicates, condition names) and build the
    /// immutable [`PolicySet`].
    ///
    /// Combination-rule conflicts are *not* errors here; they are reported by
    /// [`PolicySet::validate_role_configuration`].
    pub fn compile(self) -> PolicyResult<PolicySet> {
        let catalog = PermissionCatalog::from_entries(self.permissions)?;
        let roles = RolePolicyMap::from_roles(self.roles)?;
        let groups = GroupRegistry::from_groups(self.groups)?;
        let pages = PageAccessTable::from_policies(self.pages)?;
        let gate = SensitiveOperationGate::from_catalog(&catalog, self.sensitive);

        let mut conditions = BTreeMap::new();
        for (permission, name) in self.dynamic_rules {
            let kind = name
                .parse::<ConditionKind>()
                .map_err(|_| PolicyError::UnknownCondition {
                    permission: permission.to_string(),
                    condition: name.clone(),
                })?;
            conditions.insert(permission, kind);
        }

        Ok(PolicySet {
            version: self.version,
            catalog,
            roles,
            groups,
            combination: self.combination_rules,
            conditions,
            pages,
            gate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleKey;

    const MINIMAL: &str = r#"{
        "version": "test-1",
        "permissions": [
            {"key": "homework.view", "display_name": "View homework"},
            {"key": "homework.delete", "display_name": "Delete homework", "sensitive": true}
        ],
        "roles": [
            {"key": "student", "basic": ["homework.view"], "forbidden": ["homework.delete"]}
        ],
        "dynamic_rules": {"homework.view": "class_membership"}
    }"#;

    #[test]
    fn test_minimal_document_compiles() {
        let set = PolicyConfig::from_json_str(MINIMAL).unwrap().compile().unwrap();
        assert_eq!(set.version(), "test-1");
        assert_eq!(set.catalog().len(), 2);
        assert!(set.roles().contains(&RoleKey::from("student")));
        assert!(set.groups().is_empty());
        assert!(set.pages().is_empty());
        assert_eq!(set.gate().len(), 1);
        assert_eq!(set.conditions().len(), 1);
    }

    #[test]
    fn test_unknown_condition_names_permission() {
        let json = MINIMAL.replace("class_membership", "telepathy");
        let err = PolicyConfig::from_json_str(&json).unwrap().compile().unwrap_err();
        match err {
            PolicyError::UnknownCondition { permission, condition } => {
                assert_eq!(permission, "homework.view");
                assert_eq!(condition, "telepathy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_key_is_a_serialization_error() {
        let json = MINIMAL.replace("\"homework.delete\", \"display_name\"", "\"homework\", \"display_name\"");
        let err = PolicyConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, PolicyError::Serialization(_)));
    }

    #[test]
    fn test_json_roundtrip_preserves_document() {
        let config = PolicyConfig::school_default().unwrap();
        let json = config.to_json_pretty().unwrap();
        assert_eq!(PolicyConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = PolicyConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PolicyError::Io(_)));
    }

    #[test]
    fn test_empty_document_compiles() {
        let set = PolicyConfig::empty("v0").compile().unwrap();
        assert!(set.catalog().is_empty());
        assert!(set.validate_role_configuration().is_empty());
    }
}
