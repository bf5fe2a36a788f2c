// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Permission keys, forbidden-list entries and the permission catalog.
//!
//! A permission key is a structured `(namespace, action)` pair written as
//! `namespace.action` (e.g. `homework.submit`). The namespace is everything
//! before the first dot; the action is the non-empty remainder. Forbidden
//! lists may additionally contain namespace wildcards (`admin.*`), which are
//! modelled as a separate [`ForbiddenEntry`] variant rather than as a key
//! with a magic action.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};

// ---------------------------------------------------------------------------
// PermissionKey
// ---------------------------------------------------------------------------

/// A catalog key of the form `namespace.action`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKey {
    namespace: String,
    action: String,
}

impl PermissionKey {
    /// Build a key from its two halves.
    pub fn new(namespace: impl Into<String>, action: impl Into<String>) -> PolicyResult<Self> {
        let namespace = namespace.into();
        let action = action.into();
        if !valid_namespace(&namespace) || !valid_action(&action) {
            return Err(PolicyError::InvalidPermissionKey(format!(
                "{}.{}",
                namespace, action
            )));
        }
        Ok(Self { namespace, action })
    }

    /// Parse `namespace.action`, splitting on the first dot.
    pub fn parse(raw: &str) -> PolicyResult<Self> {
        let (namespace, action) = raw
            .split_once('.')
            .ok_or_else(|| PolicyError::InvalidPermissionKey(raw.to_string()))?;
        if !valid_namespace(namespace) || !valid_action(action) {
            return Err(PolicyError::InvalidPermissionKey(raw.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            action: action.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// True when this key lives in `namespace`.
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }
}

fn valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && !namespace.contains('.')
        && namespace != "*"
        && !namespace.chars().any(char::is_whitespace)
}

fn valid_action(action: &str) -> bool {
    !action.is_empty()
        && action != "*"
        && !action.starts_with('.')
        && !action.ends_with('.')
        && !action.chars().any(char::is_whitespace)
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.action)
    }
}

impl FromStr for PermissionKey {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionKey> for String {
    fn from(key: PermissionKey) -> Self {
        key.to_string()
    }
}

// ---------------------------------------------------------------------------
// ForbiddenEntry
// ---------------------------------------------------------------------------

/// One entry of a role's forbidden list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ForbiddenEntry {
    /// Revokes exactly one key.
    Exact(PermissionKey),
    /// Revokes every key in a namespace (`namespace.*`).
    Namespace(String),
}

impl ForbiddenEntry {
    pub fn parse(raw: &str) -> PolicyResult<Self> {
        if let Some(namespace) = raw.strip_suffix(".*") {
            if !valid_namespace(namespace) {
                return Err(PolicyError::InvalidForbiddenEntry(raw.to_string()));
            }
            return Ok(ForbiddenEntry::Namespace(namespace.to_string()));
        }
        PermissionKey::parse(raw)
            .map(ForbiddenEntry::Exact)
            .map_err(|_| PolicyError::InvalidForbiddenEntry(raw.to_string()))
    }

    /// Whether this entry revokes `key`.
    pub fn matches(&self, key: &PermissionKey) -> bool {
        match self {
            ForbiddenEntry::Exact(exact) => exact == key,
            ForbiddenEntry::Namespace(namespace) => key.in_namespace(namespace),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, ForbiddenEntry::Namespace(_))
    }
}

impl fmt::Display for ForbiddenEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForbiddenEntry::Exact(key) => write!(f, "{}", key),
            ForbiddenEntry::Namespace(namespace) => write!(f, "{}.*", namespace),
        }
    }
}

impl FromStr for ForbiddenEntry {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ForbiddenEntry {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ForbiddenEntry> for String {
    fn from(entry: ForbiddenEntry) -> Self {
        entry.to_string()
    }
}

impl From<PermissionKey> for ForbiddenEntry {
    fn from(key: PermissionKey) -> Self {
        ForbiddenEntry::Exact(key)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A registered permission: key, human-readable name and sensitivity flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub key: PermissionKey,
    pub display_name: String,
    /// Sensitive permissions require a secondary confirmation by the caller.
    #[serde(default)]
    pub sensitive: bool,
}

impl Permission {
    pub fn new(key: PermissionKey, display_name: impl Into<String>) -> Self {
        Self {
            key,
            display_name: display_name.into(),
            sensitive: false,
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Static registry of every permission the engine knows about.
///
/// Keys absent from the catalog are always denied.
#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    entries: BTreeMap<PermissionKey, Permission>,
}

impl PermissionCatalog {
    /// Build a catalog, rejecting duplicate keys.
    pub fn from_entries(entries: impl IntoIterator<Item = Permission>) -> PolicyResult<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            if map.contains_key(&entry.key) {
                return Err(PolicyError::DuplicatePermission(entry.key.to_string()));
            }
            map.insert(entry.key.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, key: &PermissionKey) -> Option<&Permission> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Resolve a raw key string. Malformed or unregistered keys yield `None`.
    pub fn lookup(&self, raw: &str) -> Option<&Permission> {
        PermissionKey::parse(raw)
            .ok()
            .and_then(|key| self.entries.get(&key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.entries.values()
    }

    /// Keys flagged `sensitive` in the catalog itself.
    pub fn sensitive_keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.entries
            .values()
            .filter(|entry| entry.sensitive)
            .map(|entry| &entry.key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
