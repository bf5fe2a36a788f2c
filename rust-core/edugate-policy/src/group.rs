// SPDX-License-Identifier: PMPL-1.0-or-later
//! Permission Group Registry.
//!
//! A group is a named, ordered bundle of permission keys. Whether a subject
//! satisfies a group is a property of the query ([`GroupMode`]), not of the
//! group: the same bundle can be checked under AND or OR semantics.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};
use crate::permission::PermissionKey;

/// How a group's members are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    /// Every member must be granted (short-circuits on the first denial).
    All,
    /// At least one member must be granted (short-circuits on the first grant).
    Any,
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupMode::All => write!(f, "all"),
            GroupMode::Any => write!(f, "any"),
        }
    }
}

/// A named bundle of permission keys with insertion order preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGroup {
    pub name: String,
    members: Vec<PermissionKey>,
}

impl PermissionGroup {
    /// Create a group; repeated members are dropped, first occurrence wins.
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = PermissionKey>) -> Self {
        let mut seen = HashSet::new();
        let members = members
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn members(&self) -> &[PermissionKey] {
        &self.members
    }

    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// All configured groups, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<String, PermissionGroup>,
}

impl GroupRegistry {
    pub fn from_groups(groups: impl IntoIterator<Item = PermissionGroup>) -> PolicyResult<Self> {
        let mut map = BTreeMap::new();
        for group in groups {
            if map.contains_key(&group.name) {
                return Err(PolicyError::DuplicateGroup(group.name));
            }
            // Re-normalise: deserialised groups bypass `PermissionGroup::new`.
            let group = PermissionGroup::new(group.name, group.members);
            map.insert(group.name.clone(), group);
        }
        Ok(Self { groups: map })
    }

    pub fn get(&self, name: &str) -> Option<&PermissionGroup> {
        self.groups.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
