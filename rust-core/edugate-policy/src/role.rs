// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Role Policy Map: per-role permission tiers and forbidden overrides.
//!
//! A role grants permissions in three tiers (basic, advanced, management)
//! and revokes them through a forbidden list. The effective permission set
//! is the union of the tiers minus everything the forbidden list matches.
//! Forbidden always wins, whichever tier the grant came from.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};
use crate::permission::{ForbiddenEntry, PermissionKey};

// ---------------------------------------------------------------------------
// RoleKey
// ---------------------------------------------------------------------------

/// Name of a role (e.g. `student`, `parent`, `teacher`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleKey(String);

impl RoleKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Grant tier a permission was assigned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionTier {
    Basic,
    Advanced,
    Management,
}

impl fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionTier::Basic => write!(f, "basic"),
            PermissionTier::Advanced => write!(f, "advanced"),
            PermissionTier::Management => write!(f, "management"),
        }
    }
}

/// Outcome of checking one permission against one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleVerdict {
    /// Granted by the given tier and not forbidden.
    Granted(PermissionTier),
    /// Matched by the forbidden list (regardless of any grant).
    Forbidden,
    /// Not present in any tier.
    NotGranted,
}

/// A role definition as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub key: RoleKey,
    #[serde(default)]
    pub basic: BTreeSet<PermissionKey>,
    #[serde(default)]
    pub advanced: BTreeSet<PermissionKey>,
    #[serde(default)]
    pub management: BTreeSet<PermissionKey>,
    #[serde(default)]
    pub forbidden: BTreeSet<ForbiddenEntry>,
}

impl Role {
    /// An empty role: no grants, no exclusions.
    pub fn new(key: impl Into<RoleKey>) -> Self {
        Self {
            key: key.into(),
            basic: BTreeSet::new(),
            advanced: BTreeSet::new(),
            management: BTreeSet::new(),
            forbidden: BTreeSet::new(),
        }
    }

    pub fn grant(mut self, tier: PermissionTier, keys: impl IntoIterator<Item = PermissionKey>) -> Self {
        let target = match tier {
            PermissionTier::Basic => &mut self.basic,
            PermissionTier::Advanced => &mut self.advanced,
            PermissionTier::Management => &mut self.management,
        };
        target.extend(keys);
        self
    }

    pub fn forbid(mut self, entries: impl IntoIterator<Item = ForbiddenEntry>) -> Self {
        self.forbidden.extend(entries);
        self
    }

    /// First tier (basic, then advanced, then management) that lists `key`.
    pub fn tier_of(&self, key: &PermissionKey) -> Option<PermissionTier> {
        if self.basic.contains(key) {
            Some(PermissionTier::Basic)
        } else if self.advanced.contains(key) {
            Some(PermissionTier::Advanced)
        } else if self.management.contains(key) {
            Some(PermissionTier::Management)
        } else {
            None
        }
    }

    pub fn is_forbidden(&self, key: &PermissionKey) -> bool {
        self.forbidden.iter().any(|entry| entry.matches(key))
    }

    /// `(basic ∪ advanced ∪ management)` minus every forbidden match.
    ///
    /// Computed fresh on each call; the role itself is never mutated.
    pub fn effective_permissions(&self) -> BTreeSet<PermissionKey> {
        self.granted_keys()
            .filter(|key| !self.is_forbidden(key))
            .cloned()
            .collect()
    }

    /// Every key listed in any tier, including forbidden ones.
    pub fn granted_keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.basic
            .iter()
            .chain(self.advanced.iter())
            .chain(self.management.iter())
    }

    /// Equivalent to membership in [`Role::effective_permissions`], without
    /// materialising the set.
    pub fn verdict(&self, key: &PermissionKey) -> RoleVerdict {
        if self.is_forbidden(key) {
            return RoleVerdict::Forbidden;
        }
        match self.tier_of(key) {
            Some(tier) => RoleVerdict::Granted(tier),
            None => RoleVerdict::NotGranted,
        }
    }
}

// ---------------------------------------------------------------------------
// RolePolicyMap
// ---------------------------------------------------------------------------

/// All role definitions, keyed by role name.
#[derive(Debug, Clone, Default)]
pub struct RolePolicyMap {
    roles: BTreeMap<RoleKey, Role>,
}

impl RolePolicyMap {
    /// Build the map, rejecting empty and duplicate role keys.
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> PolicyResult<Self> {
        let mut map = BTreeMap::new();
        for role in roles {
            if role.key.as_str().trim().is_empty() {
                return Err(PolicyError::InvalidRoleKey(role.key.to_string()));
            }
            if map.contains_key(&role.key) {
                return Err(PolicyError::DuplicateRole(role.key.to_string()));
            }
            map.insert(role.key.clone(), role);
        }
        Ok(Self { roles: map })
    }

    pub fn get(&self, key: &RoleKey) -> Option<&Role> {
        self.roles.get(key)
    }

    pub fn contains(&self, key: &RoleKey) -> bool {
        self.roles.contains_key(key)
    }

    /// `None` when the role is not defined.
    pub fn effective_permissions(&self, key: &RoleKey) -> Option<BTreeSet<PermissionKey>> {
        self.roles.get(key).map(Role::effective_permissions)
    }

    /// `None` when the role is not defined.
    pub fn verdict(&self, role: &RoleKey, permission: &PermissionKey) -> Option<RoleVerdict> {
        self.roles.get(role).map(|r| r.verdict(permission))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RoleKey> {
        self.roles.keys()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
