// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Combination Rule Table and its validator.
//!
//! Two kinds of constraint between permissions are declared here:
//!
//! - **Dependencies**: holding `A` requires also holding every key in
//!   `dependencies[A]`.
//! - **Mutual exclusion**: at most one member of each exclusive set may be
//!   held by the same role.
//!
//! The validator runs at configuration load and in tests, never on the
//! decision path. Violations are returned as [`ConflictRecord`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::permission::PermissionKey;
use crate::role::{Role, RoleKey};

// ---------------------------------------------------------------------------
// Conflict records
// ---------------------------------------------------------------------------

/// The rule a [`ConflictRecord`] violates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictRule {
    /// `permission` is held but some of `requires` are not.
    Dependency {
        permission: PermissionKey,
        requires: BTreeSet<PermissionKey>,
    },
    /// More than one member of an exclusive set is held.
    MutualExclusion { members: BTreeSet<PermissionKey> },
    /// A configuration table references a key missing from the catalog.
    UncataloguedPermission { location: String },
    /// A page policy allows a role that is not defined.
    UndefinedRole { page_path: String, role: RoleKey },
}

impl fmt::Display for ConflictRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictRule::Dependency { permission, .. } => {
                write!(f, "dependency of {}", permission)
            }
            ConflictRule::MutualExclusion { members } => {
                let names: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(f, "mutual exclusion [{}]", names.join(", "))
            }
            ConflictRule::UncataloguedPermission { location } => {
                write!(f, "uncatalogued permission in {}", location)
            }
            ConflictRule::UndefinedRole { page_path, role } => {
                write!(f, "page '{}' allows undefined role '{}'", page_path, role)
            }
        }
    }
}

/// One configuration violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Role whose configuration is at fault, when the conflict is role-scoped.
    pub role: Option<RoleKey>,
    pub rule: ConflictRule,
    /// Keys that triggered the violation (missing dependencies, clashing
    /// exclusive members, or the uncatalogued keys).
    pub conflicting_keys: Vec<PermissionKey>,
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.conflicting_keys.iter().map(ToString::to_string).collect();
        match &self.role {
            Some(role) => write!(f, "role '{}': {} [{}]", role, self.rule, keys.join(", ")),
            None => write!(f, "{} [{}]", self.rule, keys.join(", ")),
        }
    }
}

// ---------------------------------------------------------------------------
// CombinationRules
// ---------------------------------------------------------------------------

/// Declared dependency and mutual-exclusion constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationRules {
    #[serde(default)]
    pub dependencies: BTreeMap<PermissionKey, BTreeSet<PermissionKey>>,
    #[serde(default)]
    pub mutually_exclusive: Vec<BTreeSet<PermissionKey>>,
}

impl CombinationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, permission: PermissionKey, requires: impl IntoIterator<Item = PermissionKey>) -> Self {
        self.dependencies.entry(permission).or_default().extend(requires);
        self
    }

    pub fn exclusive(mut self, members: impl IntoIterator<Item = PermissionKey>) -> Self {
        self.mutually_exclusive.push(members.into_iter().collect());
        self
    }

    /// Check one role's effective set against every declared rule.
    pub fn check_role(&self, role: &Role) -> Vec<ConflictRecord> {
        let effective = role.effective_permissions();
        let mut conflicts = Vec::new();

        for (permission, requires) in &self.dependencies {
            if !effective.contains(permission) {
                continue;
            }
            let missing: Vec<PermissionKey> = requires
                .iter()
                .filter(|dep| !effective.contains(*dep))
                .cloned()
                .collect();
            if !missing.is_empty() {
                conflicts.push(ConflictRecord {
                    role: Some(role.key.clone()),
                    rule: ConflictRule::Dependency {
                        permission: permission.clone(),
                        requires: requires.clone(),
                    },
                    conflicting_keys: missing,
                });
            }
        }

        for members in &self.mutually_exclusive {
            let held: Vec<PermissionKey> = members
                .iter()
                .filter(|key| effective.contains(*key))
                .cloned()
                .collect();
            if held.len() > 1 {
                conflicts.push(ConflictRecord {
                    role: Some(role.key.clone()),
                    rule: ConflictRule::MutualExclusion {
                        members: members.clone(),
                    },
                    conflicting_keys: held,
                });
            }
        }

        conflicts
    }

    /// Every key mentioned anywhere in the table.
    pub fn referenced_keys(&self) -> BTreeSet<&PermissionKey> {
        self.dependencies
            .iter()
            .flat_map(|(key, deps)| std::iter::once(key).chain(deps.iter()))
            .chain(self.mutually_exclusive.iter().flatten())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.mutually_exclusive.is_empty()
    }
}
