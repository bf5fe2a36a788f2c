// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! The compiled, immutable policy.
//!
//! A [`PolicySet`] bundles every configuration table. It is produced by
//! [`PolicyConfig::compile`](crate::PolicyConfig::compile), shared behind an
//! `Arc` and never mutated; a reload builds a fresh one.

use std::collections::BTreeMap;

use tracing::warn;

use crate::combination::{CombinationRules, ConflictRecord, ConflictRule};
use crate::condition::ConditionKind;
use crate::error::{PolicyError, PolicyResult};
use crate::group::GroupRegistry;
use crate::page::PageAccessTable;
use crate::permission::{PermissionCatalog, PermissionKey};
use crate::role::RolePolicyMap;
use crate::sensitive::SensitiveOperationGate;

/// Every configuration table, compiled and read-only.
#[derive(Debug, Clone)]
pub struct PolicySet {
    pub(crate) version: String,
    pub(crate) catalog: PermissionCatalog,
    pub(crate) roles: RolePolicyMap,
    pub(crate) groups: GroupRegistry,
    pub(crate) combination: CombinationRules,
    pub(crate) conditions: BTreeMap<PermissionKey, ConditionKind>,
    pub(crate) pages: PageAccessTable,
    pub(crate) gate: SensitiveOperationGate,
}

impl PolicySet {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn roles(&self) -> &RolePolicyMap {
        &self.roles
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    pub fn combination_rules(&self) -> &CombinationRules {
        &self.combination
    }

    /// Built-in conditions attached by configuration.
    pub fn conditions(&self) -> &BTreeMap<PermissionKey, ConditionKind> {
        &self.conditions
    }

    pub fn pages(&self) -> &PageAccessTable {
        &self.pages
    }

    pub fn gate(&self) -> &SensitiveOperationGate {
        &self.gate
    }

    /// Run the combination-rule validator over every role and cross-check
    /// all tables against the catalog.
    ///
    /// Reports, never fails: callers decide whether conflicts abort a build
    /// step (see [`PolicySet::ensure_consistent`]).
    pub fn validate_role_configuration(&self) -> Vec<ConflictRecord> {
        let mut conflicts = Vec::new();

        for role in self.roles.iter() {
            conflicts.extend(self.combination.check_role(role));

            let uncatalogued: Vec<PermissionKey> = role
                .granted_keys()
                .filter(|key| !self.catalog.contains(key))
                .cloned()
                .collect();
            if !uncatalogued.is_empty() {
                conflicts.push(ConflictRecord {
                    role: Some(role.key.clone()),
                    rule: ConflictRule::UncataloguedPermission {
                        location: format!("role '{}' grants", role.key),
                    },
                    conflicting_keys: uncatalogued,
                });
            }
        }

        for group in self.groups.iter() {
            self.push_uncatalogued(
                &mut conflicts,
                format!("group '{}'", group.name),
                group.members().iter(),
            );
        }

        self.push_uncatalogued(
            &mut conflicts,
            "combination rules".to_string(),
            self.combination.referenced_keys().into_iter(),
        );

        self.push_uncatalogued(
            &mut conflicts,
            "dynamic rules".to_string(),
            self.conditions.keys(),
        );

        self.push_uncatalogued(
            &mut conflicts,
            "sensitive operations".to_string(),
            self.gate.keys(),
        );

        for page in self.pages.iter() {
            self.push_uncatalogued(
                &mut conflicts,
                format!("page '{}'", page.page_path),
                page.required_permissions.iter(),
            );
            for role in page.allowed_roles.iter().flatten() {
                if !self.roles.contains(role) {
                    conflicts.push(ConflictRecord {
                        role: None,
                        rule: ConflictRule::UndefinedRole {
                            page_path: page.page_path.clone(),
                            role: role.clone(),
                        },
                        conflicting_keys: Vec::new(),
                    });
                }
            }
        }

        conflicts
    }

    /// `Err(ConfigurationConflict)` when the validator reports anything.
    pub fn ensure_consistent(&self) -> PolicyResult<()> {
        let conflicts = self.validate_role_configuration();
        if conflicts.is_empty() {
            return Ok(());
        }
        for conflict in &conflicts {
            warn!(version = %self.version, conflict = %conflict, "Policy configuration conflict");
        }
        Err(PolicyError::ConfigurationConflict(conflicts))
    }

    fn push_uncatalogued<'a>(
        &self,
        conflicts: &mut Vec<ConflictRecord>,
        location: String,
        keys: impl Iterator<Item = &'a PermissionKey>,
    ) {
        let missing: Vec<PermissionKey> = keys
            .filter(|key| !self.catalog.contains(key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            conflicts.push(ConflictRecord {
                role: None,
                rule: ConflictRule::UncataloguedPermission { location },
                conflicting_keys: missing,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::role::{PermissionTier, Role, RoleKey};

    fn key(raw: &str) -> PermissionKey {
        PermissionKey::parse(raw).unwrap()
    }

    #[test]
    fn test_school_default_is_consistent() {
        let set = PolicyConfig::school_default().unwrap().compile().unwrap();
        let conflicts = set.validate_role_configuration();
        assert!(conflicts.is_empty(), "unexpected conflicts: {conflicts:?}");
        assert!(set.ensure_consistent().is_ok());
    }

    #[test]
    fn test_missing_dependency_flags_role() {
        let mut config = PolicyConfig::school_default().unwrap();
        config.roles.push(
            Role::new("assistant").grant(PermissionTier::Advanced, vec![key("homework.create")]),
        );
        let set = config.compile().unwrap();
        let conflicts = set.validate_role_configuration();

        let flagged = conflicts.iter().find(|c| c.role == Some(RoleKey::from("assistant")));
        let record = flagged.expect("assistant should be flagged");
        assert!(matches!(record.rule, ConflictRule::Dependency { .. }));
        assert!(record.conflicting_keys.contains(&key("homework.manage")));

        let err = set.ensure_consistent().unwrap_err();
        assert!(matches!(err, PolicyError::ConfigurationConflict(list) if !list.is_empty()));
    }

    #[test]
    fn test_uncatalogued_references_are_reported() {
        let mut config = PolicyConfig::empty("v1");
        config.roles.push(Role::new("ghost").grant(PermissionTier::Basic, vec![key("ghost.haunt")]));
        config
            .dynamic_rules
            .insert(key("ghost.haunt"), "ownership".to_string());
        let set = config.compile().unwrap();
        let conflicts = set.validate_role_configuration();

        assert_eq!(conflicts.len(), 2);
        assert!(conflicts
            .iter()
            .all(|c| matches!(c.rule, ConflictRule::UncataloguedPermission { .. })));
        assert!(conflicts.iter().all(|c| c.conflicting_keys == vec![key("ghost.haunt")]));
    }

    #[test]
    fn test_page_with_undefined_role() {
        let json = r#"{
            "version": "v1",
            "pages": [{"page_path": "secret", "allowed_roles": ["wizard"]}]
        }"#;
        let set = PolicyConfig::from_json_str(json).unwrap().compile().unwrap();
        let conflicts = set.validate_role_configuration();
        assert_eq!(conflicts.len(), 1);
        assert!(matches!(
            &conflicts[0].rule,
            ConflictRule::UndefinedRole { role, .. } if role.as_str() == "wizard"
        ));
    }
}
