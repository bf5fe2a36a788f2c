// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for role effective sets and the combination validator

use std::collections::BTreeSet;

use edugate_policy::{
    CombinationRules, ConflictRule, ForbiddenEntry, PermissionKey, PermissionTier, Role,
    RoleVerdict,
};
use proptest::prelude::*;

const NAMESPACES: [&str; 4] = ["homework", "analysis", "admin", "class"];
const ACTIONS: [&str; 5] = ["view", "submit", "create", "manage", "correct"];

/// Generate keys from a small universe so tiers and forbidden lists overlap
fn arb_key() -> impl Strategy<Value = PermissionKey> {
    (0..NAMESPACES.len(), 0..ACTIONS.len())
        .prop_map(|(n, a)| PermissionKey::new(NAMESPACES[n], ACTIONS[a]).unwrap())
}

fn arb_forbidden() -> impl Strategy<Value = ForbiddenEntry> {
    prop_oneof![
        arb_key().prop_map(ForbiddenEntry::Exact),
        (0..NAMESPACES.len()).prop_map(|n| ForbiddenEntry::Namespace(NAMESPACES[n].to_string())),
    ]
}

fn arb_role() -> impl Strategy<Value = Role> {
    (
        prop::collection::btree_set(arb_key(), 0..8),
        prop::collection::btree_set(arb_key(), 0..8),
        prop::collection::btree_set(arb_key(), 0..8),
        prop::collection::btree_set(arb_forbidden(), 0..4),
    )
        .prop_map(|(basic, advanced, management, forbidden)| {
            Role::new("generated")
                .grant(PermissionTier::Basic, basic)
                .grant(PermissionTier::Advanced, advanced)
                .grant(PermissionTier::Management, management)
                .forbid(forbidden)
        })
}

proptest! {
    #[test]
    fn test_forbidden_always_wins(role in arb_role(), key in arb_key()) {
        let effective = role.effective_permissions();
        if role.forbidden.iter().any(|f| f.matches(&key)) {
            prop_assert!(!effective.contains(&key));
            prop_assert_eq!(role.verdict(&key), RoleVerdict::Forbidden);
        }
    }

    #[test]
    fn test_effective_set_is_deterministic(role in arb_role()) {
        prop_assert_eq!(role.effective_permissions(), role.effective_permissions());
        prop_assert_eq!(role.effective_permissions(), role.clone().effective_permissions());
    }

    #[test]
    fn test_verdict_agrees_with_effective_set(role in arb_role(), key in arb_key()) {
        let granted = matches!(role.verdict(&key), RoleVerdict::Granted(_));
        prop_assert_eq!(granted, role.effective_permissions().contains(&key));
    }

    #[test]
    fn test_effective_set_is_subset_of_tiers(role in arb_role()) {
        let tiers: BTreeSet<PermissionKey> = role.granted_keys().cloned().collect();
        prop_assert!(role.effective_permissions().is_subset(&tiers));
    }

    #[test]
    fn test_dependency_violation_is_always_reported(
        role in arb_role(),
        permission in arb_key(),
        dependency in arb_key(),
    ) {
        prop_assume!(permission != dependency);
        let rules = CombinationRules::new().require(permission.clone(), vec![dependency.clone()]);
        let effective = role.effective_permissions();
        let violated = effective.contains(&permission) && !effective.contains(&dependency);

        let reported = rules.check_role(&role).iter().any(|c| {
            matches!(&c.rule, ConflictRule::Dependency { permission: p, .. } if *p == permission)
                && c.conflicting_keys.contains(&dependency)
        });
        prop_assert_eq!(violated, reported);
    }

    #[test]
    fn test_exclusion_reports_only_multiple_holders(role in arb_role(), a in arb_key(), b in arb_key()) {
        prop_assume!(a != b);
        let rules = CombinationRules::new().exclusive(vec![a.clone(), b.clone()]);
        let effective = role.effective_permissions();
        let both = effective.contains(&a) && effective.contains(&b);
        prop_assert_eq!(both, !rules.check_role(&role).is_empty());
    }
}
