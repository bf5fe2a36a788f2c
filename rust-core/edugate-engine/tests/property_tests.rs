// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for engine decisions: forbidden precedence, group
//! AND/OR laws and dynamic narrowing.

use std::sync::Arc;

use edugate_engine::{InMemoryDirectory, RuleEngine, SubjectId};
use edugate_policy::{
    ForbiddenEntry, PermissionGroup, PermissionKey, PolicyConfig, ResourceAttributes,
    SubjectAttributes,
};
use proptest::prelude::*;

const ROLES: [&str; 4] = ["student", "parent", "teacher", "admin"];

fn school_keys() -> Vec<PermissionKey> {
    PolicyConfig::school_default()
        .unwrap()
        .permissions
        .into_iter()
        .map(|p| p.key)
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn engine_for(config: PolicyConfig, role: &str, attributes: SubjectAttributes) -> RuleEngine {
    let directory = InMemoryDirectory::new();
    directory.assign_role("u", role).await;
    directory.set_attributes(attributes).await;
    RuleEngine::builder(config)
        .with_directory(Arc::new(directory))
        .build()
        .unwrap()
}

fn arb_key() -> impl Strategy<Value = PermissionKey> {
    let keys = school_keys();
    (0..keys.len()).prop_map(move |i| keys[i].clone())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_forbidden_entry_denies_regardless_of_tier(
        role_index in 0..ROLES.len(),
        permission in arb_key(),
        wildcard in any::<bool>(),
    ) {
        let role = ROLES[role_index];
        let mut config = PolicyConfig::school_default().unwrap();
        let entry = if wildcard {
            ForbiddenEntry::Namespace(permission.namespace().to_string())
        } else {
            ForbiddenEntry::Exact(permission.clone())
        };
        for r in config.roles.iter_mut().filter(|r| r.key.as_str() == role) {
            r.basic.insert(permission.clone());
            r.forbidden.insert(entry.clone());
        }

        let allowed = runtime().block_on(async {
            let engine = engine_for(config, role, SubjectAttributes::new("u")).await;
            engine.has_permission(&SubjectId::from("u"), &permission.to_string()).await
        });
        prop_assert!(!allowed);
    }

    #[test]
    fn test_group_laws_match_member_decisions(
        role_index in 0..ROLES.len(),
        members in prop::collection::vec(arb_key(), 0..6),
    ) {
        let role = ROLES[role_index];
        let mut config = PolicyConfig::school_default().unwrap();
        config.groups.push(PermissionGroup::new("generated", members.clone()));

        let (all, any, individual) = runtime().block_on(async {
            let engine = engine_for(config, role, SubjectAttributes::new("u")).await;
            let user = SubjectId::from("u");
            let all = engine.has_permission_group(&user, "generated").await.unwrap();
            let any = engine.has_any_permission_in_group(&user, "generated").await.unwrap();
            let mut individual = Vec::new();
            for member in &members {
                individual.push(engine.has_permission(&user, &member.to_string()).await);
            }
            (all, any, individual)
        });

        prop_assert_eq!(all, individual.iter().all(|allowed| *allowed));
        prop_assert_eq!(any, individual.iter().any(|allowed| *allowed));
    }

    #[test]
    fn test_dynamic_check_implies_base_grant(
        role_index in 0..ROLES.len(),
        permission in arb_key(),
        child_matches in any::<bool>(),
        class_matches in any::<bool>(),
        owner_matches in any::<bool>(),
    ) {
        let role = ROLES[role_index];
        let attributes = SubjectAttributes::new("u")
            .with_children(["c1"])
            .with_classes(["7b"]);
        let resource = ResourceAttributes {
            owner_id: Some(if owner_matches { "u" } else { "someone" }.to_string()),
            student_id: Some(if child_matches { "c1" } else { "c2" }.to_string()),
            class_id: Some(if class_matches { "7b" } else { "9z" }.to_string()),
            ..ResourceAttributes::default()
        };

        let (base, dynamic) = runtime().block_on(async {
            let engine = engine_for(PolicyConfig::school_default().unwrap(), role, attributes).await;
            let user = SubjectId::from("u");
            let raw = permission.to_string();
            let base = engine.has_permission(&user, &raw).await;
            let dynamic = engine.check_dynamic_permission(&user, &raw, &resource).await;
            (base, dynamic)
        });

        prop_assert!(!dynamic || base);
    }
}
