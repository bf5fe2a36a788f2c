// SPDX-License-Identifier: PMPL-1.0-or-later
//! EduGate Policy
//!
//! Immutable access-control configuration for the EduGate engine:
//! the permission catalog, per-role tiered grants with forbidden overrides,
//! permission groups, combination rules, page access policies, the
//! sensitive-operation gate and the attribute conditions attached to
//! individual permissions.
//!
//! Everything in this crate is synchronous and side-effect free. A
//! [`PolicyConfig`] is loaded once (usually from JSON), compiled into a
//! [`PolicySet`] and then shared read-only by every evaluator.

pub mod combination;
pub mod condition;
pub mod config;
pub mod error;
pub mod group;
pub mod page;
pub mod permission;
pub mod policy;
pub mod role;
pub mod sensitive;

pub use combination::{CombinationRules, ConflictRecord, ConflictRule};
pub use condition::{
    ClassMembership, ConditionKind, ConditionRegistry, DynamicConditionEvaluator, Guardianship,
    Ownership, ResourceAttributes, SubjectAttributes,
};
pub use config::PolicyConfig;
pub use error::{PolicyError, PolicyResult};
pub use group::{GroupMode, GroupRegistry, PermissionGroup};
pub use page::{normalize_page_path, PageAccessPolicy, PageAccessTable};
pub use permission::{ForbiddenEntry, Permission, PermissionCatalog, PermissionKey};
pub use policy::PolicySet;
pub use role::{PermissionTier, Role, RoleKey, RolePolicyMap, RoleVerdict};
pub use sensitive::{OperationClass, SensitiveOperationGate};
