// SPDX-License-Identifier: PMPL-1.0-or-later
//! EduGate Engine
//!
//! Asynchronous access decisions over an [`edugate_policy::PolicySet`]:
//! role-tier checks with forbidden overrides, attribute conditions, permission
//! groups, page access and sensitive-operation classification, memoized in a
//! TTL decision cache.
//!
//! The engine only suspends while asking a [`RoleProvider`],
//! [`AttributeProvider`] or [`RelationshipResolver`]. Every failure, timeout
//! or unknown key resolves to deny.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edugate_engine::{InMemoryDirectory, RuleEngine, SubjectId};
//! use edugate_policy::PolicyConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Arc::new(InMemoryDirectory::new());
//! directory.assign_role("u1", "teacher").await;
//!
//! let engine = RuleEngine::builder(PolicyConfig::school_default()?)
//!     .with_directory(directory)
//!     .build()?;
//! assert!(engine.has_permission(&SubjectId::from("u1"), "homework.correct").await);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod cache;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod guard;
pub mod memory;
pub mod provider;

pub use audit::{AuditEntry, AuditLog};
pub use cache::{CacheStats, CachedDecision, DecisionCache};
pub use config::EngineConfig;
pub use decision::{Decision, DenyReason, OperationVerdict};
pub use engine::{RuleEngine, RuleEngineBuilder, SessionEvent};
pub use error::{AccessError, AccessResult, ProviderError};
pub use guard::{PageDecision, PageGuard};
pub use memory::InMemoryDirectory;
pub use provider::{AttributeProvider, NoRelationships, RelationshipResolver, RoleProvider, SubjectId};
