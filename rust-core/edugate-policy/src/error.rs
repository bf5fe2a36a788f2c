// SPDX-License-Identifier: PMPL-1.0-or-later
//! Policy configuration error types.

use thiserror::Error;

use crate::combination::ConflictRecord;

/// Errors raised while loading or compiling a policy configuration.
///
/// None of these are produced on the decision path: once a
/// [`PolicySet`](crate::PolicySet) exists, lookups are infallible.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("invalid permission key '{0}': expected namespace.action")]
    InvalidPermissionKey(String),

    #[error("invalid forbidden entry '{0}': expected namespace.action or namespace.*")]
    InvalidForbiddenEntry(String),

    #[error("invalid role key '{0}'")]
    InvalidRoleKey(String),

    #[error("duplicate permission in catalog: {0}")]
    DuplicatePermission(String),

    #[error("duplicate role definition: {0}")]
    DuplicateRole(String),

    #[error("duplicate permission group: {0}")]
    DuplicateGroup(String),

    #[error("duplicate page policy: {0}")]
    DuplicatePage(String),

    #[error("unknown dynamic condition '{condition}' attached to {permission}")]
    UnknownCondition { permission: String, condition: String },

    #[error("{} configuration conflict(s) detected", .0.len())]
    ConfigurationConflict(Vec<ConflictRecord>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type PolicyResult<T> = Result<T, PolicyError>;
