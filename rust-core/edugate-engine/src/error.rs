// SPDX-License-Identifier: PMPL-1.0-or-later
//! Engine error types.
//!
//! Decision APIs (`has_permission`, `decide`, `check_page_access`, ...) never
//! return these: an unknown key, an unknown role or a failed lookup resolves
//! to deny. Only construction, reload and group queries surface an
//! [`AccessError`] to the caller.

use edugate_policy::{ConflictRecord, PolicyError};
use thiserror::Error;

/// Errors surfaced by the rule engine.
#[derive(Error, Debug)]
pub enum AccessError {
    /// Part of the error taxonomy for tooling. Decision APIs never return
    /// it; they deny with [`DenyReason::UnknownPermission`](crate::DenyReason::UnknownPermission).
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    /// Returned by tooling that inspects a role by name. Decision APIs never
    /// return it; they deny with [`DenyReason::UnknownRole`](crate::DenyReason::UnknownRole).
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// Asked for a group that is not configured. A caller bug, kept
    /// distinct from a group that evaluates to `false`.
    #[error("unknown permission group: {0}")]
    UnknownGroup(String),

    #[error("attribute resolution failed for subject '{subject}': {reason}")]
    AttributeResolutionFailed { subject: String, reason: String },

    #[error("role resolution failed for subject '{subject}': {reason}")]
    RoleResolutionFailed { subject: String, reason: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },

    #[error("{} configuration conflict(s) detected", .0.len())]
    ConfigurationConflict(Vec<ConflictRecord>),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Errors reported by role, attribute and relationship providers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("subject not found: {0}")]
    NotFound(String),

    #[error("provider error: {0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type AccessResult<T> = Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = AccessError::Timeout {
            operation: "role lookup",
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "role lookup timed out after 250ms");
    }

    #[test]
    fn test_policy_error_is_transparent() {
        let err: AccessError = PolicyError::DuplicateRole("teacher".to_string()).into();
        assert_eq!(err.to_string(), "duplicate role definition: teacher");
        assert!(matches!(err, AccessError::Policy(_)));
    }

    #[test]
    fn test_unknown_key_messages() {
        assert_eq!(
            AccessError::UnknownRole("wizard".to_string()).to_string(),
            "unknown role: wizard"
        );
        assert_eq!(
            AccessError::UnknownPermission("homework.teleport".to_string()).to_string(),
            "unknown permission: homework.teleport"
        );
    }

    #[test]
    fn test_conflict_count_in_message() {
        let err = AccessError::ConfigurationConflict(Vec::new());
        assert_eq!(err.to_string(), "0 configuration conflict(s) detected");
    }
}
