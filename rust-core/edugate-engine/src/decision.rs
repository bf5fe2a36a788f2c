// SPDX-License-Identifier: PMPL-1.0-or-later
//! Decision values returned by the rule engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The permission key is not in the catalog (or is malformed).
    UnknownPermission,
    /// The subject has no role, or a role the policy does not define.
    UnknownRole,
    /// A forbidden entry of the subject's role matches the permission.
    Forbidden,
    /// No tier of the subject's role grants the permission.
    NotGranted,
    /// A provider failed or timed out.
    ResolutionFailed,
    /// The base grant held but the attached condition did not.
    ConditionFailed,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DenyReason::UnknownPermission => "unknown permission",
            DenyReason::UnknownRole => "unknown role",
            DenyReason::Forbidden => "forbidden",
            DenyReason::NotGranted => "not granted",
            DenyReason::ResolutionFailed => "resolution failed",
            DenyReason::ConditionFailed => "condition failed",
        };
        f.write_str(text)
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }

    /// Transient failures must be retried, not remembered.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Decision::Deny(DenyReason::ResolutionFailed))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Deny(reason) => write!(f, "deny ({reason})"),
        }
    }
}

/// Decision combined with the sensitive-operation classification.
///
/// `ConfirmationRequired` means the caller must obtain an explicit secondary
/// confirmation before acting; the engine never prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationVerdict {
    Denied(DenyReason),
    Permitted,
    ConfirmationRequired,
}

impl OperationVerdict {
    /// Whether the operation may go ahead (possibly after confirmation).
    pub fn is_permitted(&self) -> bool {
        !matches!(self, OperationVerdict::Denied(_))
    }

    pub fn needs_confirmation(&self) -> bool {
        matches!(self, OperationVerdict::ConfirmationRequired)
    }
}
