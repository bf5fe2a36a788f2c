// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator contracts consumed by the rule engine.
//
// Role and attribute resolution are the only points where an evaluation may
// suspend. Implementations are expected to be thread-safe (`Send + Sync`)
// and may be slow or unavailable; the engine bounds every call with a
// timeout and treats any failure as deny.

use std::fmt;

use async_trait::async_trait;
use edugate_policy::{RoleKey, SubjectAttributes};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Identity of the user a decision is made for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Resolves the single role a subject currently holds.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// `Ok(None)` when the subject has no role assigned.
    async fn get_role(&self, subject: &SubjectId) -> Result<Option<RoleKey>, ProviderError>;
}

/// Resolves a subject's relationship attributes (children, classes, ...).
#[async_trait]
pub trait AttributeProvider: Send + Sync {
    async fn get_attributes(&self, subject: &SubjectId) -> Result<SubjectAttributes, ProviderError>;
}

/// Answers relationship questions the attribute snapshot may not cover.
#[async_trait]
pub trait RelationshipResolver: Send + Sync {
    /// Whether `subject` is a guardian of the user `resource_owner`.
    async fn is_guardian_of(
        &self,
        subject: &SubjectId,
        resource_owner: &str,
    ) -> Result<bool, ProviderError>;
}

/// Placeholder resolver that knows no relationships.
///
/// Used when the engine is built without a resolver: every fallback lookup
/// answers `false`, so conditions rely on the attribute snapshot alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelationships;

#[async_trait]
impl RelationshipResolver for NoRelationships {
    async fn is_guardian_of(&self, _subject: &SubjectId, _resource_owner: &str) -> Result<bool, ProviderError> {
        Ok(false)
    }
}
