// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory identity directory.
//
// Implements all three collaborator traits over maps held in a tokio
// `RwLock`. Every lookup bumps an atomic counter so tests can assert how
// often the engine reached the directory. Intended for tests, the lint CLI
// and benchmarks.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use edugate_policy::{RoleKey, SubjectAttributes};
use tokio::sync::RwLock;

use crate::error::ProviderError;
use crate::provider::{AttributeProvider, RelationshipResolver, RoleProvider, SubjectId};

#[derive(Debug, Default)]
struct DirectoryState {
    roles: HashMap<SubjectId, RoleKey>,
    attributes: HashMap<SubjectId, SubjectAttributes>,
    /// Guardian → students, consulted by the relationship resolver only.
    guardianships: BTreeMap<SubjectId, BTreeSet<String>>,
}

#[derive(Debug, Default)]
struct Counters {
    role_lookups: AtomicU64,
    attribute_lookups: AtomicU64,
    relationship_lookups: AtomicU64,
}

/// Role, attribute and relationship directory kept in process memory.
///
/// Cloning shares the same underlying state and counters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
    counters: Arc<Counters>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assign_role(&self, subject: impl Into<SubjectId>, role: impl Into<RoleKey>) {
        let mut state = self.state.write().await;
        state.roles.insert(subject.into(), role.into());
    }

    /// Returns the role the subject held, if any.
    pub async fn remove_role(&self, subject: &SubjectId) -> Option<RoleKey> {
        self.state.write().await.roles.remove(subject)
    }

    /// Store the attribute snapshot for `attributes.subject_id`.
    pub async fn set_attributes(&self, attributes: SubjectAttributes) {
        let subject = SubjectId::new(attributes.subject_id.clone());
        self.state.write().await.attributes.insert(subject, attributes);
    }

    /// Record a guardian relationship known only to the resolver.
    pub async fn add_guardianship(&self, guardian: impl Into<SubjectId>, student: impl Into<String>) {
        let mut state = self.state.write().await;
        state
            .guardianships
            .entry(guardian.into())
            .or_default()
            .insert(student.into());
    }

    /// Make every lookup fail with [`ProviderError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn role_lookups(&self) -> u64 {
        self.counters.role_lookups.load(Ordering::SeqCst)
    }

    pub fn attribute_lookups(&self) -> u64 {
        self.counters.attribute_lookups.load(Ordering::SeqCst)
    }

    pub fn relationship_lookups(&self) -> u64 {
        self.counters.relationship_lookups.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.counters.role_lookups.store(0, Ordering::SeqCst);
        self.counters.attribute_lookups.store(0, Ordering::SeqCst);
        self.counters.relationship_lookups.store(0, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ProviderError::Unavailable("in-memory directory offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RoleProvider for InMemoryDirectory {
    async fn get_role(&self, subject: &SubjectId) -> Result<Option<RoleKey>, ProviderError> {
        self.counters.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.state.read().await.roles.get(subject).cloned())
    }
}

#[async_trait]
impl AttributeProvider for InMemoryDirectory {
    /// Subjects without a stored snapshot have empty attributes.
    async fn get_attributes(&self, subject: &SubjectId) -> Result<SubjectAttributes, ProviderError> {
        self.counters.attribute_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .attributes
            .get(subject)
            .cloned()
            .unwrap_or_else(|| SubjectAttributes::new(subject.as_str())))
    }
}

#[async_trait]
impl RelationshipResolver for InMemoryDirectory {
    async fn is_guardian_of(&self, subject: &SubjectId, resource_owner: &str) -> Result<bool, ProviderError> {
        self.counters.relationship_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .guardianships
            .get(subject)
            .is_some_and(|students| students.contains(resource_owner)))
    }
}
