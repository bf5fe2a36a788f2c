// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decision audit log.
//
// A bounded ring buffer of recent decisions. When full, the oldest entry is
// dropped. A poisoned lock is recovered rather than propagated: losing the
// audit trail must never turn into a failed decision.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use edugate_policy::RoleKey;
use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::provider::SubjectId;

/// One recorded decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub subject: SubjectId,
    /// Role the decision was made under, when it was resolved.
    pub role: Option<RoleKey>,
    /// The permission as requested, which may not be a valid key.
    pub permission: String,
    pub decision: Decision,
    /// Served from the decision cache.
    pub cached: bool,
}

impl AuditEntry {
    pub fn new(
        subject: &SubjectId,
        role: Option<RoleKey>,
        permission: impl Into<String>,
        decision: Decision,
        cached: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            subject: subject.clone(),
            role,
            permission: permission.into(),
            decision,
            cached,
        }
    }
}

/// Bounded, thread-safe log of recent decisions.
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: Arc<Mutex<VecDeque<AuditEntry>>>,
    max_entries: usize,
}

impl AuditLog {
    /// A log retaining at most `max_entries`. Zero disables recording.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(max_entries.min(4096)))),
            max_entries,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, entry: AuditEntry) {
        if self.max_entries == 0 {
            return;
        }
        let mut entries = self.lock();
        while entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    /// The most recent entries for one subject, newest first.
    pub fn entries_for(&self, subject: &SubjectId, limit: usize) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .rev()
            .filter(|entry| &entry.subject == subject)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DenyReason;

    fn entry(subject: &str, permission: &str, decision: Decision) -> AuditEntry {
        AuditEntry::new(
            &SubjectId::from(subject),
            Some(RoleKey::from("student")),
            permission,
            decision,
            false,
        )
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let log = AuditLog::new(2);
        log.record(entry("u1", "homework.view", Decision::Allow));
        log.record(entry("u1", "homework.submit", Decision::Allow));
        log.record(entry("u1", "homework.correct", Decision::Deny(DenyReason::Forbidden)));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].permission, "homework.submit");
        assert_eq!(entries[1].permission, "homework.correct");
    }

    #[test]
    fn test_entries_for_subject_newest_first() {
        let log = AuditLog::new(10);
        log.record(entry("u1", "homework.view", Decision::Allow));
        log.record(entry("u2", "homework.view", Decision::Allow));
        log.record(entry("u1", "homework.submit", Decision::Allow));

        let mine = log.entries_for(&SubjectId::from("u1"), 5);
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].permission, "homework.submit");
        assert_eq!(log.entries_for(&SubjectId::from("u1"), 1).len(), 1);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let log = AuditLog::new(0);
        log.record(entry("u1", "homework.view", Decision::Allow));
        assert!(log.is_empty());
    }

    #[test]
    fn test_clear() {
        let log = AuditLog::default();
        log.record(entry("u1", "homework.view", Decision::Allow));
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.capacity(), 1_000);
    }
}
