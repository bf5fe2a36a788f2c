// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! TTL decision cache.
//!
//! Memoizes decisions keyed by `(subject, permission)`. The cache supports:
//!
//! - **Lazy expiry**: an entry older than its TTL is dropped when read.
//! - **Bounded size**: at capacity, expired entries go first, then the
//!   oldest live entry.
//! - **Generations**: every flush bumps a generation counter. An evaluation
//!   records the generation before it starts and its result is discarded if
//!   a flush happened meanwhile, so a reload or invalidation can never be
//!   undone by a slow in-flight lookup.
//! - **Statistics**: hits, misses, evictions and expirations.
//!
//! Time is read from [`tokio::time::Instant`], so tests can drive expiry with
//! a paused clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use edugate_policy::{PermissionKey, RoleKey};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::decision::Decision;
use crate::provider::SubjectId;

/// A decision read back from the cache, with the role it was made under.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDecision {
    pub decision: Decision,
    pub role: Option<RoleKey>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    decision: Decision,
    role: Option<RoleKey>,
    inserted_at: Instant,
    /// Tie-breaker for entries inserted at the same instant.
    seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }

    fn order_key(&self) -> (Instant, u64) {
        (self.inserted_at, self.seq)
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    /// Subject → permission → entry, so one subject can be flushed at once.
    entries: HashMap<SubjectId, HashMap<PermissionKey, CacheEntry>>,
    /// Insertion order index; always holds exactly one key per entry.
    order: BTreeMap<(Instant, u64), (SubjectId, PermissionKey)>,
    next_seq: u64,
}

impl CacheInner {
    fn len(&self) -> usize {
        self.order.len()
    }

    fn clear(&mut self) -> usize {
        let removed = self.len();
        self.entries.clear();
        self.order.clear();
        removed
    }

    fn store(
        &mut self,
        subject: &SubjectId,
        permission: &PermissionKey,
        decision: Decision,
        role: Option<RoleKey>,
        now: Instant,
    ) {
        let entry = CacheEntry {
            decision,
            role,
            inserted_at: now,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.order
            .insert(entry.order_key(), (subject.clone(), permission.clone()));
        let replaced = self
            .entries
            .entry(subject.clone())
            .or_default()
            .insert(permission.clone(), entry);
        if let Some(old) = replaced {
            self.order.remove(&old.order_key());
        }
    }

    fn remove(&mut self, subject: &SubjectId, permission: &PermissionKey) -> bool {
        let Some(per_subject) = self.entries.get_mut(subject) else {
            return false;
        };
        let removed = per_subject.remove(permission);
        if per_subject.is_empty() {
            self.entries.remove(subject);
        }
        match removed {
            Some(entry) => {
                self.order.remove(&entry.order_key());
                true
            }
            None => false,
        }
    }

    fn remove_subject(&mut self, subject: &SubjectId) -> usize {
        let Some(per_subject) = self.entries.remove(subject) else {
            return 0;
        };
        for entry in per_subject.values() {
            self.order.remove(&entry.order_key());
        }
        per_subject.len()
    }

    /// Expired entries form a prefix of `order`, so this stops at the first
    /// live one.
    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut removed = 0;
        while let Some((&(inserted_at, _), _)) = self.order.first_key_value() {
            if now.saturating_duration_since(inserted_at) <= ttl {
                break;
            }
            if self.evict_oldest() {
                removed += 1;
            }
        }
        removed
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, (subject, permission))) = self.order.pop_first() else {
            return false;
        };
        if let Some(per_subject) = self.entries.get_mut(&subject) {
            per_subject.remove(&permission);
            if per_subject.is_empty() {
                self.entries.remove(&subject);
            }
        }
        true
    }
}

/// Aggregate statistics about cache effectiveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Decisions currently stored (live or not yet purged).
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed to make room at capacity.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Number of flushes since construction.
    pub generation: u64,
    /// `hits / (hits + misses)`, or 0.0 before the first lookup.
    pub hit_ratio: f64,
}

/// The decision cache shared by all evaluations of one engine.
#[derive(Debug)]
pub struct DecisionCache {
    ttl: Duration,
    max_entries: usize,
    inner: RwLock<CacheInner>,
    /// Only changed while `inner` is write-locked.
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl DecisionCache {
    /// A cache holding at most `max_entries` decisions (minimum 1) for `ttl`
    /// each.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            inner: RwLock::new(CacheInner::default()),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Current generation. Read it *before* snapshotting policy or calling
    /// providers and hand it back to [`insert`](Self::insert).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The live decision for `(subject, permission)`, if any.
    pub async fn get(&self, subject: &SubjectId, permission: &PermissionKey) -> Option<CachedDecision> {
        let now = Instant::now();
        {
            let inner = self.inner.read().await;
            match inner.entries.get(subject).and_then(|m| m.get(permission)) {
                Some(entry) if !entry.is_expired(now, self.ttl) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(CachedDecision {
                        decision: entry.decision,
                        role: entry.role.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Expired: drop it now unless someone replaced it meanwhile.
        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write().await;
        let still_expired = inner
            .entries
            .get(subject)
            .and_then(|m| m.get(permission))
            .is_some_and(|entry| entry.is_expired(Instant::now(), self.ttl));
        if still_expired && inner.remove(subject, permission) {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    /// Store a decision made under `role`, computed under `generation`.
    ///
    /// Returns `false` (and stores nothing) if the cache was flushed since
    /// `generation` was read.
    pub async fn insert(
        &self,
        subject: &SubjectId,
        permission: &PermissionKey,
        decision: Decision,
        role: Option<RoleKey>,
        generation: u64,
    ) -> bool {
        let mut inner = self.inner.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(subject = %subject, permission = %permission, "Discarding decision from a flushed generation");
            return false;
        }

        let now = Instant::now();
        let present = inner
            .entries
            .get(subject)
            .is_some_and(|m| m.contains_key(permission));

        if !present && inner.len() >= self.max_entries {
            let expired = inner.purge_expired(now, self.ttl);
            self.expirations.fetch_add(expired as u64, Ordering::Relaxed);
            if inner.len() >= self.max_entries && inner.evict_oldest() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        inner.store(subject, permission, decision, role, now);
        true
    }

    /// Drop every entry and start a new generation. Returns the number of
    /// entries removed.
    pub async fn invalidate_all(&self) -> usize {
        self.flush_with(|| ()).await.1
    }

    /// Drop every entry of one subject and start a new generation.
    pub async fn invalidate_subject(&self, subject: &SubjectId) -> usize {
        let mut inner = self.inner.write().await;
        let removed = inner.remove_subject(subject);
        self.generation.fetch_add(1, Ordering::SeqCst);
        removed
    }

    /// Run `swap` while holding the write lock, then clear the cache and
    /// start a new generation.
    ///
    /// No evaluation can read or write the cache between `swap` and the
    /// flush, so replacing the policy inside `swap` is atomic with respect
    /// to in-flight lookups.
    pub async fn flush_with<R>(&self, swap: impl FnOnce() -> R) -> (R, usize) {
        let mut inner = self.inner.write().await;
        let result = swap();
        let removed = inner.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
        (result, removed)
    }

    /// Proactively remove expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let removed = inner.purge_expired(Instant::now(), self.ttl);
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.len().await;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries,
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            generation: self.generation(),
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}
