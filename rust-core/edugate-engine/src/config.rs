// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Runtime settings for the rule engine.
//
// Defaults suit an interactive client session. Every field can be overridden
// from the environment:
//
//   EDUGATE_CACHE_TTL_SECS      decision cache TTL (seconds)
//   EDUGATE_CACHE_MAX_ENTRIES   decision cache capacity
//   EDUGATE_RESOLVE_TIMEOUT_MS  per-call timeout for role/attribute providers
//   EDUGATE_AUDIT_CAPACITY      decisions kept in the audit ring buffer
//   EDUGATE_STRICT_CONFIG       reject configurations with conflicts (true/false)

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AccessError, AccessResult};

/// Tunables for [`RuleEngine`](crate::RuleEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lifetime of a cached decision.
    pub cache_ttl_seconds: u64,
    /// Maximum number of cached decisions.
    pub cache_max_entries: usize,
    /// Upper bound on a single provider call. Expiry is a deny.
    pub resolve_timeout_ms: u64,
    /// Number of recent decisions retained by the audit log.
    pub audit_capacity: usize,
    /// Fail construction and reload when the validator reports conflicts.
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            cache_max_entries: 10_000,
            resolve_timeout_ms: 2_000,
            audit_capacity: 1_000,
            strict: false,
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    /// Defaults overridden by `EDUGATE_*` environment variables.
    pub fn from_env() -> AccessResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Unset or empty variables keep the default; unparsable values are an
    /// [`AccessError::InvalidConfig`].
    pub fn from_lookup<F>(lookup: F) -> AccessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ttl) = parse_var(&lookup, "EDUGATE_CACHE_TTL_SECS")? {
            config.cache_ttl_seconds = ttl;
        }
        if let Some(max) = parse_var(&lookup, "EDUGATE_CACHE_MAX_ENTRIES")? {
            config.cache_max_entries = max;
        }
        if let Some(timeout) = parse_var(&lookup, "EDUGATE_RESOLVE_TIMEOUT_MS")? {
            config.resolve_timeout_ms = timeout;
        }
        if let Some(capacity) = parse_var(&lookup, "EDUGATE_AUDIT_CAPACITY")? {
            config.audit_capacity = capacity;
        }
        if let Some(strict) = parse_var(&lookup, "EDUGATE_STRICT_CONFIG")? {
            config.strict = strict;
        }

        config.validate()?;
        debug!(?config, "Engine configuration resolved");
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> AccessResult<()> {
        if self.cache_max_entries == 0 {
            return Err(AccessError::InvalidConfig(
                "cache_max_entries must be at least 1".to_string(),
            ));
        }
        if self.resolve_timeout_ms == 0 {
            return Err(AccessError::InvalidConfig(
                "resolve_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> AccessResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AccessError::InvalidConfig(format!("{name}={raw}: {e}"))),
        _ => Ok(None),
    }
}
