// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page access guard.
//
// A pure decision function over the page access table. Redirects, error
// pages and session refresh belong to the routing layer.
//
//   unregistered path  → allow
//   public             → allow
//   role not listed    → deny
//   every required permission allowed → allow, otherwise deny
//
// A failed role lookup is a deny.

use std::sync::Arc;

use edugate_policy::{normalize_page_path, PermissionKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::RuleEngine;
use crate::provider::SubjectId;

/// Why a page was admitted or refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageDecision {
    /// No policy is registered for the path.
    Unregistered,
    Public,
    /// Role admitted and every required permission held.
    Granted,
    RoleNotAllowed,
    /// The first required permission the subject lacks.
    MissingPermission(PermissionKey),
    /// The subject's role could not be resolved.
    ResolutionFailed,
}

impl PageDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(
            self,
            PageDecision::Unregistered | PageDecision::Public | PageDecision::Granted
        )
    }
}

/// Decides page access for subjects against the engine's active policy.
#[derive(Debug, Clone)]
pub struct PageGuard {
    engine: Arc<RuleEngine>,
}

impl PageGuard {
    pub fn new(engine: Arc<RuleEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<RuleEngine> {
        &self.engine
    }

    pub async fn check_page_access(&self, subject: &SubjectId, page_path: &str) -> bool {
        self.evaluate(subject, page_path).await.is_allowed()
    }

    /// Full decision for `page_path` (normalized before lookup).
    pub async fn evaluate(&self, subject: &SubjectId, page_path: &str) -> PageDecision {
        let policy = self.engine.policy();
        let path = normalize_page_path(page_path);
        let Some(page) = policy.pages().lookup(path) else {
            debug!(subject = %subject, page = %path, "No page policy registered");
            return PageDecision::Unregistered;
        };
        if page.public {
            return PageDecision::Public;
        }

        if page.allowed_roles.is_some() {
            let role = match self.engine.resolve_role(subject).await {
                Ok(role) => role,
                Err(e) => {
                    warn!(subject = %subject, page = %path, error = %e, "Page DENIED: role resolution failed");
                    return PageDecision::ResolutionFailed;
                }
            };
            if !role.as_ref().is_some_and(|role| page.admits_role(role)) {
                info!(subject = %subject, page = %path, role = ?role, "Page DENIED: role not allowed");
                return PageDecision::RoleNotAllowed;
            }
        }

        for required in &page.required_permissions {
            if !self.engine.decide_key(subject, required).await.is_allowed() {
                info!(subject = %subject, page = %path, permission = %required, "Page DENIED: missing permission");
                return PageDecision::MissingPermission(required.clone());
            }
        }

        debug!(subject = %subject, page = %path, "Page access granted");
        PageDecision::Granted
    }

    /// Registered page paths the subject may open, in path order.
    pub async fn accessible_pages(&self, subject: &SubjectId) -> Vec<String> {
        let policy = self.engine.policy();
        let mut pages = Vec::new();
        for page in policy.pages().iter() {
            if self.evaluate(subject, &page.page_path).await.is_allowed() {
                pages.push(page.page_path.clone());
            }
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDirectory;
    use edugate_policy::PolicyConfig;

    async fn guard() -> (PageGuard, InMemoryDirectory) {
        let directory = InMemoryDirectory::new();
        directory.assign_role("s1", "student").await;
        directory.assign_role("p1", "parent").await;
        directory.assign_role("t1", "teacher").await;
        directory.assign_role("a1", "admin").await;
        let engine = RuleEngine::builder(PolicyConfig::school_default().unwrap())
            .with_directory(Arc::new(directory.clone()))
            .build()
            .unwrap();
        (PageGuard::new(Arc::new(engine)), directory)
    }

    fn subject(id: &str) -> SubjectId {
        SubjectId::from(id)
    }

    #[tokio::test]
    async fn test_allowed_roles_exclude_parent() {
        let (guard, _) = guard().await;
        assert_eq!(
            guard.evaluate(&subject("p1"), "homework/submit").await,
            PageDecision::RoleNotAllowed
        );
        assert!(guard.check_page_access(&subject("s1"), "homework/submit").await);
    }

    #[tokio::test]
    async fn test_public_and_unregistered_pages() {
        let (guard, _) = guard().await;
        assert_eq!(guard.evaluate(&subject("nobody"), "/login").await, PageDecision::Public);
        assert_eq!(
            guard.evaluate(&subject("nobody"), "some/other/page").await,
            PageDecision::Unregistered
        );
    }

    #[tokio::test]
    async fn test_missing_permission_is_reported() {
        let (guard, _) = guard().await;
        assert_eq!(
            guard.evaluate(&subject("s1"), "homework/correct?id=7").await,
            PageDecision::MissingPermission(PermissionKey::parse("homework.correct").unwrap())
        );
        assert!(guard.check_page_access(&subject("t1"), "/homework/correct/").await);
    }

    #[tokio::test]
    async fn test_role_failure_denies_page() {
        let (guard, directory) = guard().await;
        directory.set_unavailable(true);
        assert_eq!(
            guard.evaluate(&subject("a1"), "admin/users").await,
            PageDecision::ResolutionFailed
        );
        assert!(!guard.check_page_access(&subject("t1"), "homework/list").await);
    }

    #[tokio::test]
    async fn test_accessible_pages_for_parent() {
        let (guard, _) = guard().await;
        let pages = guard.accessible_pages(&subject("p1")).await;
        assert!(pages.contains(&"analysis/child".to_string()));
        assert!(pages.contains(&"family/bind".to_string()));
        assert!(pages.contains(&"index".to_string()));
        assert!(!pages.contains(&"homework/submit".to_string()));
        assert!(!pages.contains(&"admin/users".to_string()));
    }
}
