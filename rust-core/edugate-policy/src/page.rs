// SPDX-License-Identifier: PMPL-1.0-or-later
//! Page Access Policy Table.
//!
//! Maps logical screens to the permissions and roles needed to open them.
//! The decision itself is made by the engine's page guard; this module only
//! stores and looks up the policies.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};
use crate::permission::PermissionKey;
use crate::role::RoleKey;

/// Access requirements for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAccessPolicy {
    pub page_path: String,
    /// Every listed permission must be granted.
    #[serde(default)]
    pub required_permissions: Vec<PermissionKey>,
    /// When set, only these roles may open the page.
    #[serde(default)]
    pub allowed_roles: Option<BTreeSet<RoleKey>>,
    /// Public pages skip every other check.
    #[serde(default)]
    pub public: bool,
}

impl PageAccessPolicy {
    pub fn new(page_path: impl Into<String>) -> Self {
        Self {
            page_path: page_path.into(),
            required_permissions: Vec::new(),
            allowed_roles: None,
            public: false,
        }
    }

    pub fn public(page_path: impl Into<String>) -> Self {
        Self {
            public: true,
            ..Self::new(page_path)
        }
    }

    pub fn require(mut self, keys: impl IntoIterator<Item = PermissionKey>) -> Self {
        self.required_permissions.extend(keys);
        self
    }

    pub fn allow_roles(mut self, roles: impl IntoIterator<Item = RoleKey>) -> Self {
        self.allowed_roles
            .get_or_insert_with(BTreeSet::new)
            .extend(roles);
        self
    }

    /// Role restriction check; pages without `allowed_roles` admit any role.
    pub fn admits_role(&self, role: &RoleKey) -> bool {
        self.allowed_roles
            .as_ref()
            .map_or(true, |roles| roles.contains(role))
    }
}

/// Strip query string, fragment and surrounding slashes.
///
/// `/homework/submit/?id=3` and `homework/submit` name the same page.
pub fn normalize_page_path(raw: &str) -> &str {
    let end = raw.find(|c| c == '?' || c == '#').unwrap_or(raw.len());
    raw[..end].trim_matches('/')
}

/// All page policies, keyed by normalised path.
#[derive(Debug, Clone, Default)]
pub struct PageAccessTable {
    pages: BTreeMap<String, PageAccessPolicy>,
}

impl PageAccessTable {
    pub fn from_policies(policies: impl IntoIterator<Item = PageAccessPolicy>) -> PolicyResult<Self> {
        let mut pages = BTreeMap::new();
        for mut policy in policies {
            let path = normalize_page_path(&policy.page_path).to_string();
            if pages.contains_key(&path) {
                return Err(PolicyError::DuplicatePage(path));
            }
            policy.page_path = path.clone();
            pages.insert(path, policy);
        }
        Ok(Self { pages })
    }

    /// `None` means the page carries no special policy.
    pub fn lookup(&self, page_path: &str) -> Option<&PageAccessPolicy> {
        self.pages.get(normalize_page_path(page_path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageAccessPolicy> {
        self.pages.values()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_page_path() {
        assert_eq!(normalize_page_path("homework/submit"), "homework/submit");
        assert_eq!(normalize_page_path("/homework/submit/"), "homework/submit");
        assert_eq!(normalize_page_path("/homework/submit?id=42"), "homework/submit");
        assert_eq!(normalize_page_path("analysis/child#chart"), "analysis/child");
        assert_eq!(normalize_page_path("/"), "");
    }

    #[test]
    fn test_lookup_uses_normalised_path() {
        let table = PageAccessTable::from_policies(vec![
            PageAccessPolicy::new("/homework/submit").allow_roles(vec![RoleKey::from("student")]),
            PageAccessPolicy::public("login"),
        ])
        .unwrap();

        let page = table.lookup("homework/submit?draft=1").unwrap();
        assert_eq!(page.page_path, "homework/submit");
        assert!(page.admits_role(&RoleKey::from("student")));
        assert!(!page.admits_role(&RoleKey::from("parent")));

        assert!(table.lookup("/login/").unwrap().public);
        assert!(table.lookup("settings").is_none());
    }

    #[test]
    fn test_duplicate_after_normalisation_is_rejected() {
        let result = PageAccessTable::from_policies(vec![
            PageAccessPolicy::public("login"),
            PageAccessPolicy::public("/login/"),
        ]);
        assert!(matches!(result, Err(PolicyError::DuplicatePage(p)) if p == "login"));
    }

    #[test]
    fn test_page_without_role_restriction_admits_all() {
        let page = PageAccessPolicy::new("profile");
        assert!(page.admits_role(&RoleKey::from("anyone")));
    }

    #[test]
    fn test_deserialize_defaults() {
        let page: PageAccessPolicy =
            serde_json::from_str(r#"{"page_path": "index", "public": true}"#).unwrap();
        assert!(page.public);
        assert!(page.required_permissions.is_empty());
        assert!(page.allowed_roles.is_none());
    }
}
