// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Attribute-based conditions attached to individual permissions.
//!
//! A dynamic permission is granted only when the role grants it *and* the
//! attached condition holds for the subject and the resource being accessed.
//! Conditions narrow a base grant; they can never widen one.
//!
//! Three canonical conditions ship with the crate:
//!
//! - [`Ownership`]: `resource.owner_id == subject.subject_id`
//! - [`Guardianship`]: `resource.student_id ∈ subject.children`
//! - [`ClassMembership`]: `resource.class_id ∈ subject.classes`

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::permission::PermissionKey;

// ---------------------------------------------------------------------------
// Attribute data
// ---------------------------------------------------------------------------

/// Relationship attributes of the subject, as reported by the attribute
/// provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAttributes {
    pub subject_id: String,
    /// Student IDs this subject is guardian of.
    #[serde(default)]
    pub children: BTreeSet<String>,
    /// Class IDs this subject belongs to or teaches.
    #[serde(default)]
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SubjectAttributes {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Self::default()
        }
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes.extend(classes.into_iter().map(Into::into));
        self
    }
}

/// Attributes of the resource a dynamic permission is checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ResourceAttributes {
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::default()
        }
    }

    pub fn for_student(student_id: impl Into<String>) -> Self {
        Self {
            student_id: Some(student_id.into()),
            ..Self::default()
        }
    }

    pub fn in_class(class_id: impl Into<String>) -> Self {
        Self {
            class_id: Some(class_id.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator trait
// ---------------------------------------------------------------------------

/// A predicate over `(subject attributes, resource attributes)`.
pub trait DynamicConditionEvaluator: Send + Sync {
    /// Short stable name used in logs.
    fn name(&self) -> &str;

    fn evaluate(&self, subject: &SubjectAttributes, resource: &ResourceAttributes) -> bool;

    /// Resource owner to confirm with the relationship resolver when
    /// [`evaluate`](Self::evaluate) fails because the subject's attribute
    /// snapshot may be incomplete. `None` makes the predicate result final.
    fn relationship_fallback<'r>(&self, _resource: &'r ResourceAttributes) -> Option<&'r str> {
        None
    }
}

/// The resource belongs to the subject.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ownership;

impl DynamicConditionEvaluator for Ownership {
    fn name(&self) -> &str {
        "ownership"
    }

    fn evaluate(&self, subject: &SubjectAttributes, resource: &ResourceAttributes) -> bool {
        resource.owner_id.as_deref() == Some(subject.subject_id.as_str())
    }
}

/// The resource's student is one of the subject's children.
#[derive(Debug, Clone, Copy, Default)]
pub struct Guardianship;

impl DynamicConditionEvaluator for Guardianship {
    fn name(&self) -> &str {
        "guardianship"
    }

    fn evaluate(&self, subject: &SubjectAttributes, resource: &ResourceAttributes) -> bool {
        resource
            .student_id
            .as_ref()
            .is_some_and(|student| subject.children.contains(student))
    }

    fn relationship_fallback<'r>(&self, resource: &'r ResourceAttributes) -> Option<&'r str> {
        resource.student_id.as_deref()
    }
}

/// The resource's class is one of the subject's classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassMembership;

impl DynamicConditionEvaluator for ClassMembership {
    fn name(&self) -> &str {
        "class_membership"
    }

    fn evaluate(&self, subject: &SubjectAttributes, resource: &ResourceAttributes) -> bool {
        resource
            .class_id
            .as_ref()
            .is_some_and(|class| subject.classes.contains(class))
    }
}

// ---------------------------------------------------------------------------
// Built-in kinds (configuration names)
// ---------------------------------------------------------------------------

/// Built-in conditions addressable by name from configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Ownership,
    Guardianship,
    ClassMembership,
}

impl ConditionKind {
    pub fn evaluator(self) -> Arc<dyn DynamicConditionEvaluator> {
        match self {
            ConditionKind::Ownership => Arc::new(Ownership),
            ConditionKind::Guardianship => Arc::new(Guardianship),
            ConditionKind::ClassMembership => Arc::new(ClassMembership),
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::Ownership => write!(f, "ownership"),
            ConditionKind::Guardianship => write!(f, "guardianship"),
            ConditionKind::ClassMembership => write!(f, "class_membership"),
        }
    }
}

impl FromStr for ConditionKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ownership" => Ok(ConditionKind::Ownership),
            "guardianship" => Ok(ConditionKind::Guardianship),
            "class_membership" => Ok(ConditionKind::ClassMembership),
            other => Err(PolicyError::UnknownCondition {
                permission: String::new(),
                condition: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Typed map from permission key to its attached condition.
#[derive(Clone, Default)]
pub struct ConditionRegistry {
    conditions: HashMap<PermissionKey, Arc<dyn DynamicConditionEvaluator>>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in evaluator for each configured kind.
    pub fn from_kinds<'a>(kinds: impl IntoIterator<Item = (&'a PermissionKey, &'a ConditionKind)>) -> Self {
        let conditions = kinds
            .into_iter()
            .map(|(key, kind)| (key.clone(), kind.evaluator()))
            .collect();
        Self { conditions }
    }

    /// Attach (or replace) the condition for `permission`.
    pub fn register(
        &mut self,
        permission: PermissionKey,
        evaluator: Arc<dyn DynamicConditionEvaluator>,
    ) -> Option<Arc<dyn DynamicConditionEvaluator>> {
        self.conditions.insert(permission, evaluator)
    }

    pub fn get(&self, permission: &PermissionKey) -> Option<&Arc<dyn DynamicConditionEvaluator>> {
        self.conditions.get(permission)
    }

    pub fn contains(&self, permission: &PermissionKey) -> bool {
        self.conditions.contains_key(permission)
    }

    pub fn permissions(&self) -> impl Iterator<Item = &PermissionKey> {
        self.conditions.keys()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(String, &str)> = self
            .conditions
            .iter()
            .map(|(key, evaluator)| (key.to_string(), evaluator.name()))
            .collect();
        entries.sort();
        f.debug_map().entries(entries).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> PermissionKey {
        PermissionKey::parse(raw).unwrap()
    }

    #[test]
    fn test_ownership() {
        let subject = SubjectAttributes::new("u1");
        assert!(Ownership.evaluate(&subject, &ResourceAttributes::owned_by("u1")));
        assert!(!Ownership.evaluate(&subject, &ResourceAttributes::owned_by("u2")));
        assert!(!Ownership.evaluate(&subject, &ResourceAttributes::default()));
    }

    #[test]
    fn test_guardianship() {
        let parent = SubjectAttributes::new("p1").with_children(["child123"]);
        assert!(Guardianship.evaluate(&parent, &ResourceAttributes::for_student("child123")));
        assert!(!Guardianship.evaluate(&parent, &ResourceAttributes::for_student("other456")));
        assert!(!Guardianship.evaluate(&parent, &ResourceAttributes::default()));
    }

    #[test]
    fn test_guardianship_names_fallback_owner() {
        let resource = ResourceAttributes::for_student("other456");
        assert_eq!(Guardianship.relationship_fallback(&resource), Some("other456"));
        assert_eq!(Ownership.relationship_fallback(&resource), None);
        assert_eq!(ClassMembership.relationship_fallback(&resource), None);
    }

    #[test]
    fn test_class_membership() {
        let teacher = SubjectAttributes::new("t1").with_classes(["7b", "8a"]);
        assert!(ClassMembership.evaluate(&teacher, &ResourceAttributes::in_class("8a")));
        assert!(!ClassMembership.evaluate(&teacher, &ResourceAttributes::in_class("9c")));
    }

    #[test]
    fn test_kind_parse_and_display() {
        for kind in [
            ConditionKind::Ownership,
            ConditionKind::Guardianship,
            ConditionKind::ClassMembership,
        ] {
            assert_eq!(kind.to_string().parse::<ConditionKind>().unwrap(), kind);
            assert_eq!(kind.evaluator().name(), kind.to_string());
        }
        assert!("telepathy".parse::<ConditionKind>().is_err());
    }

    #[test]
    fn test_registry_register_replaces() {
        let view_child = key("analysis.view_child");
        let kinds = [(view_child.clone(), ConditionKind::Ownership)];
        let mut registry = ConditionRegistry::from_kinds(kinds.iter().map(|(k, v)| (k, v)));
        assert_eq!(registry.get(&view_child).unwrap().name(), "ownership");

        let previous = registry.register(view_child.clone(), Arc::new(Guardianship));
        assert_eq!(previous.unwrap().name(), "ownership");
        assert_eq!(registry.get(&view_child).unwrap().name(), "guardianship");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            format!("{:?}", registry),
            r#"{"analysis.view_child": "guardianship"}"#
        );
    }
}
