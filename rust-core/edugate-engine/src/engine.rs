// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The rule engine.
//
// Evaluation order for a single permission check:
//
//   1. Unknown (uncatalogued or malformed) key → deny, never cached.
//   2. Live cache entry → return it.
//   3. Resolve the subject's role (bounded by the resolver timeout).
//   4. Forbidden entries → deny; otherwise granted iff some tier holds the key.
//   5. Cache the decision unless resolution failed.
//
// Every failure resolves to deny. The policy itself is immutable; `reload`
// swaps in a freshly compiled one and flushes the cache under the cache's
// write lock.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use edugate_policy::{
    ConditionRegistry, ConflictRecord, DynamicConditionEvaluator, GroupMode, OperationClass, Permission,
    PermissionKey, PolicyConfig, PolicyError, PolicySet, ResourceAttributes, RoleKey, RoleVerdict,
    SubjectAttributes,
};
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditLog};
use crate::cache::{CacheStats, DecisionCache};
use crate::config::EngineConfig;
use crate::decision::{Decision, DenyReason, OperationVerdict};
use crate::error::{AccessError, AccessResult, ProviderError};
use crate::provider::{
    AttributeProvider, NoRelationships, RelationshipResolver, RoleProvider, SubjectId,
};

// ---------------------------------------------------------------------------
// Session events
// ---------------------------------------------------------------------------

/// Session lifecycle events that invalidate cached decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The subject switched to another role. Flushes the whole cache.
    RoleSwitched(SubjectId),
    /// The subject logged out. Flushes the whole cache.
    LoggedOut(SubjectId),
    /// The subject's relationships changed. Flushes that subject only.
    AttributesChanged(SubjectId),
}

// ---------------------------------------------------------------------------
// Active policy
// ---------------------------------------------------------------------------

/// The compiled policy together with the conditions resolved for it.
struct ActivePolicy {
    set: Arc<PolicySet>,
    conditions: ConditionRegistry,
}

impl ActivePolicy {
    /// Built-in conditions from configuration, overridden by `custom`.
    fn new(set: PolicySet, custom: &ConditionRegistry) -> Self {
        let mut conditions = ConditionRegistry::from_kinds(set.conditions().iter());
        for permission in custom.permissions() {
            if let Some(evaluator) = custom.get(permission) {
                conditions.register(permission.clone(), Arc::clone(evaluator));
            }
        }
        Self {
            set: Arc::new(set),
            conditions,
        }
    }
}

/// Compile `config` and apply the conflict policy. Conflicts are logged in
/// both modes and rejected in strict mode.
fn compile_policy(config: PolicyConfig, strict: bool) -> AccessResult<PolicySet> {
    let set = config.compile()?;
    match set.ensure_consistent() {
        Ok(()) => Ok(set),
        Err(PolicyError::ConfigurationConflict(conflicts)) if strict => {
            Err(AccessError::ConfigurationConflict(conflicts))
        }
        Err(PolicyError::ConfigurationConflict(_)) => Ok(set),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`RuleEngine`] from a policy, settings and collaborators.
pub struct RuleEngineBuilder {
    policy: PolicyConfig,
    config: EngineConfig,
    roles: Option<Arc<dyn RoleProvider>>,
    attributes: Option<Arc<dyn AttributeProvider>>,
    relationships: Option<Arc<dyn RelationshipResolver>>,
    conditions: ConditionRegistry,
}

impl RuleEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn role_provider(mut self, provider: Arc<dyn RoleProvider>) -> Self {
        self.roles = Some(provider);
        self
    }

    pub fn attribute_provider(mut self, provider: Arc<dyn AttributeProvider>) -> Self {
        self.attributes = Some(provider);
        self
    }

    pub fn relationship_resolver(mut self, resolver: Arc<dyn RelationshipResolver>) -> Self {
        self.relationships = Some(resolver);
        self
    }

    /// Use one directory for roles, attributes and relationships.
    pub fn with_directory<D>(self, directory: Arc<D>) -> Self
    where
        D: RoleProvider + AttributeProvider + RelationshipResolver + 'static,
    {
        let roles: Arc<dyn RoleProvider> = directory.clone();
        let attributes: Arc<dyn AttributeProvider> = directory.clone();
        let relationships: Arc<dyn RelationshipResolver> = directory;
        self.role_provider(roles)
            .attribute_provider(attributes)
            .relationship_resolver(relationships)
    }

    /// Attach a custom condition to `permission`, replacing any built-in
    /// condition configured for it. Survives reloads.
    pub fn condition(
        mut self,
        permission: PermissionKey,
        evaluator: Arc<dyn DynamicConditionEvaluator>,
    ) -> Self {
        self.conditions.register(permission, evaluator);
        self
    }

    pub fn build(self) -> AccessResult<RuleEngine> {
        self.config.validate()?;
        let roles = self
            .roles
            .ok_or_else(|| AccessError::InvalidConfig("a role provider is required".to_string()))?;
        let attributes = self.attributes.ok_or_else(|| {
            AccessError::InvalidConfig("an attribute provider is required".to_string())
        })?;
        let relationships = self
            .relationships
            .unwrap_or_else(|| Arc::new(NoRelationships));

        let set = compile_policy(self.policy, self.config.strict)?;
        info!(
            version = %set.version(),
            roles = set.roles().len(),
            permissions = set.catalog().len(),
            strict = self.config.strict,
            "Rule engine initialised"
        );
        let active = ActivePolicy::new(set, &self.conditions);

        Ok(RuleEngine {
            cache: DecisionCache::new(self.config.cache_ttl(), self.config.cache_max_entries),
            audit: AuditLog::new(self.config.audit_capacity),
            active: RwLock::new(Arc::new(active)),
            custom_conditions: self.conditions,
            roles,
            attributes,
            relationships,
            config: self.config,
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Answers permission, group, dynamic and sensitivity queries for subjects.
///
/// Construct once per process or session with [`RuleEngine::builder`] and
/// share it behind an `Arc`.
pub struct RuleEngine {
    config: EngineConfig,
    active: RwLock<Arc<ActivePolicy>>,
    custom_conditions: ConditionRegistry,
    cache: DecisionCache,
    audit: AuditLog,
    roles: Arc<dyn RoleProvider>,
    attributes: Arc<dyn AttributeProvider>,
    relationships: Arc<dyn RelationshipResolver>,
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.snapshot();
        f.debug_struct("RuleEngine")
            .field("version", &active.set.version())
            .field("config", &self.config)
            .field("conditions", &active.conditions)
            .finish_non_exhaustive()
    }
}

impl RuleEngine {
    pub fn builder(policy: PolicyConfig) -> RuleEngineBuilder {
        RuleEngineBuilder {
            policy,
            config: EngineConfig::default(),
            roles: None,
            attributes: None,
            relationships: None,
            conditions: ConditionRegistry::new(),
        }
    }

    fn snapshot(&self) -> Arc<ActivePolicy> {
        let guard = self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// The policy currently in force.
    pub fn policy(&self) -> Arc<PolicySet> {
        Arc::clone(&self.snapshot().set)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    // -- collaborator calls -------------------------------------------------

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, BoundedError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.config.resolve_timeout(), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(BoundedError::Provider(e)),
            Err(_) => Err(BoundedError::Timeout(AccessError::Timeout {
                operation,
                timeout_ms: self.config.resolve_timeout_ms,
            })),
        }
    }

    /// The subject's role, bounded by the resolver timeout.
    pub async fn resolve_role(&self, subject: &SubjectId) -> AccessResult<Option<RoleKey>> {
        self.bounded("role lookup", self.roles.get_role(subject))
            .await
            .map_err(|e| e.into_access_error(|reason| AccessError::RoleResolutionFailed {
                subject: subject.to_string(),
                reason,
            }))
    }

    /// The subject's attributes with `subject_id` forced to `subject`.
    pub async fn resolve_attributes(&self, subject: &SubjectId) -> AccessResult<SubjectAttributes> {
        let mut attributes = self
            .bounded("attribute lookup", self.attributes.get_attributes(subject))
            .await
            .map_err(|e| e.into_access_error(|reason| AccessError::AttributeResolutionFailed {
                subject: subject.to_string(),
                reason,
            }))?;
        attributes.subject_id = subject.as_str().to_string();
        Ok(attributes)
    }

    async fn resolve_guardianship(&self, subject: &SubjectId, owner: &str) -> AccessResult<bool> {
        self.bounded("relationship lookup", self.relationships.is_guardian_of(subject, owner))
            .await
            .map_err(|e| e.into_access_error(|reason| AccessError::AttributeResolutionFailed {
                subject: subject.to_string(),
                reason,
            }))
    }

    /// The subject's role, or `None` when unassigned or unresolvable.
    pub async fn role_of(&self, subject: &SubjectId) -> Option<RoleKey> {
        match self.resolve_role(subject).await {
            Ok(role) => role,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Role resolution failed");
                None
            }
        }
    }

    // -- permission checks --------------------------------------------------

    /// Decide whether `subject` holds `permission`.
    pub async fn decide(&self, subject: &SubjectId, permission: &str) -> Decision {
        match PermissionKey::parse(permission) {
            Ok(key) => self.decide_key(subject, &key).await,
            Err(_) => {
                warn!(subject = %subject, permission = %permission, "Access DENIED: malformed permission key");
                let decision = Decision::Deny(DenyReason::UnknownPermission);
                self.audit
                    .record(AuditEntry::new(subject, None, permission, decision, false));
                decision
            }
        }
    }

    /// [`decide`](Self::decide) for an already-parsed key.
    pub async fn decide_key(&self, subject: &SubjectId, permission: &PermissionKey) -> Decision {
        let (decision, role, cached) = self.evaluate(subject, permission).await;
        self.audit.record(AuditEntry::new(
            subject,
            role,
            permission.to_string(),
            decision,
            cached,
        ));
        decision
    }

    async fn evaluate(
        &self,
        subject: &SubjectId,
        permission: &PermissionKey,
    ) -> (Decision, Option<RoleKey>, bool) {
        // Generation first, then the policy snapshot: a reload in between
        // makes the insert below a no-op.
        let generation = self.cache.generation();
        let active = self.snapshot();

        if !active.set.catalog().contains(permission) {
            warn!(subject = %subject, permission = %permission, "Access DENIED: unknown permission");
            return (Decision::Deny(DenyReason::UnknownPermission), None, false);
        }

        if let Some(hit) = self.cache.get(subject, permission).await {
            debug!(subject = %subject, permission = %permission, decision = %hit.decision, "Decision served from cache");
            return (hit.decision, hit.role, true);
        }

        let (decision, role) = match self.resolve_role(subject).await {
            Err(e) => {
                warn!(subject = %subject, permission = %permission, error = %e, "Access DENIED: role resolution failed");
                (Decision::Deny(DenyReason::ResolutionFailed), None)
            }
            Ok(None) => {
                warn!(subject = %subject, permission = %permission, "Access DENIED: subject has no role");
                (Decision::Deny(DenyReason::UnknownRole), None)
            }
            Ok(Some(role)) => {
                let decision = match active.set.roles().verdict(&role, permission) {
                    None => {
                        warn!(subject = %subject, role = %role, permission = %permission, "Access DENIED: unknown role");
                        Decision::Deny(DenyReason::UnknownRole)
                    }
                    Some(RoleVerdict::Granted(tier)) => {
                        info!(subject = %subject, role = %role, permission = %permission, tier = %tier, "Access ALLOWED");
                        Decision::Allow
                    }
                    Some(RoleVerdict::Forbidden) => {
                        info!(subject = %subject, role = %role, permission = %permission, "Access DENIED: forbidden for role");
                        Decision::Deny(DenyReason::Forbidden)
                    }
                    Some(RoleVerdict::NotGranted) => {
                        debug!(subject = %subject, role = %role, permission = %permission, "Access DENIED: not granted");
                        Decision::Deny(DenyReason::NotGranted)
                    }
                };
                (decision, Some(role))
            }
        };

        if decision.is_cacheable() {
            self.cache
                .insert(subject, permission, decision, role.clone(), generation)
                .await;
        }
        (decision, role, false)
    }

    pub async fn has_permission(&self, subject: &SubjectId, permission: &str) -> bool {
        self.decide(subject, permission).await.is_allowed()
    }

    /// Base decision narrowed by the permission's attached condition.
    ///
    /// Never allows what [`decide`](Self::decide) denies. Without a condition
    /// the base decision stands. One audit entry is recorded, carrying the
    /// final decision.
    pub async fn decide_dynamic(
        &self,
        subject: &SubjectId,
        permission: &str,
        resource: &ResourceAttributes,
    ) -> Decision {
        let Ok(key) = PermissionKey::parse(permission) else {
            return self.decide(subject, permission).await;
        };
        let (base, role, cached) = self.evaluate(subject, &key).await;
        let condition = match self.snapshot().conditions.get(&key) {
            Some(condition) if base.is_allowed() => Some(Arc::clone(condition)),
            _ => None,
        };

        let (decision, cached) = match condition {
            Some(condition) => (
                self.evaluate_condition(subject, &key, condition.as_ref(), resource)
                    .await,
                false,
            ),
            None => (base, cached),
        };
        self.audit
            .record(AuditEntry::new(subject, role, permission, decision, cached));
        decision
    }

    async fn evaluate_condition(
        &self,
        subject: &SubjectId,
        permission: &PermissionKey,
        condition: &dyn DynamicConditionEvaluator,
        resource: &ResourceAttributes,
    ) -> Decision {
        let attributes = match self.resolve_attributes(subject).await {
            Ok(attributes) => attributes,
            Err(e) => {
                warn!(subject = %subject, permission = %permission, error = %e, "Access DENIED: attribute resolution failed");
                return Decision::Deny(DenyReason::ResolutionFailed);
            }
        };

        if condition.evaluate(&attributes, resource) {
            debug!(subject = %subject, permission = %permission, condition = condition.name(), "Condition satisfied");
            return Decision::Allow;
        }

        let Some(owner) = condition.relationship_fallback(resource) else {
            info!(subject = %subject, permission = %permission, condition = condition.name(), "Access DENIED: condition not met");
            return Decision::Deny(DenyReason::ConditionFailed);
        };

        match self.resolve_guardianship(subject, owner).await {
            Ok(true) => {
                debug!(subject = %subject, permission = %permission, owner = %owner, "Condition satisfied by relationship lookup");
                Decision::Allow
            }
            Ok(false) => {
                info!(subject = %subject, permission = %permission, condition = condition.name(), "Access DENIED: condition not met");
                Decision::Deny(DenyReason::ConditionFailed)
            }
            Err(e) => {
                warn!(subject = %subject, permission = %permission, error = %e, "Access DENIED: relationship lookup failed");
                Decision::Deny(DenyReason::ResolutionFailed)
            }
        }
    }

    pub async fn check_dynamic_permission(
        &self,
        subject: &SubjectId,
        permission: &str,
        resource: &ResourceAttributes,
    ) -> bool {
        self.decide_dynamic(subject, permission, resource)
            .await
            .is_allowed()
    }

    // -- groups and bulk checks ---------------------------------------------

    async fn evaluate_keys(&self, subject: &SubjectId, keys: &[PermissionKey], mode: GroupMode) -> bool {
        for key in keys {
            let allowed = self.decide_key(subject, key).await.is_allowed();
            match mode {
                GroupMode::All if !allowed => return false,
                GroupMode::Any if allowed => return true,
                _ => {}
            }
        }
        matches!(mode, GroupMode::All)
    }

    async fn evaluate_group(&self, subject: &SubjectId, group: &str, mode: GroupMode) -> AccessResult<bool> {
        let members = match self.snapshot().set.groups().get(group) {
            Some(group) => group.members().to_vec(),
            None => {
                warn!(subject = %subject, group = %group, "Unknown permission group requested");
                return Err(AccessError::UnknownGroup(group.to_string()));
            }
        };
        let result = self.evaluate_keys(subject, &members, mode).await;
        debug!(subject = %subject, group = %group, mode = %mode, result, "Permission group evaluated");
        Ok(result)
    }

    /// `true` iff every member of the group is allowed. An empty group is
    /// `true`.
    pub async fn has_permission_group(&self, subject: &SubjectId, group: &str) -> AccessResult<bool> {
        self.evaluate_group(subject, group, GroupMode::All).await
    }

    /// `true` iff at least one member of the group is allowed. An empty
    /// group is `false`.
    pub async fn has_any_permission_in_group(&self, subject: &SubjectId, group: &str) -> AccessResult<bool> {
        self.evaluate_group(subject, group, GroupMode::Any).await
    }

    /// Ad-hoc AND over raw keys. A malformed key is a denial.
    pub async fn has_all_permissions(&self, subject: &SubjectId, permissions: &[&str]) -> bool {
        for permission in permissions {
            if !self.has_permission(subject, permission).await {
                return false;
            }
        }
        true
    }

    /// Ad-hoc OR over raw keys.
    pub async fn has_any_permission(&self, subject: &SubjectId, permissions: &[&str]) -> bool {
        for permission in permissions {
            if self.has_permission(subject, permission).await {
                return true;
            }
        }
        false
    }

    // -- listing ------------------------------------------------------------

    /// Catalogued permissions the subject's role grants. Empty when the role
    /// is unknown or cannot be resolved.
    pub async fn permissions_for(&self, subject: &SubjectId) -> BTreeSet<PermissionKey> {
        let active = self.snapshot();
        let Some(role) = self.role_of(subject).await else {
            return BTreeSet::new();
        };
        match active.set.roles().effective_permissions(&role) {
            Some(effective) => effective
                .into_iter()
                .filter(|key| active.set.catalog().contains(key))
                .collect(),
            None => {
                warn!(subject = %subject, role = %role, "Unknown role; no permissions listed");
                BTreeSet::new()
            }
        }
    }

    /// Catalog entries for [`permissions_for`](Self::permissions_for), with
    /// `sensitive` reflecting the sensitive-operation gate.
    pub async fn permission_descriptors(&self, subject: &SubjectId) -> Vec<Permission> {
        let policy = self.policy();
        self.permissions_for(subject)
            .await
            .iter()
            .filter_map(|key| policy.catalog().get(key))
            .map(|entry| Permission {
                sensitive: policy.gate().is_sensitive(&entry.key),
                ..entry.clone()
            })
            .collect()
    }

    // -- sensitive operations -----------------------------------------------

    /// Static classification; malformed or unknown keys are routine.
    pub fn classify_operation(&self, permission: &str) -> OperationClass {
        self.snapshot().set.gate().classify(permission)
    }

    pub fn is_sensitive(&self, permission: &str) -> bool {
        self.classify_operation(permission) == OperationClass::RequiresConfirmation
    }

    /// The decision combined with the sensitivity classification.
    pub async fn authorize_operation(&self, subject: &SubjectId, permission: &str) -> OperationVerdict {
        let decision = self.decide(subject, permission).await;
        match (decision, self.classify_operation(permission)) {
            (Decision::Deny(reason), _) => OperationVerdict::Denied(reason),
            (Decision::Allow, OperationClass::RequiresConfirmation) => {
                info!(subject = %subject, permission = %permission, "Sensitive operation requires confirmation");
                OperationVerdict::ConfirmationRequired
            }
            (Decision::Allow, OperationClass::Routine) => OperationVerdict::Permitted,
        }
    }

    // -- configuration and invalidation -------------------------------------

    /// Combination-rule and cross-reference conflicts in the active policy.
    pub fn validate_role_configuration(&self) -> Vec<ConflictRecord> {
        self.snapshot().set.validate_role_configuration()
    }

    /// Flush every cached decision, or only those of `subject`. Returns the
    /// number of entries removed.
    pub async fn invalidate_cache(&self, subject: Option<&SubjectId>) -> usize {
        let removed = match subject {
            Some(subject) => self.cache.invalidate_subject(subject).await,
            None => self.cache.invalidate_all().await,
        };
        debug!(subject = ?subject.map(SubjectId::as_str), removed, "Decision cache invalidated");
        removed
    }

    pub async fn handle_session_event(&self, event: SessionEvent) -> usize {
        match &event {
            SessionEvent::RoleSwitched(subject) | SessionEvent::LoggedOut(subject) => {
                info!(subject = %subject, event = ?event, "Session event: flushing decision cache");
                self.invalidate_cache(None).await
            }
            SessionEvent::AttributesChanged(subject) => {
                info!(subject = %subject, "Session event: flushing subject decisions");
                self.invalidate_cache(Some(subject)).await
            }
        }
    }

    /// Compile `config`, swap it in and flush the cache.
    ///
    /// On error the active policy is left untouched.
    pub async fn reload(&self, config: PolicyConfig) -> AccessResult<()> {
        let set = compile_policy(config, self.config.strict)?;
        let next = Arc::new(ActivePolicy::new(set, &self.custom_conditions));
        let new_version = next.set.version().to_string();

        let (previous, flushed) = self
            .cache
            .flush_with(|| {
                let mut guard = self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner());
                std::mem::replace(&mut *guard, next)
            })
            .await;

        info!(
            previous = %previous.set.version(),
            version = %new_version,
            flushed,
            "Policy reloaded"
        );
        Ok(())
    }
}

/// A provider failure or a timeout, before it is given subject context.
enum BoundedError {
    Provider(ProviderError),
    Timeout(AccessError),
}

impl BoundedError {
    fn into_access_error(self, wrap: impl FnOnce(String) -> AccessError) -> AccessError {
        match self {
            BoundedError::Provider(e) => wrap(e.to_string()),
            BoundedError::Timeout(e) => e,
        }
    }
}
