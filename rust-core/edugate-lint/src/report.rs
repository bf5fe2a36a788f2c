// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//!
//! Report rendering for the lint commands.
//!
//! Tables use `comfy-table`; `--json` output is a pretty-printed document
//! suitable for CI annotations.

use comfy_table::{Cell, ContentArrangement, Table};
use edugate_engine::PageDecision;
use edugate_policy::{ConflictRecord, ConflictRule, PolicySet, RoleKey};
use serde::Serialize;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.iter().map(|h| Cell::new(*h)));
    table
}

fn rule_kind(rule: &ConflictRule) -> &'static str {
    match rule {
        ConflictRule::Dependency { .. } => "dependency",
        ConflictRule::MutualExclusion { .. } => "mutual exclusion",
        ConflictRule::UncataloguedPermission { .. } => "uncatalogued",
        ConflictRule::UndefinedRole { .. } => "undefined role",
    }
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    version: &'a str,
    ok: bool,
    conflicts: &'a [ConflictRecord],
}

/// Validation outcome for `version` as a table or JSON document.
pub fn render_conflicts(version: &str, conflicts: &[ConflictRecord], json: bool) -> anyhow::Result<String> {
    if json {
        let report = ValidationReport {
            version,
            ok: conflicts.is_empty(),
            conflicts,
        };
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    if conflicts.is_empty() {
        return Ok(format!("policy {version}: no conflicts"));
    }

    let mut out = table(&["Role", "Rule", "Detail", "Conflicting keys"]);
    for conflict in conflicts {
        let role = conflict
            .role
            .as_ref()
            .map_or_else(|| "-".to_string(), RoleKey::to_string);
        let keys: Vec<String> = conflict.conflicting_keys.iter().map(ToString::to_string).collect();
        out.add_row(vec![
            Cell::new(role),
            Cell::new(rule_kind(&conflict.rule)),
            Cell::new(conflict.rule.to_string()),
            Cell::new(keys.join(", ")),
        ]);
    }
    Ok(format!(
        "policy {version}: {} conflict(s)\n{out}",
        conflicts.len()
    ))
}

/// The role's effective permissions with tier, sensitivity and condition.
pub fn render_effective(policy: &PolicySet, role: &RoleKey) -> Option<String> {
    let definition = policy.roles().get(role)?;
    let mut out = table(&["Permission", "Tier", "Name", "Sensitive", "Condition"]);
    for key in definition.effective_permissions() {
        let tier = definition
            .tier_of(&key)
            .map_or_else(|| "-".to_string(), |tier| tier.to_string());
        let name = policy
            .catalog()
            .get(&key)
            .map_or("(uncatalogued)", |entry| entry.display_name.as_str());
        let sensitive = if policy.gate().is_sensitive(&key) { "yes" } else { "" };
        let condition = policy
            .conditions()
            .get(&key)
            .map(ToString::to_string)
            .unwrap_or_default();
        out.add_row(vec![
            Cell::new(key.to_string()),
            Cell::new(tier),
            Cell::new(name),
            Cell::new(sensitive),
            Cell::new(condition),
        ]);
    }
    Some(format!("role {role}\n{out}"))
}

fn describe(decision: &PageDecision) -> String {
    match decision {
        PageDecision::Unregistered => "allow (unregistered)".to_string(),
        PageDecision::Public => "allow (public)".to_string(),
        PageDecision::Granted => "allow".to_string(),
        PageDecision::RoleNotAllowed => "deny (role not allowed)".to_string(),
        PageDecision::MissingPermission(key) => format!("deny (missing {key})"),
        PageDecision::ResolutionFailed => "deny (resolution failed)".to_string(),
    }
}

/// Page decisions for one role, one row per registered page.
pub fn render_pages(role: &RoleKey, pages: &[(String, PageDecision)]) -> String {
    let mut out = table(&["Page", "Decision"]);
    for (path, decision) in pages {
        out.add_row(vec![Cell::new(path), Cell::new(describe(decision))]);
    }
    let reachable = pages.iter().filter(|(_, d)| d.is_allowed()).count();
    format!("role {role}: {reachable}/{} pages reachable\n{out}", pages.len())
}
