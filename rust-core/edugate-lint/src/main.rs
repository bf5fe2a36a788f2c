// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//!
//! edugate-lint: validate EduGate policy files.
//!
//! ```text
//! edugate-lint validate [--config FILE] [--json]
//! edugate-lint effective ROLE [--config FILE]
//! edugate-lint pages ROLE [--config FILE]
//! ```
//!
//! Without `--config` the built-in school policy is used. `validate` exits
//! non-zero when the combination-rule validator reports conflicts, so it can
//! gate a CI step.

mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use edugate_engine::{AccessError, InMemoryDirectory, PageGuard, RuleEngine, SubjectId};
use edugate_policy::{PolicyConfig, RoleKey};

/// Subject the `pages` command evaluates as.
const PROBE_SUBJECT: &str = "edugate-lint-probe";

#[derive(Parser, Debug)]
#[command(name = "edugate-lint", version, about = "Validate EduGate access-control policies")]
struct Cli {
    /// Policy file (JSON). Defaults to the built-in school policy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the combination-rule validator; exit 1 on conflicts.
    Validate {
        /// Emit a JSON report instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// List a role's effective permissions.
    Effective { role: String },
    /// Show which registered pages a role can open.
    Pages { role: String },
}

fn load_policy(path: Option<&PathBuf>) -> anyhow::Result<PolicyConfig> {
    match path {
        Some(path) => PolicyConfig::from_path(path)
            .with_context(|| format!("failed to load policy from {}", path.display())),
        None => PolicyConfig::school_default().context("built-in school policy is invalid"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_policy(cli.config.as_ref())?;

    match cli.command {
        Command::Validate { json } => {
            let policy = config.compile()?;
            let conflicts = policy.validate_role_configuration();
            println!("{}", report::render_conflicts(policy.version(), &conflicts, json)?);
            if conflicts.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                tracing::warn!(count = conflicts.len(), "Policy has configuration conflicts");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Effective { role } => {
            let policy = config.compile()?;
            let role = RoleKey::new(role);
            let table = report::render_effective(&policy, &role)
                .ok_or_else(|| AccessError::UnknownRole(role.to_string()))?;
            println!("{table}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Pages { role } => {
            let role = RoleKey::new(role);
            let directory = Arc::new(InMemoryDirectory::new());
            directory.assign_role(PROBE_SUBJECT, role.clone()).await;

            let engine = RuleEngine::builder(config)
                .with_directory(directory)
                .build()?;
            if !engine.policy().roles().contains(&role) {
                return Err(AccessError::UnknownRole(role.to_string()).into());
            }

            let guard = PageGuard::new(Arc::new(engine));
            let subject = SubjectId::from(PROBE_SUBJECT);
            let mut pages = Vec::new();
            for page in guard.engine().policy().pages().iter() {
                let decision = guard.evaluate(&subject, &page.page_path).await;
                pages.push((page.page_path.clone(), decision));
            }
            println!("{}", report::render_pages(&role, &pages));
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
