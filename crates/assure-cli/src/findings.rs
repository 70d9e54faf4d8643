//! # Findings Subcommand
//!
//! List recorded findings and move them through open → in_progress →
//! resolved.

use anyhow::Result;
use clap::{Args, Subcommand};

use assure_controls::Finding;
use assure_core::{ControlId, EvaluationId, FindingId, FindingStatus, Severity};
use assure_store::{EvaluationStore, FindingQuery, FindingUpdate, StoreError};

use crate::config::AssureConfig;
use crate::{open_store, print_json};

/// Arguments for `assure findings`.
#[derive(Args, Debug)]
pub struct FindingsArgs {
    #[command(subcommand)]
    pub command: FindingsCommand,
}

/// Findings subcommands.
#[derive(Subcommand, Debug)]
pub enum FindingsCommand {
    /// List findings, newest first.
    List {
        #[arg(long)]
        control: Option<ControlId>,
        #[arg(long)]
        evaluation: Option<EvaluationId>,
        /// open, in_progress or resolved.
        #[arg(long)]
        status: Option<FindingStatus>,
        #[arg(long)]
        severity: Option<Severity>,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Change a finding's status and optionally its assignee.
    Update {
        /// Finding id.
        id: FindingId,
        /// Target status.
        #[arg(long)]
        status: FindingStatus,
        /// Assign to this person.
        #[arg(long)]
        assign: Option<String>,
    },
}

/// Execute the findings subcommand.
pub fn run_findings(args: &FindingsArgs, config: &AssureConfig) -> Result<u8> {
    let store = open_store(config)?;
    execute(&args.command, &store)
}

fn execute(command: &FindingsCommand, store: &dyn EvaluationStore) -> Result<u8> {
    match command {
        FindingsCommand::List {
            control,
            evaluation,
            status,
            severity,
            json,
        } => {
            let query = FindingQuery {
                control_id: control.clone(),
                evaluation_id: *evaluation,
                status: *status,
                severity: *severity,
            };
            let findings = store.list_findings(&query)?;
            if *json {
                print_json(&findings)?;
            } else {
                for f in &findings {
                    println!("{}", finding_line(f));
                }
                println!("{} finding(s)", findings.len());
            }
            Ok(0)
        }

        FindingsCommand::Update { id, status, assign } => {
            let mut update = FindingUpdate::status(*status);
            if let Some(who) = assign {
                update = update.assign(who.clone());
            }
            match store.update_finding_status(id, &update) {
                Ok(finding) => {
                    println!("OK: {}", finding_line(&finding));
                    Ok(0)
                }
                Err(StoreError::NotFound { .. }) => {
                    println!("NOT FOUND: finding {id}");
                    Ok(1)
                }
                Err(e @ StoreError::InvalidTransition { .. }) => {
                    println!("REJECTED: {e}");
                    Ok(1)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn finding_line(f: &Finding) -> String {
    format!(
        "{}  {:<11} {:<8} {:<28} {}{}",
        f.id,
        f.status,
        f.severity,
        f.control_id,
        f.title,
        f.assigned_to
            .as_deref()
            .map(|who| format!(" [{who}]"))
            .unwrap_or_default(),
    )
}
