//! # Evaluations Subcommand
//!
//! Browse recorded evaluation results.

use anyhow::Result;
use clap::{Args, Subcommand};

use assure_core::{ControlId, EvaluationId, EvaluationStatus};
use assure_store::{EvaluationQuery, EvaluationStore, StoreError};

use crate::config::AssureConfig;
use crate::{open_store, print_json};

/// Arguments for `assure evaluations`.
#[derive(Args, Debug)]
pub struct EvaluationsArgs {
    #[command(subcommand)]
    pub command: EvaluationsCommand,
}

/// Evaluations subcommands.
#[derive(Subcommand, Debug)]
pub enum EvaluationsCommand {
    /// List evaluations, newest first.
    List {
        #[arg(long)]
        control: Option<ControlId>,
        /// pass, fail, warning or not_evaluated.
        #[arg(long)]
        status: Option<EvaluationStatus>,
        /// Show at most this many.
        #[arg(long)]
        limit: Option<usize>,
        /// Show only the latest evaluation of each listed control.
        #[arg(long, requires = "control")]
        latest: bool,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one evaluation with its findings.
    Show {
        /// Evaluation id.
        id: EvaluationId,
    },
}

/// Execute the evaluations subcommand.
pub fn run_evaluations(args: &EvaluationsArgs, config: &AssureConfig) -> Result<u8> {
    let store = open_store(config)?;
    execute(&args.command, &store)
}

fn execute(command: &EvaluationsCommand, store: &dyn EvaluationStore) -> Result<u8> {
    match command {
        EvaluationsCommand::List {
            control,
            status,
            limit,
            latest,
            json,
        } => {
            let evaluations = match (*latest, control) {
                (true, Some(control_id)) => store.latest_evaluation(control_id)?.into_iter().collect(),
                _ => store.list_evaluations(&EvaluationQuery {
                    control_id: control.clone(),
                    status: *status,
                    limit: *limit,
                })?,
            };
            if *json {
                print_json(&evaluations)?;
            } else {
                for e in &evaluations {
                    println!(
                        "{}  {}  {:<13} {:<28} {} finding(s)",
                        e.id,
                        e.evaluated_at.to_rfc3339(),
                        e.status,
                        e.control_id,
                        e.findings.len()
                    );
                }
                println!("{} evaluation(s)", evaluations.len());
            }
            Ok(0)
        }

        EvaluationsCommand::Show { id } => {
            let evaluation = match store.get_evaluation(id) {
                Ok(e) => e,
                Err(StoreError::NotFound { .. }) => {
                    println!("NOT FOUND: evaluation {id}");
                    return Ok(1);
                }
                Err(e) => return Err(e.into()),
            };
            let findings = store.list_findings(&assure_store::FindingQuery {
                evaluation_id: Some(*id),
                ..Default::default()
            })?;
            print_json(&serde_json::json!({
                "evaluation": evaluation,
                "findings": findings,
            }))?;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assure_controls::ControlEvaluation;
    use assure_store::MemoryStore;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn evaluation(control: &str, age_minutes: i64) -> ControlEvaluation {
        ControlEvaluation {
            id: EvaluationId::new(),
            control_id: ControlId::new(control).unwrap(),
            status: EvaluationStatus::Pass,
            evaluated_at: Utc::now() - Duration::minutes(age_minutes),
            details: json!({"violation_count": 0}),
            findings: Vec::new(),
            evidence_ids: Vec::new(),
            evaluator: "system".into(),
        }
    }

    #[test]
    fn show_known_and_unknown() {
        let store = MemoryStore::new();
        let e = evaluation("CC6.1-MFA", 0);
        store.create_evaluation(&e).unwrap();
        assert_eq!(execute(&EvaluationsCommand::Show { id: e.id }, &store).unwrap(), 0);
        assert_eq!(
            execute(&EvaluationsCommand::Show { id: EvaluationId::new() }, &store).unwrap(),
            1
        );
    }

    #[test]
    fn list_latest_and_limited() {
        let store = MemoryStore::new();
        for age in [30, 20, 10] {
            store.create_evaluation(&evaluation("CC6.1-MFA", age)).unwrap();
        }
        let latest = EvaluationsCommand::List {
            control: Some(ControlId::new("CC6.1-MFA").unwrap()),
            status: None,
            limit: None,
            latest: true,
            json: true,
        };
        assert_eq!(execute(&latest, &store).unwrap(), 0);

        let limited = EvaluationsCommand::List {
            control: None,
            status: Some(EvaluationStatus::Pass),
            limit: Some(2),
            latest: false,
            json: false,
        };
        assert_eq!(execute(&limited, &store).unwrap(), 0);
    }
}
