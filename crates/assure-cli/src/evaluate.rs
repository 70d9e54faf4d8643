//! # Evaluate Subcommand
//!
//! One evaluation run end to end:
//!
//! 1. Collect a data context from the configured connectors (or a data file).
//! 2. Store each connector's raw collections in the vault as a configuration
//!    snapshot, linked to the controls that declare that source.
//! 3. Evaluate the selected controls.
//! 4. Attach snapshot evidence to each evaluation and record evaluations and
//!    findings in the store.
//!
//! Exit code is 0 when every evaluated control passed or warned, 1 when any
//! control failed or could not be evaluated.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use assure_connectors::{build_connector, collect_context, Connector, ConnectorSettings};
use assure_controls::{EvaluationBatch, EvaluationEngine};
use assure_core::{ControlId, EvaluationStatus, TscCategory};
use assure_store::EvaluationStore;
use assure_vault::{Evidence, EvidenceVault};

use crate::config::AssureConfig;
use crate::{open_engine, open_store, open_vault, print_json};

/// Arguments for `assure evaluate`.
#[derive(Args, Debug, Default)]
pub struct EvaluateArgs {
    /// Evaluate only this control. Repeatable.
    #[arg(long = "control", value_name = "ID")]
    pub controls: Vec<String>,

    /// Evaluate only controls in this Trust Services category.
    #[arg(long, conflicts_with = "controls")]
    pub category: Option<TscCategory>,

    /// Read collections from this JSON/YAML file instead of the configured
    /// connectors.
    #[arg(long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Evaluation threads; overrides the configured value.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Do not store connector snapshots in the evidence vault.
    #[arg(long)]
    pub no_evidence: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Which controls a run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every enabled control.
    #[default]
    All,
    /// Enabled controls in one category.
    Category(TscCategory),
    /// Specific controls, enabled or not.
    Controls(Vec<String>),
}

/// Everything an evaluation run produced.
#[derive(Debug, Default, Serialize)]
pub struct EvaluationRun {
    /// Evaluations, findings and per-control failures.
    pub batch: EvaluationBatch,
    /// Snapshot evidence stored for this run.
    pub evidence: Vec<Evidence>,
    /// Connectors that failed and were skipped, with the error.
    pub connector_failures: Vec<(String, String)>,
}

impl EvaluationRun {
    /// Whether any control failed or errored.
    pub fn has_failures(&self) -> bool {
        !self.batch.failures.is_empty() || self.batch.count(EvaluationStatus::Fail) > 0
    }
}

/// Execute the evaluate subcommand.
pub fn run_evaluate(args: &EvaluateArgs, config: &AssureConfig) -> Result<u8> {
    let engine = open_engine(config)?;
    let store = open_store(config)?;
    let vault = if args.no_evidence {
        None
    } else {
        Some(open_vault(config)?)
    };
    let mut connectors = match &args.data {
        Some(path) => vec![build_connector(
            "file",
            ConnectorSettings::new().with("path", path.to_string_lossy().to_string()),
        )?],
        None => configured_connectors(config)?,
    };

    let selection = if !args.controls.is_empty() {
        Selection::Controls(args.controls.clone())
    } else if let Some(category) = args.category {
        Selection::Category(category)
    } else {
        Selection::All
    };
    let workers = args.workers.unwrap_or(config.workers);

    let run = evaluate_and_record(
        &engine,
        &mut connectors,
        vault.as_ref(),
        &store,
        &selection,
        workers,
    )?;

    if args.json {
        print_json(&run)?;
    } else {
        print_report(&run);
    }
    Ok(u8::from(run.has_failures()))
}

/// Instantiate every connector named in the configuration.
pub fn configured_connectors(config: &AssureConfig) -> Result<Vec<Box<dyn Connector>>> {
    config
        .connectors
        .iter()
        .map(|c| {
            build_connector(&c.kind, c.settings.clone())
                .with_context(|| format!("invalid connector `{}`", c.kind))
        })
        .collect()
}

/// Collect, snapshot, evaluate and record.
///
/// Connector failures are reported in the run and do not abort it. Vault and
/// store errors do.
pub fn evaluate_and_record(
    engine: &EvaluationEngine,
    connectors: &mut [Box<dyn Connector>],
    vault: Option<&EvidenceVault>,
    store: &dyn EvaluationStore,
    selection: &Selection,
    workers: usize,
) -> Result<EvaluationRun> {
    let catalog = engine.catalog();
    if let Selection::Controls(ids) = selection {
        let unknown: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| catalog.get(id).is_none())
            .collect();
        if !unknown.is_empty() {
            bail!("unknown control(s): {}", unknown.join(", "));
        }
    }

    let collected = collect_context(connectors);
    let mut evidence = Vec::new();
    if let Some(vault) = vault {
        for (source, collections) in collected.snapshots {
            let linked: Vec<ControlId> = catalog
                .iter()
                .filter(|c| c.sources.iter().any(|s| s == &source))
                .map(|c| c.id.clone())
                .collect();
            let data = Value::Object(collections.into_iter().collect());
            let stored = vault
                .collect_snapshot(&source, data, linked)
                .with_context(|| format!("failed to store {source} snapshot"))?;
            tracing::info!(evidence_id = %stored.id, source = %source, "stored configuration snapshot");
            evidence.push(stored);
        }
    }

    let mut batch = match selection {
        Selection::Controls(ids) => engine.evaluate_selected(ids.as_slice(), &collected.context),
        Selection::Category(c) if workers > 1 => {
            engine.evaluate_all_parallel(&collected.context, Some(*c), workers)?
        }
        Selection::All if workers > 1 => engine.evaluate_all_parallel(&collected.context, None, workers)?,
        Selection::Category(c) => engine.evaluate_all(&collected.context, Some(*c)),
        Selection::All => engine.evaluate_all(&collected.context, None),
    };

    for (evaluation, findings) in &mut batch.results {
        evaluation.evidence_ids.extend(
            evidence
                .iter()
                .filter(|e| e.control_ids.contains(&evaluation.control_id))
                .map(|e| e.id),
        );
        store
            .record_outcome(evaluation, findings)
            .with_context(|| format!("failed to record evaluation of {}", evaluation.control_id))?;
    }

    tracing::info!(
        evaluated = batch.results.len(),
        failed = batch.count(EvaluationStatus::Fail),
        errors = batch.failures.len(),
        findings = batch.finding_count(),
        "evaluation run complete"
    );

    Ok(EvaluationRun {
        batch,
        evidence,
        connector_failures: collected.failures,
    })
}

fn print_report(run: &EvaluationRun) {
    for (name, error) in &run.connector_failures {
        println!("WARN: connector {name} skipped: {error}");
    }
    for (evaluation, findings) in &run.batch.results {
        println!(
            "{:<14} {:<28} {} finding(s)",
            evaluation.status.as_str().to_uppercase(),
            evaluation.control_id,
            findings.len()
        );
    }
    for failure in &run.batch.failures {
        println!("{:<14} {:<28} {}", "ERROR", failure.control_id, failure.error);
    }
    println!(
        "{} evaluated: {} pass, {} fail, {} warning, {} not evaluated, {} error(s); {} finding(s); {} evidence item(s)",
        run.batch.results.len(),
        run.batch.count(EvaluationStatus::Pass),
        run.batch.count(EvaluationStatus::Fail),
        run.batch.count(EvaluationStatus::Warning),
        run.batch.count(EvaluationStatus::NotEvaluated),
        run.batch.failures.len(),
        run.batch.finding_count(),
        run.evidence.len(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use assure_store::{EvaluationQuery, FindingQuery, LogStore};
    use assure_vault::EvidenceFilter;

    fn run(dir: &std::path::Path, selection: Selection, workers: usize) -> EvaluationRun {
        let config = testing::config(dir);
        let engine = open_engine(&config).unwrap();
        let vault = open_vault(&config).unwrap();
        let store = open_store(&config).unwrap();
        let mut connectors = configured_connectors(&config).unwrap();
        evaluate_and_record(&engine, &mut connectors, Some(&vault), &store, &selection, workers).unwrap()
    }

    #[test]
    fn mock_connectors_fail_every_boolean_check() {
        let dir = tempfile::tempdir().unwrap();
        let run = run(dir.path(), Selection::All, 1);

        assert!(run.connector_failures.is_empty());
        assert_eq!(run.batch.results.len(), 6);
        assert!(run.batch.failures.is_empty());
        assert_eq!(run.batch.count(EvaluationStatus::Fail), 5);
        assert_eq!(run.batch.count(EvaluationStatus::Warning), 1);
        assert!(run.has_failures());

        let (mfa, findings) = run.batch.get("CC6.1-MFA").unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(mfa.details["violation_count"], 2);
    }

    #[test]
    fn snapshots_are_linked_by_source() {
        let dir = tempfile::tempdir().unwrap();
        let run = run(dir.path(), Selection::All, 1);
        assert_eq!(run.evidence.len(), 2);

        let aws = run.evidence.iter().find(|e| e.source == "aws").unwrap();
        let okta = run.evidence.iter().find(|e| e.source == "okta").unwrap();
        let orphaned = ControlId::new("CC6.2-ORPHANED-ACCOUNTS").unwrap();
        assert!(okta.control_ids.contains(&orphaned));
        assert!(!aws.control_ids.contains(&orphaned));

        let (mfa, _) = run.batch.get("CC6.1-MFA").unwrap();
        assert_eq!(mfa.evidence_ids.len(), 2);
        let (backup, _) = run.batch.get("A1.2-BACKUP-RETENTION").unwrap();
        assert_eq!(backup.evidence_ids, vec![aws.id]);
    }

    #[test]
    fn results_are_recorded_durably() {
        let dir = tempfile::tempdir().unwrap();
        let produced = run(dir.path(), Selection::Category(TscCategory::Security), 2);
        assert_eq!(produced.batch.results.len(), 4);

        let store = LogStore::open(&dir.path().join("store")).unwrap();
        let evaluations = store.list_evaluations(&EvaluationQuery::default()).unwrap();
        assert_eq!(evaluations.len(), 4);
        let findings = store.list_findings(&FindingQuery::default()).unwrap();
        assert_eq!(findings.len(), produced.batch.finding_count());

        let vault = EvidenceVault::open(dir.path().join("vault")).unwrap();
        assert_eq!(vault.list(&EvidenceFilter::default()).len(), 2);
    }

    #[test]
    fn unknown_selected_control_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = testing::config(dir.path());
        let engine = open_engine(&config).unwrap();
        let store = open_store(&config).unwrap();
        let err = evaluate_and_record(
            &engine,
            &mut [],
            None,
            &store,
            &Selection::Controls(vec!["CC6.1-MFA".into(), "XX-1".into()]),
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("XX-1"));
    }

    #[test]
    fn clean_data_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("clean.yaml");
        std::fs::write(
            &data,
            "users:\n  - id: u1\n    email: a@example.com\n    is_admin: true\n    mfa_enabled: true\n",
        )
        .unwrap();
        let args = EvaluateArgs {
            controls: vec!["CC6.1-MFA".to_string()],
            data: Some(data),
            no_evidence: true,
            ..EvaluateArgs::default()
        };
        assert_eq!(run_evaluate(&args, &testing::config(dir.path())).unwrap(), 0);
        assert!(!dir.path().join("vault").join("metadata.json").exists());
    }
}
