//! # End-to-end evaluation pipeline
//!
//! Connectors → data context → evidence snapshots → engine → durable store,
//! then finding triage and evidence verification against the records the
//! run produced.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assure_cli::config::AssureConfig;
use assure_cli::evaluate::{configured_connectors, evaluate_and_record, Selection};
use assure_cli::{open_engine, open_store, open_vault};
use assure_connectors::{build_connector, collect_context, ConnectorSettings};
use assure_controls::{CatalogHandle, ControlCatalog, EvaluationEngine, RuleRegistry};
use assure_core::{ControlId, EvaluationStatus, EvidenceType, FindingStatus, Severity};
use assure_store::{EvaluationStore, FindingQuery, FindingUpdate, LogStore, StoreError};
use assure_vault::{EvidenceFilter, EvidenceVault, StoreRequest};

fn catalog_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../control_catalog")
}

fn config(dir: &Path) -> AssureConfig {
    AssureConfig {
        catalog_dir: catalog_dir(),
        vault_dir: dir.join("vault"),
        store_dir: dir.join("store"),
        evaluator: "pipeline-test".to_string(),
        ..AssureConfig::default()
    }
}

#[test]
fn full_run_against_mock_sources() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let engine = open_engine(&config).unwrap();
    let vault = open_vault(&config).unwrap();
    let store = open_store(&config).unwrap();
    let mut connectors = configured_connectors(&config).unwrap();

    let run = evaluate_and_record(&engine, &mut connectors, Some(&vault), &store, &Selection::All, 1)
        .unwrap();

    // Every shipped control ran; the demo data violates each rule.
    assert_eq!(run.batch.results.len(), engine.catalog().len());
    assert!(run.batch.failures.is_empty());
    let status = |id: &str| run.batch.get(id).unwrap().0.status;
    assert_eq!(status("CC6.1-MFA"), EvaluationStatus::Fail);
    assert_eq!(status("CC6.2-ORPHANED-ACCOUNTS"), EvaluationStatus::Warning);
    assert_eq!(status("CC6.6-PUBLIC-STORAGE"), EvaluationStatus::Fail);
    assert_eq!(status("CC7.2-AUDIT-LOGGING"), EvaluationStatus::Fail);
    assert_eq!(status("C1.1-ENCRYPTION-AT-REST"), EvaluationStatus::Fail);
    assert_eq!(status("A1.2-BACKUP-RETENTION"), EvaluationStatus::Fail);

    // Both administrators without MFA are reported, one per source.
    let (_, mfa_findings) = run.batch.get("CC6.1-MFA").unwrap();
    let mut resources: Vec<_> = mfa_findings.iter().filter_map(|f| f.resource_id.clone()).collect();
    resources.sort();
    assert_eq!(resources, vec!["okta-user-2".to_string(), "user-2".to_string()]);
    assert!(mfa_findings.iter().all(|f| f.severity == Severity::Critical));

    // Orphaned accounts: the DevOps IAM user and the former employee.
    let (orphans, review) = run.batch.get("CC6.2-ORPHANED-ACCOUNTS").unwrap();
    assert_eq!(orphans.details["items_needing_review"], 2);
    assert!(review.iter().all(|f| f.severity == Severity::Info));

    // Evaluations carry the evaluator and link to the snapshot evidence.
    for (evaluation, _) in &run.batch.results {
        assert_eq!(evaluation.evaluator, "pipeline-test");
        assert!(!evaluation.evidence_ids.is_empty());
        for id in &evaluation.evidence_ids {
            let (evidence, _) = vault.retrieve(id).unwrap().unwrap();
            assert_eq!(evidence.evidence_type, EvidenceType::Config);
            assert!(evidence.control_ids.contains(&evaluation.control_id));
        }
    }

    // Everything was persisted and survives a reopen.
    drop(store);
    let reopened = LogStore::open(&config.store_dir).unwrap();
    let latest = reopened
        .latest_evaluation(&ControlId::new("CC6.1-MFA").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(latest.status, EvaluationStatus::Fail);
    let persisted = reopened.list_findings(&FindingQuery::default()).unwrap();
    assert_eq!(persisted.len(), run.batch.finding_count());
    assert!(vault.verify_all().is_clean());
}

#[test]
fn finding_triage_persists_across_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let engine = open_engine(&config).unwrap();
    let store = open_store(&config).unwrap();
    let mut connectors = configured_connectors(&config).unwrap();
    evaluate_and_record(
        &engine,
        &mut connectors,
        None,
        &store,
        &Selection::Controls(vec!["CC7.2-AUDIT-LOGGING".to_string()]),
        1,
    )
    .unwrap();

    let open = store
        .list_findings(&FindingQuery {
            status: Some(FindingStatus::Open),
            ..FindingQuery::default()
        })
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].resource_id.as_deref(), Some("123456789012-us-west-2"));
    let id = open[0].id;

    store
        .update_finding_status(&id, &FindingUpdate::status(FindingStatus::InProgress).assign("sre-oncall"))
        .unwrap();
    store
        .update_finding_status(&id, &FindingUpdate::status(FindingStatus::Resolved))
        .unwrap();
    let err = store
        .update_finding_status(&id, &FindingUpdate::status(FindingStatus::InProgress))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
    drop(store);

    let reopened = LogStore::open(&config.store_dir).unwrap();
    let finding = reopened.get_finding(&id).unwrap();
    assert_eq!(finding.status, FindingStatus::Resolved);
    assert_eq!(finding.assigned_to.as_deref(), Some("sre-oncall"));
    assert!(finding.resolved_at.is_some());
}

#[test]
fn failed_connector_leaves_other_sources_evaluated() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let engine = open_engine(&config).unwrap();
    let store = open_store(&config).unwrap();

    let missing = tmp.path().join("missing.yaml").to_string_lossy().to_string();
    let mut connectors = vec![
        build_connector("okta", ConnectorSettings::new()).unwrap(),
        build_connector("file", ConnectorSettings::new().with("path", missing).with("name", "hr-export"))
            .unwrap(),
    ];
    let run = evaluate_and_record(&engine, &mut connectors, None, &store, &Selection::All, 2).unwrap();

    assert_eq!(run.connector_failures.len(), 1);
    assert_eq!(run.connector_failures[0].0, "hr-export");
    assert!(run.batch.failures.is_empty());

    // AWS collections are absent, so resource controls see no violations.
    let status = |id: &str| run.batch.get(id).unwrap().0.status;
    assert_eq!(status("CC6.6-PUBLIC-STORAGE"), EvaluationStatus::Pass);
    assert_eq!(status("A1.2-BACKUP-RETENTION"), EvaluationStatus::Pass);
    assert_eq!(status("CC6.1-MFA"), EvaluationStatus::Fail);
}

#[test]
fn catalog_reload_swaps_controls_atomically() {
    let tmp = tempfile::tempdir().unwrap();
    let rules = Arc::new(RuleRegistry::with_builtin_rules());
    let catalog = ControlCatalog::load(&catalog_dir(), &rules).unwrap();
    let before = catalog.len();
    let handle = CatalogHandle::new(catalog);
    let engine = EvaluationEngine::new(handle.clone(), Arc::clone(&rules));
    let pinned = engine.catalog();

    let single = tmp.path().join("only.yaml");
    std::fs::copy(catalog_dir().join("availability_controls.yaml"), &single).unwrap();
    handle.reload(&single, &rules).unwrap();

    assert_eq!(engine.catalog().len(), 1);
    assert_eq!(pinned.len(), before);

    // A broken catalog is rejected and the current one stays in place.
    std::fs::write(&single, "controls:\n  - id: X-1\n    name: x\n").unwrap();
    assert!(handle.reload(&single, &rules).is_err());
    assert_eq!(engine.catalog().len(), 1);

    let mut connectors = vec![build_connector("aws", ConnectorSettings::new()).unwrap()];
    let ctx = collect_context(&mut connectors).context;
    assert_eq!(engine.evaluate_all(&ctx, None).results.len(), 1);
}

#[test]
fn concurrent_stores_keep_every_record() {
    let tmp = tempfile::tempdir().unwrap();
    let vault = Arc::new(EvidenceVault::open(tmp.path()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let vault = Arc::clone(&vault);
            std::thread::spawn(move || {
                for i in 0..10 {
                    vault
                        .store(
                            StoreRequest::new(EvidenceType::Log, format!("worker-{t}"), format!("entry {i}"))
                                .meta("seq", i),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(vault.len(), 40);
    let reopened = EvidenceVault::open(tmp.path()).unwrap();
    assert_eq!(reopened.list(&EvidenceFilter::default()).len(), 40);
    assert_eq!(reopened.summary().by_source.len(), 4);
    assert!(reopened.verify_all().is_clean());
    assert!(reopened.orphans().unwrap().is_empty());

    let only = reopened.list(&EvidenceFilter {
        source: Some("worker-2".into()),
        ..EvidenceFilter::default()
    });
    assert_eq!(only.len(), 10);
    assert!(only.windows(2).all(|w| w[0].collected_at >= w[1].collected_at));
}
