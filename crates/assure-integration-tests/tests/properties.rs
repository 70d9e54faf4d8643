//! # Behavioural properties
//!
//! Catalog YAML in, evaluations and evidence out, checked against the
//! guarantees callers rely on: verified retrieval, tamper detection,
//! deterministic evaluation, success-condition semantics, manual-review
//! semantics, filtered listings, and batch isolation.

use std::sync::Arc;

use assure_controls::{
    CatalogHandle, ControlCatalog, ControlFilter, DataContext, EvaluationEngine, RuleRegistry,
    Violation,
};
use assure_core::{EvaluationStatus, EvidenceType, Severity, TscCategory};
use assure_vault::{EvidenceContent, EvidenceVault, StoreRequest, VaultError};
use proptest::prelude::*;
use serde_json::{json, Value};

fn engine(yaml: &str) -> EvaluationEngine {
    let rules = Arc::new(RuleRegistry::with_builtin_rules());
    let catalog = ControlCatalog::from_yaml_str(yaml, &rules).expect("catalog loads");
    EvaluationEngine::new(CatalogHandle::new(catalog), rules)
}

fn context(value: Value) -> DataContext {
    DataContext::from_value(value).expect("object context")
}

fn boolean_control(id: &str, rule: &str, condition: &str, threshold: Option<u64>) -> String {
    let threshold = threshold.map(|t| format!("\n      threshold: {t}")).unwrap_or_default();
    format!(
        r#"
  - id: {id}
    name: {id}
    description: test control
    tsc_reference: CC6.1
    category: Security
    control_type: Technical
    severity: high
    evaluation_frequency: daily
    logic:
      type: boolean_check
      rule: {rule}
      query: documentation only
      success_condition: "{condition}"{threshold}
      failure_message: "Found {{count}} violation(s)"
"#
    )
}

fn users(admins_without_mfa: usize) -> DataContext {
    let list: Vec<Value> = (0..admins_without_mfa)
        .map(|i| json!({"id": format!("u{i}"), "is_admin": true, "mfa_enabled": false}))
        .collect();
    context(json!({ "users": list }))
}

// =========================================================================
// 1-2: vault round trip and tamper detection
// =========================================================================

fn content_strategy() -> impl Strategy<Value = EvidenceContent> {
    prop_oneof![
        "[ -~]{0,64}".prop_map(EvidenceContent::Text),
        proptest::collection::vec(any::<u8>(), 0..128).prop_map(EvidenceContent::Binary),
        proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..6)
            .prop_map(|m| EvidenceContent::Structured(json!(m))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn retrieve_returns_exactly_the_stored_bytes(content in content_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let vault = EvidenceVault::open(dir.path()).unwrap();
        let expected = content.encode().unwrap();

        let stored = vault.store(StoreRequest::new(EvidenceType::Report, "prop", content)).unwrap();
        let (record, bytes) = vault.retrieve(&stored.id).unwrap().unwrap();

        prop_assert_eq!(&bytes, &expected);
        prop_assert_eq!(record.digest, assure_core::sha256_bytes(&bytes));
        prop_assert_eq!(record.size, bytes.len() as u64);
    }
}

#[test]
fn tampered_content_is_never_returned() {
    let dir = tempfile::tempdir().unwrap();
    let vault = EvidenceVault::open(dir.path()).unwrap();
    let stored = vault
        .collect_snapshot("aws", json!({"users": [{"id": "u1"}]}), Vec::new())
        .unwrap();

    let path = dir.path().join(&stored.location);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    match vault.retrieve(&stored.id) {
        Err(VaultError::Integrity { id, .. }) => assert_eq!(id, stored.id),
        other => panic!("expected integrity error, got {other:?}"),
    }
    let report = vault.verify_all();
    assert_eq!(report.corrupted, vec![stored.id]);
}

// =========================================================================
// 3: determinism
// =========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn evaluation_is_a_function_of_control_and_context(
        flags in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..15)
    ) {
        let list: Vec<Value> = flags
            .iter()
            .enumerate()
            .map(|(i, (admin, mfa))| json!({"id": format!("u{i}"), "is_admin": admin, "mfa_enabled": mfa}))
            .collect();
        let ctx = context(json!({ "users": list }));
        let engine = engine(&format!(
            "controls:{}",
            boolean_control("CC6.1-MFA", "admin_without_mfa", "row_count = 0", None)
        ));

        let (a, fa) = engine.evaluate("CC6.1-MFA", &ctx).unwrap();
        let (b, fb) = engine.evaluate("CC6.1-MFA", &ctx).unwrap();

        prop_assert_eq!(a.status, b.status);
        prop_assert_eq!(&a.details["violations"], &b.details["violations"]);
        let resources = |f: &[assure_controls::Finding]| {
            f.iter().map(|x| x.resource_id.clone()).collect::<Vec<_>>()
        };
        prop_assert_eq!(resources(&fa), resources(&fb));
        prop_assert_ne!(a.id, b.id);
    }
}

// =========================================================================
// 4-5: success conditions
// =========================================================================

#[test]
fn zero_violation_condition() {
    let engine = engine(&format!(
        "controls:{}",
        boolean_control("CC6.1-MFA", "admin_without_mfa", "row_count = 0", None)
    ));

    let (pass, none) = engine.evaluate("CC6.1-MFA", &users(0)).unwrap();
    assert_eq!(pass.status, EvaluationStatus::Pass);
    assert!(none.is_empty());

    let (fail, findings) = engine.evaluate("CC6.1-MFA", &users(3)).unwrap();
    assert_eq!(fail.status, EvaluationStatus::Fail);
    assert_eq!(findings.len(), 3);
    assert!(findings.iter().all(|f| f.severity == Severity::High));

    let (_, capped) = engine.evaluate("CC6.1-MFA", &users(25)).unwrap();
    assert_eq!(capped.len(), 10);
}

#[test]
fn threshold_condition() {
    let engine = engine(&format!(
        "controls:{}",
        boolean_control("CC6.1-MFA", "admin_without_mfa", "row_count <= threshold", Some(2))
    ));
    assert_eq!(engine.evaluate("CC6.1-MFA", &users(2)).unwrap().0.status, EvaluationStatus::Pass);
    assert_eq!(engine.evaluate("CC6.1-MFA", &users(3)).unwrap().0.status, EvaluationStatus::Fail);
}

#[test]
fn unrecognised_condition_uses_zero_rule() {
    let engine = engine(&format!(
        "controls:{}",
        boolean_control("CC6.1-MFA", "admin_without_mfa", "at most a few", Some(5))
    ));
    let (evaluation, _) = engine.evaluate("CC6.1-MFA", &users(1)).unwrap();
    assert_eq!(evaluation.status, EvaluationStatus::Fail);
    assert_eq!(evaluation.details["condition_fallback"], true);
}

// =========================================================================
// 6: manual review
// =========================================================================

#[test]
fn manual_review_warns_but_never_fails() {
    let engine = engine(
        r#"
- id: CC6.2-ORPHANED
  name: Orphaned accounts
  description: accounts must map to employees
  tsc_reference: CC6.2
  category: Security
  control_type: Administrative
  severity: critical
  evaluation_frequency: weekly
  logic:
    type: manual_review
    rule: orphaned_accounts
"#,
    );
    let flagged = context(json!({
        "users": [
            {"id": "a", "email": "a@x.io"},
            {"id": "b", "email": "b@x.io"},
        ],
        "hr_employees": [{"email": "a@x.io"}],
    }));
    let (warning, findings) = engine.evaluate("CC6.2-ORPHANED", &flagged).unwrap();
    assert_eq!(warning.status, EvaluationStatus::Warning);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].severity, Severity::Info);
    assert_eq!(findings[0].resource_id.as_deref(), Some("b"));

    let clean = context(json!({
        "users": [{"id": "a", "email": "a@x.io"}],
        "hr_employees": [{"email": "a@x.io"}],
    }));
    assert_eq!(engine.evaluate("CC6.2-ORPHANED", &clean).unwrap().0.status, EvaluationStatus::Pass);
}

// =========================================================================
// 7: worked example
// =========================================================================

#[test]
fn admin_without_mfa_example() {
    let engine = engine(&format!(
        "controls:{}",
        boolean_control("CC6.1-IAM-MFA", "admin_without_mfa", "row_count = 0", None)
    ));
    let ctx = context(json!({
        "users": [
            {"id": "u1", "is_admin": true, "mfa_enabled": false},
            {"id": "u2", "is_admin": false, "mfa_enabled": false},
        ]
    }));
    let (evaluation, findings) = engine.evaluate("CC6.1-IAM-MFA", &ctx).unwrap();
    assert_eq!(evaluation.status, EvaluationStatus::Fail);
    assert_eq!(evaluation.details["violation_count"], 1);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_id.as_deref(), Some("u1"));
    assert_eq!(evaluation.findings, vec![findings[0].id]);

    let violation = Violation::from_value(evaluation.details["violations"][0].clone());
    assert_eq!(violation.resource_id().as_deref(), Some("u1"));
}

// =========================================================================
// 8: listings
// =========================================================================

#[test]
fn listings_respect_enabled_flag_and_category() {
    let rules = RuleRegistry::with_builtin_rules();
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../control_catalog");
    let catalog = ControlCatalog::load(&dir, &rules).unwrap();

    let ids: Vec<&str> = catalog.iter().map(|c| c.id.as_str()).collect();
    let security = catalog.list(&ControlFilter::category(TscCategory::Security));
    assert!(!security.is_empty());
    assert!(security.iter().all(|c| c.category == TscCategory::Security));
    let positions: Vec<usize> = security
        .iter()
        .map(|c| ids.iter().position(|id| *id == c.id.as_str()).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    let disabled = format!(
        "controls:{}{}",
        boolean_control("ON-1", "admin_without_mfa", "row_count = 0", None),
        boolean_control("OFF-1", "admin_without_mfa", "row_count = 0", None)
            .replace("    logic:", "    enabled: false\n    logic:")
    );
    let catalog = ControlCatalog::from_yaml_str(&disabled, &rules).unwrap();
    let enabled = catalog.list(&ControlFilter::default());
    assert_eq!(enabled.len(), 1);
    assert!(enabled.iter().all(|c| c.enabled));
    assert!(catalog.get("OFF-1").is_some());
}

// =========================================================================
// 9: batch isolation
// =========================================================================

#[test]
fn malformed_control_does_not_abort_batch() {
    let broken = boolean_control("BROKEN-1", "admin_without_mfa", "row_count = 0", None)
        .replace("Found {count} violation(s)", "Found {total} violation(s)");
    let yaml = format!(
        "controls:{}{}{}",
        boolean_control("CC6.1-MFA", "admin_without_mfa", "row_count = 0", None),
        broken,
        boolean_control("CC6.6-S3", "public_s3_buckets", "row_count = 0", None),
    );
    let engine = engine(&yaml);

    let batch = engine.evaluate_all(&users(1), None);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].control_id.as_str(), "BROKEN-1");
    assert_eq!(batch.results.len(), 2);
    assert_eq!(batch.get("CC6.1-MFA").unwrap().0.status, EvaluationStatus::Fail);
    assert_eq!(batch.get("CC6.6-S3").unwrap().0.status, EvaluationStatus::Pass);

    let parallel = engine.evaluate_all_parallel(&users(1), None, 3).unwrap();
    assert_eq!(parallel.failures.len(), 1);
    assert_eq!(parallel.results.len(), 2);
}
