//! # Evaluation Engine
//!
//! Applies a control's logic to a [`DataContext`] and produces a
//! [`ControlEvaluation`] plus the [`Finding`]s it raises. The engine never
//! persists anything; callers attach evidence and hand results to a store.
//!
//! ## Logic types
//!
//! - `boolean_check`: run the declared rule, test the success condition
//!   against the violation count. Pass or Fail. On Fail, one finding per
//!   violation up to [`MAX_VIOLATION_FINDINGS`], at the control's severity.
//! - `manual_review`: run the declared rule; Warning if anything is flagged,
//!   otherwise Pass. Up to [`MAX_REVIEW_FINDINGS`] info findings.
//! - anything else: NotEvaluated with an explanatory `error` detail.
//!
//! ## Isolation
//!
//! Batch evaluation catches errors and panics per control. A failing control
//! is logged, recorded in [`EvaluationBatch::failures`] and skipped; every
//! other control still runs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use assure_core::{
    EvaluationId, EvaluationStatus, FindingId, FindingStatus, Severity, TscCategory,
};
use chrono::Utc;
use rayon::prelude::*;
use serde_json::{json, Value};

use crate::catalog::{CatalogHandle, ControlCatalog, ControlFilter};
use crate::context::DataContext;
use crate::control::{
    render_failure_message, BooleanCheck, Control, ControlLogic, ManualReview,
    DEFAULT_REMEDIATION,
};
use crate::error::EngineError;
use crate::result::{ControlEvaluation, EvaluationBatch, EvaluationFailure, Finding};
use crate::rules::{RuleRegistry, Violation};

/// Findings raised per failed boolean check, at most.
pub const MAX_VIOLATION_FINDINGS: usize = 10;

/// Findings raised per manual review, at most.
pub const MAX_REVIEW_FINDINGS: usize = 5;

/// Evaluator recorded when none is configured.
pub const DEFAULT_EVALUATOR: &str = "system";

/// Evaluation output for one control.
pub type Outcome = (ControlEvaluation, Vec<Finding>);

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluates catalog controls against data contexts.
#[derive(Debug, Clone)]
pub struct EvaluationEngine {
    catalog: CatalogHandle,
    rules: Arc<RuleRegistry>,
    evaluator: String,
}

impl EvaluationEngine {
    /// Create an engine over a catalog and the registry it was loaded with.
    pub fn new(catalog: CatalogHandle, rules: Arc<RuleRegistry>) -> Self {
        Self {
            catalog,
            rules,
            evaluator: DEFAULT_EVALUATOR.to_string(),
        }
    }

    /// Record `evaluator` on every evaluation.
    pub fn with_evaluator(mut self, evaluator: impl Into<String>) -> Self {
        self.evaluator = evaluator.into();
        self
    }

    /// Snapshot of the current catalog.
    pub fn catalog(&self) -> Arc<ControlCatalog> {
        self.catalog.snapshot()
    }

    /// The rule registry.
    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Evaluate one control by id.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownControl`] if the id is not in the catalog, or
    /// any error from [`evaluate_control`](Self::evaluate_control).
    pub fn evaluate(&self, control_id: &str, ctx: &DataContext) -> Result<Outcome, EngineError> {
        let catalog = self.catalog.snapshot();
        let control = catalog
            .get(control_id)
            .ok_or_else(|| EngineError::UnknownControl(control_id.to_string()))?;
        self.evaluate_control(control, ctx)
    }

    /// Evaluate a control definition.
    ///
    /// Status and violations depend only on `control` and `ctx`.
    pub fn evaluate_control(
        &self,
        control: &Control,
        ctx: &DataContext,
    ) -> Result<Outcome, EngineError> {
        let evaluation_id = EvaluationId::new();
        let (status, details, findings) = match &control.logic {
            ControlLogic::BooleanCheck(check) => {
                self.boolean_check(control, check, ctx, evaluation_id)?
            }
            ControlLogic::ManualReview(review) => {
                self.manual_review(control, review, ctx, evaluation_id)?
            }
            ControlLogic::Unrecognized { type_name } => {
                tracing::warn!(
                    control_id = %control.id,
                    logic_type = %type_name,
                    "control not evaluated: unknown logic type"
                );
                (
                    EvaluationStatus::NotEvaluated,
                    json!({ "error": format!("Unknown logic type: {type_name}") }),
                    Vec::new(),
                )
            }
        };

        metrics::counter!("assure_evaluations_total", "status" => status.as_str()).increment(1);
        tracing::debug!(
            control_id = %control.id,
            evaluation_id = %evaluation_id,
            %status,
            findings = findings.len(),
            "control evaluated"
        );

        let evaluation = ControlEvaluation {
            id: evaluation_id,
            control_id: control.id.clone(),
            status,
            evaluated_at: Utc::now(),
            details,
            findings: findings.iter().map(|f| f.id).collect(),
            evidence_ids: Vec::new(),
            evaluator: self.evaluator.clone(),
        };
        Ok((evaluation, findings))
    }

    /// Evaluate every enabled control, optionally restricted to a category.
    pub fn evaluate_all(&self, ctx: &DataContext, category: Option<TscCategory>) -> EvaluationBatch {
        let catalog = self.catalog.snapshot();
        let controls = catalog.list(&filter_for(category));
        collect_batch(controls.into_iter().map(|c| (c, self.isolated(c, ctx))))
    }

    /// Evaluate the listed controls. Unknown ids are skipped.
    pub fn evaluate_selected<S: AsRef<str>>(&self, ids: &[S], ctx: &DataContext) -> EvaluationBatch {
        let catalog = self.catalog.snapshot();
        let controls: Vec<&Control> = ids
            .iter()
            .filter_map(|id| {
                let found = catalog.get(id.as_ref());
                if found.is_none() {
                    tracing::debug!(control_id = id.as_ref(), "skipping unknown control");
                }
                found
            })
            .collect();
        collect_batch(controls.into_iter().map(|c| (c, self.isolated(c, ctx))))
    }

    /// [`evaluate_all`](Self::evaluate_all) on a pool of `workers` threads.
    ///
    /// Results keep catalog order and per-control isolation.
    pub fn evaluate_all_parallel(
        &self,
        ctx: &DataContext,
        category: Option<TscCategory>,
        workers: usize,
    ) -> Result<EvaluationBatch, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("assure-eval-{i}"))
            .build()
            .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
        let catalog = self.catalog.snapshot();
        let controls = catalog.list(&filter_for(category));
        let outcomes: Vec<_> =
            pool.install(|| controls.par_iter().map(|c| self.isolated(c, ctx)).collect());
        Ok(collect_batch(controls.into_iter().zip(outcomes)))
    }

    /// Evaluate one control, turning errors and panics into a failure
    /// message.
    fn isolated(&self, control: &Control, ctx: &DataContext) -> Result<Outcome, String> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.evaluate_control(control, ctx))) {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }

    // -----------------------------------------------------------------------
    // Logic types
    // -----------------------------------------------------------------------

    fn violations(
        &self,
        control: &Control,
        rule: &str,
        ctx: &DataContext,
    ) -> Result<(Vec<Violation>, Vec<&'static str>), EngineError> {
        let implementation = self.rules.get(rule).ok_or_else(|| EngineError::MalformedLogic {
            control_id: control.id.to_string(),
            detail: format!("rule \"{rule}\" is not registered"),
        })?;
        let missing: Vec<&'static str> = implementation
            .collections()
            .iter()
            .copied()
            .filter(|name| ctx.get(name).is_none())
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                control_id = %control.id,
                rule = %rule,
                missing = ?missing,
                "data context lacks collections read by rule"
            );
        }
        let violations = implementation.violations(ctx).map_err(|source| EngineError::Rule {
            control_id: control.id.to_string(),
            rule: rule.to_string(),
            source,
        })?;
        Ok((violations, missing))
    }

    fn boolean_check(
        &self,
        control: &Control,
        check: &BooleanCheck,
        ctx: &DataContext,
        evaluation_id: EvaluationId,
    ) -> Result<(EvaluationStatus, Value, Vec<Finding>), EngineError> {
        let (violations, missing) = self.violations(control, &check.rule, ctx)?;
        let count = violations.len();
        let passed = check.success_condition.holds(count as u64, check.threshold);
        let status = if passed {
            EvaluationStatus::Pass
        } else {
            EvaluationStatus::Fail
        };

        let mut findings = Vec::new();
        if !passed {
            let message = render_failure_message(&check.failure_message, count).map_err(
                |detail| EngineError::MalformedLogic {
                    control_id: control.id.to_string(),
                    detail: format!("failure_message: {detail}"),
                },
            )?;
            let remediation = check
                .remediation
                .clone()
                .unwrap_or_else(|| DEFAULT_REMEDIATION.to_string());
            for (i, violation) in violations.iter().take(MAX_VIOLATION_FINDINGS).enumerate() {
                findings.push(new_finding(
                    control,
                    evaluation_id,
                    format!("{} - Violation {}", control.name, i + 1),
                    format!("{message}\n\nDetails: {violation}"),
                    control.severity,
                    violation,
                    Some(remediation.clone()),
                ));
            }
        }

        let mut details = json!({
            "violation_count": count,
            "violations": violations,
            "query": check.query,
            "success_condition": check.success_condition,
            "rule": check.rule,
        });
        if check.success_condition.is_fallback() {
            details["condition_fallback"] = Value::Bool(true);
        }
        if !missing.is_empty() {
            details["missing_collections"] = json!(missing);
        }
        Ok((status, details, findings))
    }

    fn manual_review(
        &self,
        control: &Control,
        review: &ManualReview,
        ctx: &DataContext,
        evaluation_id: EvaluationId,
    ) -> Result<(EvaluationStatus, Value, Vec<Finding>), EngineError> {
        let (items, missing) = self.violations(control, &review.rule, ctx)?;
        let status = if items.is_empty() {
            EvaluationStatus::Pass
        } else {
            EvaluationStatus::Warning
        };
        let findings = items
            .iter()
            .take(MAX_REVIEW_FINDINGS)
            .enumerate()
            .map(|(i, item)| {
                new_finding(
                    control,
                    evaluation_id,
                    format!("{} - Review Required {}", control.name, i + 1),
                    format!("Manual review required for: {item}"),
                    Severity::Info,
                    item,
                    review.remediation.clone(),
                )
            })
            .collect();
        let mut details = json!({
            "items_needing_review": items.len(),
            "items": items,
            "requires_manual_review": true,
            "rule": review.rule,
        });
        if !missing.is_empty() {
            details["missing_collections"] = json!(missing);
        }
        Ok((status, details, findings))
    }
}

fn new_finding(
    control: &Control,
    evaluation_id: EvaluationId,
    title: String,
    description: String,
    severity: Severity,
    violation: &Violation,
    remediation: Option<String>,
) -> Finding {
    Finding {
        id: FindingId::new(),
        control_id: control.id.clone(),
        evaluation_id,
        title,
        description,
        severity,
        status: FindingStatus::Open,
        resource_id: violation.resource_id(),
        remediation,
        discovered_at: Utc::now(),
        resolved_at: None,
        assigned_to: None,
    }
}

fn filter_for(category: Option<TscCategory>) -> ControlFilter {
    ControlFilter {
        category,
        ..ControlFilter::default()
    }
}

fn collect_batch<'a>(
    outcomes: impl Iterator<Item = (&'a Control, Result<Outcome, String>)>,
) -> EvaluationBatch {
    let mut batch = EvaluationBatch::default();
    for (control, outcome) in outcomes {
        match outcome {
            Ok(result) => batch.results.push(result),
            Err(error) => {
                tracing::warn!(control_id = %control.id, %error, "control evaluation failed; skipping");
                metrics::counter!("assure_evaluation_failures_total").increment(1);
                batch.failures.push(EvaluationFailure {
                    control_id: control.id.clone(),
                    error,
                });
            }
        }
    }
    batch
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
