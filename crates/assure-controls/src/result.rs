//! Evaluation results and findings produced by the engine.

use assure_core::{
    ControlId, EvaluationId, EvaluationStatus, EvidenceId, FindingId, FindingStatus, Severity,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of evaluating one control once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEvaluation {
    /// Unique evaluation id.
    pub id: EvaluationId,
    /// The evaluated control.
    pub control_id: ControlId,
    /// Outcome.
    pub status: EvaluationStatus,
    /// When the evaluation ran (UTC).
    pub evaluated_at: DateTime<Utc>,
    /// Logic-specific details, e.g. `violation_count` and `violations`.
    pub details: Value,
    /// Findings raised, in creation order.
    pub findings: Vec<FindingId>,
    /// Evidence supporting the evaluation.
    pub evidence_ids: Vec<EvidenceId>,
    /// Who or what ran the evaluation.
    pub evaluator: String,
}

impl ControlEvaluation {
    /// Attach evidence ids before the evaluation is persisted.
    pub fn with_evidence(mut self, ids: impl IntoIterator<Item = EvidenceId>) -> Self {
        for id in ids {
            if !self.evidence_ids.contains(&id) {
                self.evidence_ids.push(id);
            }
        }
        self
    }
}

/// A specific issue raised by an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Unique finding id.
    pub id: FindingId,
    /// Control that raised it.
    pub control_id: ControlId,
    /// Evaluation that raised it.
    pub evaluation_id: EvaluationId,
    /// Short title, e.g. `MFA for administrators - Violation 1`.
    pub title: String,
    /// Explanation including the violating record.
    pub description: String,
    /// Control severity, or `info` for review items.
    pub severity: Severity,
    /// Lifecycle state; the only field that changes after creation.
    pub status: FindingStatus,
    /// Affected resource, when known.
    pub resource_id: Option<String>,
    /// Remediation guidance.
    pub remediation: Option<String>,
    /// When the finding was raised.
    pub discovered_at: DateTime<Utc>,
    /// Set when the finding moves to resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Owner, if assigned.
    pub assigned_to: Option<String>,
}

/// A control whose evaluation failed during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationFailure {
    /// The control that could not be evaluated.
    pub control_id: ControlId,
    /// Error or panic message.
    pub error: String,
}

/// Result of evaluating many controls.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationBatch {
    /// Successful evaluations with their findings, in catalog order.
    pub results: Vec<(ControlEvaluation, Vec<Finding>)>,
    /// Controls skipped because their evaluation failed.
    pub failures: Vec<EvaluationFailure>,
}

impl EvaluationBatch {
    /// The evaluation for `control_id`, if it succeeded.
    pub fn get(&self, control_id: &str) -> Option<&(ControlEvaluation, Vec<Finding>)> {
        self.results
            .iter()
            .find(|(e, _)| e.control_id.as_str() == control_id)
    }

    /// Number of evaluations with `status`.
    pub fn count(&self, status: EvaluationStatus) -> usize {
        self.results.iter().filter(|(e, _)| e.status == status).count()
    }

    /// Total findings raised across the batch.
    pub fn finding_count(&self) -> usize {
        self.results.iter().map(|(_, f)| f.len()).sum()
    }
}
