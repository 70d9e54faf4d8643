//! # assure-store: Evaluation and Finding Persistence
//!
//! The [`EvaluationStore`] trait is the persistence seam for evaluation
//! results. Evaluations are immutable once created; a finding's status (and
//! assignee) is the only thing that changes, and only along the transitions
//! allowed by [`FindingStatus::can_transition_to`](assure_core::FindingStatus::can_transition_to).
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`] for tests and one-shot runs.
//! - [`LogStore`], a durable append-only journal replayed on open.

pub mod error;
pub mod journal;
pub mod memory;
pub mod query;

use assure_controls::{ControlEvaluation, Finding};
use assure_core::{ControlId, EvaluationId, FindingId};

pub use error::{StoreError, StoreResult};
pub use journal::{JournalEntry, LogStore, JOURNAL_FILE};
pub use memory::MemoryStore;
pub use query::{EvaluationQuery, FindingQuery, FindingUpdate};

/// Persistence for evaluations and findings.
pub trait EvaluationStore: Send + Sync {
    /// Store a new evaluation. Fails if the id exists.
    fn create_evaluation(&self, evaluation: &ControlEvaluation) -> StoreResult<()>;

    /// Fetch one evaluation.
    fn get_evaluation(&self, id: &EvaluationId) -> StoreResult<ControlEvaluation>;

    /// Evaluations matching `query`, newest first.
    fn list_evaluations(&self, query: &EvaluationQuery) -> StoreResult<Vec<ControlEvaluation>>;

    /// Store a new finding. Fails if the id exists.
    fn create_finding(&self, finding: &Finding) -> StoreResult<()>;

    /// Fetch one finding.
    fn get_finding(&self, id: &FindingId) -> StoreResult<Finding>;

    /// Findings matching `query`, newest first.
    fn list_findings(&self, query: &FindingQuery) -> StoreResult<Vec<Finding>>;

    /// Change a finding's status, returning the updated record.
    fn update_finding_status(&self, id: &FindingId, update: &FindingUpdate) -> StoreResult<Finding>;

    /// The most recent evaluation of a control.
    fn latest_evaluation(&self, control_id: &ControlId) -> StoreResult<Option<ControlEvaluation>> {
        let query = EvaluationQuery {
            control_id: Some(control_id.clone()),
            status: None,
            limit: Some(1),
        };
        Ok(self.list_evaluations(&query)?.into_iter().next())
    }

    /// Store an evaluation and the findings it raised.
    fn record_outcome(&self, evaluation: &ControlEvaluation, findings: &[Finding]) -> StoreResult<()> {
        self.create_evaluation(evaluation)?;
        for finding in findings {
            self.create_finding(finding)?;
        }
        Ok(())
    }
}
