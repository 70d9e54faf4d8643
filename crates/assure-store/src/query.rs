//! Query filters and the finding update request.

use assure_controls::{ControlEvaluation, Finding};
use assure_core::{ControlId, EvaluationId, EvaluationStatus, FindingStatus, Severity};
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};

/// Filter for evaluations. Set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationQuery {
    /// Only this control.
    pub control_id: Option<ControlId>,
    /// Only this status.
    pub status: Option<EvaluationStatus>,
    /// Return at most this many, newest first.
    pub limit: Option<usize>,
}

impl EvaluationQuery {
    pub(crate) fn matches(&self, e: &ControlEvaluation) -> bool {
        self.control_id.as_ref().map_or(true, |c| &e.control_id == c)
            && self.status.map_or(true, |s| e.status == s)
    }
}

/// Filter for findings. Set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindingQuery {
    /// Only this control.
    pub control_id: Option<ControlId>,
    /// Only this evaluation.
    pub evaluation_id: Option<EvaluationId>,
    /// Only this status.
    pub status: Option<FindingStatus>,
    /// Only this severity.
    pub severity: Option<Severity>,
}

impl FindingQuery {
    pub(crate) fn matches(&self, f: &Finding) -> bool {
        self.control_id.as_ref().map_or(true, |c| &f.control_id == c)
            && self.evaluation_id.map_or(true, |e| f.evaluation_id == e)
            && self.status.map_or(true, |s| f.status == s)
            && self.severity.map_or(true, |s| f.severity == s)
    }
}

/// Change to a finding's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingUpdate {
    /// Target status.
    pub status: FindingStatus,
    /// New assignee; `None` leaves the current one.
    pub assigned_to: Option<String>,
}

impl FindingUpdate {
    /// Move to `status` without changing the assignee.
    pub fn status(status: FindingStatus) -> Self {
        Self {
            status,
            assigned_to: None,
        }
    }

    /// Also assign the finding.
    pub fn assign(mut self, who: impl Into<String>) -> Self {
        self.assigned_to = Some(who.into());
        self
    }

    /// Apply to `finding` at time `now`.
    ///
    /// Resolving stamps `resolved_at`; reopening clears it.
    pub fn apply(&self, finding: &mut Finding, now: DateTime<Utc>) -> StoreResult<()> {
        if !finding.status.can_transition_to(self.status) {
            return Err(StoreError::InvalidTransition {
                from: finding.status,
                to: self.status,
            });
        }
        finding.status = self.status;
        finding.resolved_at = match self.status {
            FindingStatus::Resolved => Some(now),
            _ => None,
        };
        if let Some(who) = &self.assigned_to {
            finding.assigned_to = Some(who.clone());
        }
        Ok(())
    }
}

/// Newest first, ties broken by id for a stable order.
pub(crate) fn sort_evaluations(items: &mut [ControlEvaluation]) {
    items.sort_by(|a, b| b.evaluated_at.cmp(&a.evaluated_at).then_with(|| b.id.cmp(&a.id)));
}

/// Newest first, then by id.
pub(crate) fn sort_findings(items: &mut [Finding]) {
    items.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at).then_with(|| a.id.cmp(&b.id)));
}
