//! Evidence records, store requests, filters and reports.

use std::collections::BTreeMap;

use assure_core::{ContentDigest, ControlId, EvaluationId, EvidenceId, EvidenceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::{ContentFormat, EvidenceContent};

/// Index entry describing one stored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Unique id; also the content file stem.
    pub id: EvidenceId,
    /// Artifact kind.
    pub evidence_type: EvidenceType,
    /// Controls this evidence supports.
    #[serde(default)]
    pub control_ids: Vec<ControlId>,
    /// Evaluation this evidence was collected for.
    #[serde(default)]
    pub evaluation_id: Option<EvaluationId>,
    /// System the evidence came from, e.g. `aws`.
    pub source: String,
    /// Content path relative to the vault root, `/` separated.
    pub location: String,
    /// Free-form attributes.
    #[serde(default)]
    pub metadata: Value,
    /// When the evidence was collected (UTC).
    pub collected_at: DateTime<Utc>,
    /// SHA-256 of the stored bytes.
    pub digest: ContentDigest,
    /// Stored size in bytes.
    pub size: u64,
    /// Stored encoding.
    pub format: ContentFormat,
}

/// A request to store one piece of evidence.
#[derive(Debug, Clone)]
pub struct StoreRequest {
    /// Artifact kind.
    pub evidence_type: EvidenceType,
    /// Originating system.
    pub source: String,
    /// Payload.
    pub content: EvidenceContent,
    /// Controls supported.
    pub control_ids: Vec<ControlId>,
    /// Related evaluation.
    pub evaluation_id: Option<EvaluationId>,
    /// Free-form attributes; must be a JSON object.
    pub metadata: Map<String, Value>,
}

impl StoreRequest {
    /// A request with no controls, evaluation or metadata.
    pub fn new(
        evidence_type: EvidenceType,
        source: impl Into<String>,
        content: impl Into<EvidenceContent>,
    ) -> Self {
        Self {
            evidence_type,
            source: source.into(),
            content: content.into(),
            control_ids: Vec::new(),
            evaluation_id: None,
            metadata: Map::new(),
        }
    }

    /// Link the evidence to controls.
    pub fn controls(mut self, ids: impl IntoIterator<Item = ControlId>) -> Self {
        self.control_ids.extend(ids);
        self
    }

    /// Link the evidence to an evaluation.
    pub fn evaluation(mut self, id: EvaluationId) -> Self {
        self.evaluation_id = Some(id);
        self
    }

    /// Add one metadata attribute.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Conjunctive filter for [`EvidenceVault::list`](crate::EvidenceVault::list).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceFilter {
    /// Evidence linked to this control.
    pub control_id: Option<ControlId>,
    /// Evidence linked to this evaluation.
    pub evaluation_id: Option<EvaluationId>,
    /// Evidence of this type.
    pub evidence_type: Option<EvidenceType>,
    /// Evidence from this source.
    pub source: Option<String>,
    /// Collected at or after.
    pub since: Option<DateTime<Utc>>,
    /// Collected at or before.
    pub until: Option<DateTime<Utc>>,
}

impl EvidenceFilter {
    /// Whether `evidence` satisfies every set criterion.
    pub fn matches(&self, evidence: &Evidence) -> bool {
        self.control_id
            .as_ref()
            .map_or(true, |c| evidence.control_ids.contains(c))
            && self
                .evaluation_id
                .map_or(true, |e| evidence.evaluation_id == Some(e))
            && self
                .evidence_type
                .map_or(true, |t| evidence.evidence_type == t)
            && self.source.as_deref().map_or(true, |s| evidence.source == s)
            && self.since.map_or(true, |t| evidence.collected_at >= t)
            && self.until.map_or(true, |t| evidence.collected_at <= t)
    }
}

/// Counts over the whole vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceSummary {
    /// Number of records.
    pub total_evidence: usize,
    /// Records per evidence type.
    pub by_type: BTreeMap<EvidenceType, usize>,
    /// Records per source.
    pub by_source: BTreeMap<String, usize>,
}

/// Result of re-verifying every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Records whose bytes match their digest.
    pub verified: Vec<EvidenceId>,
    /// Records whose content file is gone.
    pub missing: Vec<EvidenceId>,
    /// Records whose bytes no longer match.
    pub corrupted: Vec<EvidenceId>,
}

impl IntegrityReport {
    /// No missing or corrupted records.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.corrupted.is_empty()
    }
}
