//! # In-Memory Store
//!
//! Evaluations and findings held in `parking_lot::RwLock`ed maps. All
//! operations are synchronous and never hold a lock across a callback
//! into caller code. `parking_lot` locks do not poison, so a panicking
//! writer does not wedge the store.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use assure_controls::{ControlEvaluation, Finding};
use assure_core::{EvaluationId, FindingId};
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::query::{sort_evaluations, sort_findings, EvaluationQuery, FindingQuery, FindingUpdate};
use crate::EvaluationStore;

/// Thread-safe keyed table.
#[derive(Debug)]
pub(crate) struct Table<K, T> {
    kind: &'static str,
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Table<K, T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, T> Table<K, T>
where
    K: Eq + Hash + Copy + std::fmt::Display,
    T: Clone,
{
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record whose key must be new.
    pub(crate) fn insert_new(&self, id: K, value: T) -> StoreResult<()> {
        let mut guard = self.data.write();
        if guard.contains_key(&id) {
            return Err(StoreError::Duplicate {
                kind: self.kind,
                id: id.to_string(),
            });
        }
        guard.insert(id, value);
        Ok(())
    }

    pub(crate) fn contains(&self, id: &K) -> bool {
        self.data.read().contains_key(id)
    }

    /// Insert or overwrite. Used by journal replay and committed updates.
    pub(crate) fn put(&self, id: K, value: T) {
        self.data.write().insert(id, value);
    }

    pub(crate) fn get(&self, id: &K) -> StoreResult<T> {
        self.data.read().get(id).cloned().ok_or_else(|| StoreError::NotFound {
            kind: self.kind,
            id: id.to_string(),
        })
    }

    pub(crate) fn filtered(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// Atomically read-validate-update a record.
    pub(crate) fn try_update<R>(
        &self,
        id: &K,
        f: impl FnOnce(&mut T) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut guard = self.data.write();
        let entry = guard.get_mut(id).ok_or_else(|| StoreError::NotFound {
            kind: self.kind,
            id: id.to_string(),
        })?;
        f(entry)
    }

    pub(crate) fn len(&self) -> usize {
        self.data.read().len()
    }
}

/// Volatile evaluation and finding store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    pub(crate) evaluations: Table<EvaluationId, ControlEvaluation>,
    pub(crate) findings: Table<FindingId, Finding>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            evaluations: Table::new("evaluation"),
            findings: Table::new("finding"),
        }
    }

    /// Number of stored evaluations.
    pub fn evaluation_count(&self) -> usize {
        self.evaluations.len()
    }

    /// Number of stored findings.
    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }

    /// The finding as it would look after `update`, without storing it.
    pub(crate) fn preview_update(&self, id: &FindingId, update: &FindingUpdate) -> StoreResult<Finding> {
        let mut finding = self.findings.get(id)?;
        update.apply(&mut finding, Utc::now())?;
        Ok(finding)
    }
}

impl EvaluationStore for MemoryStore {
    fn create_evaluation(&self, evaluation: &ControlEvaluation) -> StoreResult<()> {
        self.evaluations.insert_new(evaluation.id, evaluation.clone())
    }

    fn get_evaluation(&self, id: &EvaluationId) -> StoreResult<ControlEvaluation> {
        self.evaluations.get(id)
    }

    fn list_evaluations(&self, query: &EvaluationQuery) -> StoreResult<Vec<ControlEvaluation>> {
        let mut items = self.evaluations.filtered(|e| query.matches(e));
        sort_evaluations(&mut items);
        if let Some(limit) = query.limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    fn create_finding(&self, finding: &Finding) -> StoreResult<()> {
        self.findings.insert_new(finding.id, finding.clone())
    }

    fn get_finding(&self, id: &FindingId) -> StoreResult<Finding> {
        self.findings.get(id)
    }

    fn list_findings(&self, query: &FindingQuery) -> StoreResult<Vec<Finding>> {
        let mut items = self.findings.filtered(|f| query.matches(f));
        sort_findings(&mut items);
        Ok(items)
    }

    fn update_finding_status(&self, id: &FindingId, update: &FindingUpdate) -> StoreResult<Finding> {
        self.findings.try_update(id, |finding| {
            update.apply(finding, Utc::now())?;
            Ok(finding.clone())
        })
    }
}
