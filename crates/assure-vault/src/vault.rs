//! # Evidence Vault
//!
//! Append-only storage for evidentiary artifacts. Content lives at
//! `<root>/<yyyy>/<mm>/<dd>/<type>/<id>.<ext>` (UTC date of collection) and
//! every record is listed in the [metadata index](crate::index).
//!
//! ## Integrity Invariant
//!
//! Each record carries the SHA-256 of its stored bytes. [`EvidenceVault::retrieve`]
//! recomputes the digest on every read and compares in constant time; a
//! mismatch is an error, never a silent success.
//!
//! ## Write Protocol
//!
//! 1. Content is written to a temp file in its target directory, synced,
//!    and renamed into place.
//! 2. The record is added to the index, which is rewritten atomically.
//! 3. If step 2 fails the content file is removed and the call errors, so
//!    no record points at missing content and no content is left unindexed.
//!
//! Both steps run under the exclusive index lock, as does the orphan sweep,
//! so a sweep never sees content that is about to be indexed. The lock is
//! shared between processes; see [`crate::index`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use assure_core::{sha256_bytes, ControlId, EvidenceId, EvidenceType};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::content::EvidenceContent;
use crate::error::{VaultError, VaultResult};
use crate::index::{write_atomically, LockMode, LockedIndex, MetadataIndex, INDEX_FILE, LOCK_FILE};
use crate::record::{
    Evidence, EvidenceFilter, EvidenceSummary, IntegrityReport, StoreRequest,
};

/// Filesystem-backed evidence vault.
#[derive(Debug)]
pub struct EvidenceVault {
    root: PathBuf,
    index: Mutex<MetadataIndex>,
}

impl EvidenceVault {
    /// Open (or create) a vault rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> VaultResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| VaultError::io(&root, e))?;
        let index = MetadataIndex::open(&root)?;
        tracing::debug!(root = %root.display(), records = index.len(), "opened evidence vault");
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    /// The vault root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// True when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store evidence collected now.
    pub fn store(&self, request: StoreRequest) -> VaultResult<Evidence> {
        self.store_at(request, Utc::now())
    }

    /// Store evidence with an explicit collection time, e.g. when importing
    /// artifacts gathered earlier.
    pub fn store_at(
        &self,
        request: StoreRequest,
        collected_at: DateTime<Utc>,
    ) -> VaultResult<Evidence> {
        if request.source.trim().is_empty() {
            return Err(VaultError::Validation("source must not be empty".to_string()));
        }
        let format = request.content.format();
        let bytes = request.content.encode()?;
        let digest = sha256_bytes(&bytes);
        let id = EvidenceId::new();
        let location = format!(
            "{}/{}/{id}.{}",
            collected_at.format("%Y/%m/%d"),
            request.evidence_type,
            format.extension()
        );
        let path = self.root.join(&location);

        let mut index = self.index.lock();
        let mut locked = index.acquire(LockMode::Exclusive)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
        }
        write_atomically(&path, &bytes)?;

        let evidence = Evidence {
            id,
            evidence_type: request.evidence_type,
            control_ids: request.control_ids,
            evaluation_id: request.evaluation_id,
            source: request.source,
            location,
            metadata: Value::Object(request.metadata),
            collected_at,
            digest,
            size: bytes.len() as u64,
            format,
        };

        if let Err(e) = locked.insert(evidence.clone()) {
            if let Err(cleanup) = fs::remove_file(&path) {
                tracing::warn!(
                    evidence_id = %id,
                    path = %path.display(),
                    error = %cleanup,
                    "could not remove content after failed index update"
                );
            }
            return Err(e);
        }
        drop(locked);
        drop(index);

        metrics::counter!("assure_evidence_stored_total", "type" => evidence.evidence_type.as_str())
            .increment(1);
        tracing::info!(
            evidence_id = %id,
            evidence_type = %evidence.evidence_type,
            source = %evidence.source,
            digest = %evidence.digest.to_hex(),
            "stored evidence"
        );
        Ok(evidence)
    }

    /// Fetch a record and its verified bytes.
    ///
    /// Returns `Ok(None)` when the id is unknown or its content file is
    /// gone.
    ///
    /// # Errors
    ///
    /// [`VaultError::Integrity`] when the bytes on disk do not hash to the
    /// recorded digest.
    pub fn retrieve(&self, id: &EvidenceId) -> VaultResult<Option<(Evidence, Vec<u8>)>> {
        let Some(evidence) = self.current().get(id).cloned() else {
            return Ok(None);
        };
        self.read_verified(evidence)
    }

    fn read_verified(&self, evidence: Evidence) -> VaultResult<Option<(Evidence, Vec<u8>)>> {
        let id = evidence.id;
        let path = self.root.join(&evidence.location);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(evidence_id = %id, path = %path.display(), "evidence content missing");
                return Ok(None);
            }
            Err(e) => return Err(VaultError::io(&path, e)),
        };
        let actual = sha256_bytes(&bytes);
        if !bool::from(actual.bytes[..].ct_eq(&evidence.digest.bytes[..])) {
            metrics::counter!("assure_integrity_failures_total").increment(1);
            tracing::error!(
                evidence_id = %id,
                location = %evidence.location,
                "evidence digest mismatch"
            );
            return Err(VaultError::Integrity {
                id,
                location: evidence.location,
                expected: evidence.digest.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(Some((evidence, bytes)))
    }

    /// [`retrieve`](Self::retrieve), decoded back into [`EvidenceContent`].
    pub fn retrieve_content(&self, id: &EvidenceId) -> VaultResult<Option<(Evidence, EvidenceContent)>> {
        match self.retrieve(id)? {
            Some((evidence, bytes)) => {
                let content = EvidenceContent::decode(evidence.format, bytes)?;
                Ok(Some((evidence, content)))
            }
            None => Ok(None),
        }
    }

    /// Records matching `filter`, newest first.
    pub fn list(&self, filter: &EvidenceFilter) -> Vec<Evidence> {
        let mut out: Vec<Evidence> = self
            .current()
            .records()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.collected_at
                .cmp(&a.collected_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        out
    }

    /// Store a configuration snapshot from `source`.
    pub fn collect_snapshot(
        &self,
        source: &str,
        data: Value,
        control_ids: Vec<ControlId>,
    ) -> VaultResult<Evidence> {
        self.store(
            StoreRequest::new(EvidenceType::Config, source, data)
                .controls(control_ids)
                .meta("snapshot_type", "configuration")
                .meta("source", source),
        )
    }

    /// Store an audit log extract from `source`.
    pub fn collect_log(
        &self,
        source: &str,
        log: impl Into<EvidenceContent>,
        control_ids: Vec<ControlId>,
    ) -> VaultResult<Evidence> {
        self.store(
            StoreRequest::new(EvidenceType::Log, source, log)
                .controls(control_ids)
                .meta("log_type", "audit")
                .meta("source", source),
        )
    }

    /// Record counts by type and source.
    pub fn summary(&self) -> EvidenceSummary {
        let index = self.current();
        let mut summary = EvidenceSummary::default();
        for e in index.records() {
            summary.total_evidence += 1;
            *summary.by_type.entry(e.evidence_type).or_default() += 1;
            *summary.by_source.entry(e.source.clone()).or_default() += 1;
        }
        summary
    }

    /// Re-verify every indexed record.
    pub fn verify_all(&self) -> IntegrityReport {
        let records: Vec<Evidence> = self.current().records().cloned().collect();
        let mut report = IntegrityReport::default();
        for evidence in records {
            let id = evidence.id;
            match self.read_verified(evidence) {
                Ok(Some(_)) => report.verified.push(id),
                Ok(None) => report.missing.push(id),
                Err(VaultError::Integrity { .. }) => report.corrupted.push(id),
                Err(e) => {
                    tracing::warn!(evidence_id = %id, error = %e, "could not verify evidence");
                    report.missing.push(id);
                }
            }
        }
        report
    }

    /// Files under the root that no index entry points at, including
    /// leftover temp files. Paths are relative and `/` separated.
    pub fn orphans(&self) -> VaultResult<Vec<String>> {
        let mut index = self.index.lock();
        let locked = index.acquire(LockMode::Shared)?;
        self.scan_orphans(&locked)
    }

    /// Delete every orphaned file. Returns what was removed.
    ///
    /// Holds the exclusive index lock for the whole sweep, so stores in
    /// this and other processes wait until it finishes.
    pub fn prune_orphans(&self) -> VaultResult<Vec<String>> {
        let mut index = self.index.lock();
        let locked = index.acquire(LockMode::Exclusive)?;
        let orphans = self.scan_orphans(&locked)?;
        for rel in &orphans {
            let path = self.root.join(rel);
            fs::remove_file(&path).map_err(|e| VaultError::io(&path, e))?;
            tracing::info!(path = %rel, "removed orphaned vault file");
        }
        Ok(orphans)
    }

    fn scan_orphans(&self, locked: &LockedIndex<'_>) -> VaultResult<Vec<String>> {
        let indexed: HashSet<&str> = locked.records().map(|e| e.location.as_str()).collect();
        let mut files = Vec::new();
        walk(&self.root, "", &mut files)?;
        let mut orphans: Vec<String> = files
            .into_iter()
            .filter(|rel| rel != INDEX_FILE && rel != LOCK_FILE && !indexed.contains(rel.as_str()))
            .collect();
        orphans.sort();
        Ok(orphans)
    }

    /// The index, reloaded when possible. A failed reload is logged and the
    /// cached copy is used.
    fn current(&self) -> MutexGuard<'_, MetadataIndex> {
        let mut index = self.index.lock();
        if let Err(e) = index.refresh() {
            tracing::warn!(root = %self.root.display(), error = %e, "could not reload evidence index");
        }
        index
    }
}

fn walk(dir: &Path, prefix: &str, out: &mut Vec<String>) -> VaultResult<()> {
    for entry in fs::read_dir(dir).map_err(|e| VaultError::io(dir, e))? {
        let entry = entry.map_err(|e| VaultError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        let file_type = entry.file_type().map_err(|e| VaultError::io(entry.path(), e))?;
        if file_type.is_dir() {
            walk(&entry.path(), &rel, out)?;
        } else {
            out.push(rel);
        }
    }
    Ok(())
}
