//! # Metadata Index
//!
//! `metadata.json` at the vault root maps evidence id to [`Evidence`]. It is
//! the single source of truth: a content file without an index entry is an
//! orphan and is never returned by queries.
//!
//! The file is only ever replaced whole. A new version is written to a
//! sibling temp file, synced, and renamed over the old one, so a crash
//! leaves either the previous or the next index, never a torn one.
//!
//! ## Locking
//!
//! Several processes may open the same vault. Every access goes through
//! [`MetadataIndex::acquire`], which takes an advisory lock on
//! `.metadata.lock` and reloads the index from disk while holding it.
//! Writers hold the lock exclusively from reload to rewrite, so an insert
//! always lands on top of every record committed before it.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use assure_core::EvidenceId;
use fs2::FileExt;

use crate::error::{VaultError, VaultResult};
use crate::record::Evidence;

/// Index file name at the vault root.
pub const INDEX_FILE: &str = "metadata.json";

/// Lock file guarding [`INDEX_FILE`].
pub const LOCK_FILE: &str = ".metadata.lock";

/// How [`MetadataIndex::acquire`] locks the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockMode {
    /// Readers; any number may hold it at once.
    Shared,
    /// A single writer.
    Exclusive,
}

/// Cached copy of the index plus its backing files.
#[derive(Debug)]
pub(crate) struct MetadataIndex {
    path: PathBuf,
    lock_path: PathBuf,
    lock: File,
    records: BTreeMap<EvidenceId, Evidence>,
    #[cfg(test)]
    pub(crate) fail_persist: bool,
}

impl MetadataIndex {
    /// Open the index under `root`, starting empty if none exists.
    pub(crate) fn open(root: &Path) -> VaultResult<Self> {
        let lock_path = root.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| VaultError::io(&lock_path, e))?;
        let mut index = Self {
            path: root.join(INDEX_FILE),
            lock_path,
            lock,
            records: BTreeMap::new(),
            #[cfg(test)]
            fail_persist: false,
        };
        index.refresh()?;
        Ok(index)
    }

    /// Lock the index file and reload it. The lock is released when the
    /// returned guard drops.
    pub(crate) fn acquire(&mut self, mode: LockMode) -> VaultResult<LockedIndex<'_>> {
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&self.lock),
            LockMode::Exclusive => FileExt::lock_exclusive(&self.lock),
        };
        locked.map_err(|e| VaultError::io(&self.lock_path, e))?;
        let mut guard = LockedIndex { index: self, mode };
        guard.index.records = read_records(&guard.index.path)?;
        Ok(guard)
    }

    /// Pick up records committed by other vault instances.
    pub(crate) fn refresh(&mut self) -> VaultResult<()> {
        self.acquire(LockMode::Shared).map(drop)
    }

    pub(crate) fn get(&self, id: &EvidenceId) -> Option<&Evidence> {
        self.records.get(id)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &Evidence> {
        self.records.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    fn persist(&self) -> VaultResult<()> {
        #[cfg(test)]
        if self.fail_persist {
            return Err(VaultError::Index {
                path: self.path.clone(),
                detail: "persist disabled".to_string(),
            });
        }
        let bytes = serde_json::to_vec_pretty(&self.records).map_err(|e| VaultError::Index {
            path: self.path.clone(),
            detail: format!("serialization failed: {e}"),
        })?;
        write_atomically(&self.path, &bytes)
    }
}

/// The index while its file lock is held.
#[derive(Debug)]
pub(crate) struct LockedIndex<'a> {
    index: &'a mut MetadataIndex,
    mode: LockMode,
}

impl LockedIndex<'_> {
    pub(crate) fn records(&self) -> impl Iterator<Item = &Evidence> {
        self.index.records()
    }

    /// Add a record and persist. Requires [`LockMode::Exclusive`]. On
    /// failure the cached index is left exactly as it was.
    pub(crate) fn insert(&mut self, evidence: Evidence) -> VaultResult<()> {
        let id = evidence.id;
        if self.mode != LockMode::Exclusive {
            return Err(VaultError::Validation(format!(
                "evidence {id} cannot be indexed under a shared lock"
            )));
        }
        if self.index.records.contains_key(&id) {
            return Err(VaultError::Validation(format!("evidence {id} already indexed")));
        }
        self.index.records.insert(id, evidence);
        if let Err(e) = self.index.persist() {
            self.index.records.remove(&id);
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for LockedIndex<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.index.lock) {
            tracing::warn!(path = %self.index.lock_path.display(), error = %e, "could not release index lock");
        }
    }
}

fn read_records(path: &Path) -> VaultResult<BTreeMap<EvidenceId, Evidence>> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| VaultError::Index {
            path: path.to_path_buf(),
            detail: format!("unreadable: {e}"),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(VaultError::io(path, e)),
    }
}

/// Write `bytes` to `path` through a synced temp file and a rename.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> VaultResult<()> {
    let tmp = temp_path(path);
    let result = (|| {
        let mut file: File = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .map_err(|e| VaultError::io(&tmp, e))?;
        file.write_all(bytes).map_err(|e| VaultError::io(&tmp, e))?;
        file.sync_all().map_err(|e| VaultError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| VaultError::io(path, e))
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Temp files start with `.` and end with `.tmp` so orphan sweeps can
/// recognize them.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentFormat;
    use assure_core::{sha256_bytes, EvidenceType};
    use chrono::Utc;

    fn record() -> Evidence {
        let id = EvidenceId::new();
        Evidence {
            id,
            evidence_type: EvidenceType::Log,
            control_ids: Vec::new(),
            evaluation_id: None,
            source: "test".to_string(),
            location: format!("x/{id}.txt"),
            metadata: serde_json::json!({}),
            collected_at: Utc::now(),
            digest: sha256_bytes(b"x"),
            size: 1,
            format: ContentFormat::Text,
        }
    }

    #[test]
    fn open_missing_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = MetadataIndex::open(dir.path()).unwrap();
        assert_eq!(index.len(), 0);
        assert!(dir.path().join(LOCK_FILE).is_file());
    }

    #[test]
    fn corrupt_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), "{not json").unwrap();
        let err = MetadataIndex::open(dir.path()).unwrap_err();
        assert!(matches!(err, VaultError::Index { .. }));
    }

    #[test]
    fn acquire_sees_other_instances_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = MetadataIndex::open(dir.path()).unwrap();
        let mut b = MetadataIndex::open(dir.path()).unwrap();
        a.acquire(LockMode::Exclusive).unwrap().insert(record()).unwrap();
        b.acquire(LockMode::Exclusive).unwrap().insert(record()).unwrap();
        a.refresh().unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(MetadataIndex::open(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn shared_lock_refuses_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = MetadataIndex::open(dir.path()).unwrap();
        let err = index.acquire(LockMode::Shared).unwrap().insert(record()).unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn failed_persist_leaves_cache_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = MetadataIndex::open(dir.path()).unwrap();
        index.acquire(LockMode::Exclusive).unwrap().insert(record()).unwrap();
        index.fail_persist = true;
        assert!(index.acquire(LockMode::Exclusive).unwrap().insert(record()).is_err());
        assert_eq!(index.len(), 1);
        index.fail_persist = false;
        index.refresh().unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.json");
        write_atomically(&target, b"one").unwrap();
        write_atomically(&target, b"two").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"two");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}