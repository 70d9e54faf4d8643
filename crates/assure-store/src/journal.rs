//! # Journal Store
//!
//! Durable store backed by an append-only JSON-lines journal
//! (`journal.jsonl`). Each line is one [`JournalEntry`]; the in-memory state
//! is rebuilt by replaying the journal on open.
//!
//! Every mutation is validated against memory, appended and synced, and only
//! then applied in memory, all under one mutex. A crash mid-append can leave
//! a torn final line; replay skips it with a warning. A bad line anywhere
//! else is reported as corruption.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use assure_controls::{ControlEvaluation, Finding};
use assure_core::{EvaluationId, FindingId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::query::{EvaluationQuery, FindingQuery, FindingUpdate};
use crate::EvaluationStore;

/// Journal file name inside the store directory.
pub const JOURNAL_FILE: &str = "journal.jsonl";

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    /// A new evaluation.
    EvaluationCreated {
        /// The stored record.
        evaluation: ControlEvaluation,
    },
    /// A new finding.
    FindingCreated {
        /// The stored record.
        finding: Finding,
    },
    /// A finding after a status change.
    FindingUpdated {
        /// The record as updated.
        finding: Finding,
    },
}

/// Journal-backed [`EvaluationStore`].
#[derive(Debug)]
pub struct LogStore {
    path: PathBuf,
    memory: MemoryStore,
    journal: Mutex<File>,
}

impl LogStore {
    /// Open the journal in `dir`, creating it if needed, and replay it.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir).map_err(|e| io(dir, e))?;
        let path = dir.join(JOURNAL_FILE);
        let memory = MemoryStore::new();
        let (replayed, tail) = match fs::read_to_string(&path) {
            Ok(text) => replay(&path, &text, &memory)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (0, Tail::Clean),
            Err(e) => return Err(io(&path, e)),
        };
        repair_tail(&path, tail)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io(&path, e))?;
        tracing::debug!(
            path = %path.display(),
            entries = replayed,
            evaluations = memory.evaluation_count(),
            findings = memory.finding_count(),
            "opened evaluation journal"
        );
        Ok(Self {
            path,
            memory,
            journal: Mutex::new(file),
        })
    }

    /// Journal file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, file: &mut File, entry: &JournalEntry) -> StoreResult<()> {
        let mut line = serde_json::to_vec(entry).map_err(|e| StoreError::Journal {
            path: self.path.clone(),
            line: 0,
            detail: format!("serialization failed: {e}"),
        })?;
        line.push(b'\n');
        file.write_all(&line).map_err(|e| io(&self.path, e))?;
        file.sync_data().map_err(|e| io(&self.path, e))
    }
}

fn io(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// State of the journal's final line after replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Clean,
    /// Last entry is complete but lacks its newline.
    MissingNewline,
    /// Last line is partial; keep only the first `usize` bytes.
    Torn(usize),
}

fn replay(path: &Path, text: &str, memory: &MemoryStore) -> StoreResult<(usize, Tail)> {
    let lines: Vec<&str> = text.lines().collect();
    let complete = text.is_empty() || text.ends_with('\n');
    let mut tail = if complete { Tail::Clean } else { Tail::MissingNewline };
    let mut applied = 0;
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: JournalEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(e) if i + 1 == lines.len() && !complete => {
                tracing::warn!(path = %path.display(), line = i + 1, error = %e, "ignoring torn journal tail");
                tail = Tail::Torn(text.rfind('\n').map_or(0, |pos| pos + 1));
                break;
            }
            Err(e) => {
                return Err(StoreError::Journal {
                    path: path.to_path_buf(),
                    line: i + 1,
                    detail: e.to_string(),
                })
            }
        };
        match entry {
            JournalEntry::EvaluationCreated { evaluation } => {
                memory.evaluations.put(evaluation.id, evaluation)
            }
            JournalEntry::FindingCreated { finding } | JournalEntry::FindingUpdated { finding } => {
                memory.findings.put(finding.id, finding)
            }
        }
        applied += 1;
    }
    Ok((applied, tail))
}

/// Make the journal end on a line boundary before appending to it.
fn repair_tail(path: &Path, tail: Tail) -> StoreResult<()> {
    match tail {
        Tail::Clean => Ok(()),
        Tail::MissingNewline => {
            let mut file = OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|e| io(path, e))?;
            file.write_all(b"\n").map_err(|e| io(path, e))
        }
        Tail::Torn(keep) => {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| io(path, e))?;
            file.set_len(keep as u64).map_err(|e| io(path, e))
        }
    }
}

impl EvaluationStore for LogStore {
    fn create_evaluation(&self, evaluation: &ControlEvaluation) -> StoreResult<()> {
        let mut file = self.journal.lock();
        if self.memory.evaluations.contains(&evaluation.id) {
            return Err(StoreError::Duplicate {
                kind: "evaluation",
                id: evaluation.id.to_string(),
            });
        }
        self.append(
            &mut file,
            &JournalEntry::EvaluationCreated {
                evaluation: evaluation.clone(),
            },
        )?;
        self.memory.evaluations.put(evaluation.id, evaluation.clone());
        Ok(())
    }

    fn get_evaluation(&self, id: &EvaluationId) -> StoreResult<ControlEvaluation> {
        self.memory.get_evaluation(id)
    }

    fn list_evaluations(&self, query: &EvaluationQuery) -> StoreResult<Vec<ControlEvaluation>> {
        self.memory.list_evaluations(query)
    }

    fn create_finding(&self, finding: &Finding) -> StoreResult<()> {
        let mut file = self.journal.lock();
        if self.memory.findings.contains(&finding.id) {
            return Err(StoreError::Duplicate {
                kind: "finding",
                id: finding.id.to_string(),
            });
        }
        self.append(
            &mut file,
            &JournalEntry::FindingCreated {
                finding: finding.clone(),
            },
        )?;
        self.memory.findings.put(finding.id, finding.clone());
        Ok(())
    }

    fn get_finding(&self, id: &FindingId) -> StoreResult<Finding> {
        self.memory.get_finding(id)
    }

    fn list_findings(&self, query: &FindingQuery) -> StoreResult<Vec<Finding>> {
        self.memory.list_findings(query)
    }

    fn update_finding_status(&self, id: &FindingId, update: &FindingUpdate) -> StoreResult<Finding> {
        let mut file = self.journal.lock();
        let updated = self.memory.preview_update(id, update)?;
        self.append(
            &mut file,
            &JournalEntry::FindingUpdated {
                finding: updated.clone(),
            },
        )?;
        self.memory.findings.put(updated.id, updated.clone());
        tracing::info!(finding_id = %id, status = %updated.status, "finding status updated");
        Ok(updated)
    }
}
