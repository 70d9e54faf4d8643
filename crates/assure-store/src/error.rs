//! Store error types.

use std::path::PathBuf;

use assure_core::FindingStatus;
use thiserror::Error;

/// Errors raised by evaluation and finding stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// `evaluation` or `finding`.
        kind: &'static str,
        /// The requested id.
        id: String,
    },

    /// A record with this id already exists; records are immutable.
    #[error("{kind} already exists: {id}")]
    Duplicate {
        /// `evaluation` or `finding`.
        kind: &'static str,
        /// The conflicting id.
        id: String,
    },

    /// The requested status change is not allowed.
    #[error("invalid finding transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: FindingStatus,
        /// Requested status.
        to: FindingStatus,
    },

    /// Journal file failure.
    #[error("journal I/O error at {path}: {source}")]
    Io {
        /// Journal path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A journal line could not be decoded.
    #[error("corrupt journal {path} at line {line}: {detail}")]
    Journal {
        /// Journal path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Decoder message.
        detail: String,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
