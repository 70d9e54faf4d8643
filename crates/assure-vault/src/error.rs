//! Vault error types.

use std::path::PathBuf;

use assure_core::{CanonicalizationError, EvidenceId};
use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Stored bytes no longer match the recorded digest.
    #[error("integrity violation: evidence {id} at {location} has digest {actual} but index records {expected}")]
    Integrity {
        /// The corrupted record.
        id: EvidenceId,
        /// Relative content path.
        location: String,
        /// Digest recorded at store time.
        expected: String,
        /// Digest of the bytes now on disk.
        actual: String,
    },

    /// Filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The metadata index could not be read or written.
    #[error("metadata index {path}: {detail}")]
    Index {
        /// Index file path.
        path: PathBuf,
        /// What went wrong.
        detail: String,
    },

    /// Structured content could not be serialized.
    #[error("evidence serialization failed: {0}")]
    Serialization(#[from] CanonicalizationError),

    /// A store request was rejected before anything was written.
    #[error("invalid evidence: {0}")]
    Validation(String),
}

impl VaultError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
