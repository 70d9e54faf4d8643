//! # Error Hierarchy
//!
//! Errors shared by every crate in the workspace. Subsystem crates define
//! their own enums and wrap these with `#[from]`.

use thiserror::Error;

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for identifiers, enumerations and digests.
///
/// Each variant carries the rejected input so that catalog authors and
/// operators can see exactly what was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Control identifier is empty, too long, or has disallowed characters.
    #[error("invalid control id: \"{0}\" (expected 1-64 characters from [A-Za-z0-9._-])")]
    InvalidControlId(String),

    /// A value is not a member of the named enumeration.
    #[error("unknown {kind} \"{value}\" (expected one of: {expected})")]
    UnknownVariant {
        /// The enumeration being parsed, e.g. `severity`.
        kind: &'static str,
        /// The rejected input.
        value: String,
        /// Comma separated list of accepted spellings.
        expected: String,
    },

    /// Hex digest has the wrong length or non-hex characters.
    #[error("invalid sha256 hex digest: \"{0}\" (expected 64 lowercase hex characters)")]
    InvalidDigest(String),

    /// A UUID identifier failed to parse.
    #[error("invalid {kind} id: \"{value}\"")]
    InvalidUuid {
        /// The identifier kind, e.g. `evidence`.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}
