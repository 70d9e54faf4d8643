//! Control catalog and evaluation error types.
//!
//! Catalog errors carry the source, entry and field that failed so a catalog
//! author can fix the file without re-running under a debugger. Evaluation
//! errors are per control: `evaluate_all` records them and moves on.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a control catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A catalog entry is missing a field or has an invalid value.
    #[error("invalid control catalog {source_name}, entry {entry}, field `{field}`: {detail}")]
    Parse {
        /// File path or `<inline>` for string sources.
        source_name: String,
        /// Entry position (0-based) and id when known, e.g. `#2 (CC6.1-MFA)`.
        entry: String,
        /// The offending field.
        field: String,
        /// What was wrong.
        detail: String,
    },

    /// The document is not valid YAML or has the wrong top-level shape.
    #[error("failed to parse control catalog {source_name}: {detail}")]
    Document {
        /// File path or `<inline>`.
        source_name: String,
        /// Parser message.
        detail: String,
    },

    /// Two entries share one control id.
    #[error("duplicate control id {id} in {source_name}")]
    DuplicateId {
        /// The repeated id.
        id: String,
        /// Where the second occurrence was found.
        source_name: String,
    },

    /// The catalog path does not exist.
    #[error("control catalog not found: {path}")]
    NotFound {
        /// The requested path.
        path: PathBuf,
    },

    /// I/O error while reading catalog files.
    #[error("I/O error reading control catalog {path}: {source}")]
    Io {
        /// The file or directory being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Errors raised by a violation rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// A collection exists but is not a list of records.
    #[error("collection `{collection}` is malformed: {detail}")]
    MalformedCollection {
        /// Collection name, e.g. `users`.
        collection: String,
        /// What was wrong.
        detail: String,
    },

    /// A rule-specific failure.
    #[error("rule {rule} failed: {detail}")]
    Failed {
        /// Rule name.
        rule: String,
        /// What was wrong.
        detail: String,
    },
}

/// Errors raised while evaluating a single control.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No control with this id is loaded.
    #[error("unknown control: {0}")]
    UnknownControl(String),

    /// The control's logic block cannot be executed as written.
    #[error("malformed logic in control {control_id}: {detail}")]
    MalformedLogic {
        /// The control being evaluated.
        control_id: String,
        /// What was wrong.
        detail: String,
    },

    /// The declared rule failed against the data context.
    #[error("rule {rule} failed for control {control_id}: {source}")]
    Rule {
        /// The control being evaluated.
        control_id: String,
        /// The declared rule name.
        rule: String,
        /// Underlying rule error.
        source: RuleError,
    },

    /// The worker pool for parallel evaluation could not be built.
    #[error("failed to start evaluation workers: {0}")]
    WorkerPool(String),
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
