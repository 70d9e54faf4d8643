//! Connector error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by connectors.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The remote system could not be reached or refused the credentials.
    #[error("{connector}: connection failed: {detail}")]
    Connection {
        /// Connector name.
        connector: String,
        /// What went wrong.
        detail: String,
    },

    /// Data collection failed after connecting.
    #[error("{connector}: collection failed: {detail}")]
    Collection {
        /// Connector name.
        connector: String,
        /// What went wrong.
        detail: String,
    },

    /// A connector definition is invalid.
    #[error("invalid connector configuration: {0}")]
    Config(String),

    /// A file-backed source could not be read.
    #[error("failed to read data file {path}: {detail}")]
    File {
        /// The data file.
        path: PathBuf,
        /// What went wrong.
        detail: String,
    },
}

/// Result alias for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
