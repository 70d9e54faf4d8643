//! Application configuration.
//!
//! Resolution order, lowest to highest precedence: built-in defaults, the
//! YAML file given with `--config`, `ASSURE_*` environment variables, then
//! command-line flags (applied by the binary).

use std::path::{Path, PathBuf};

use assure_connectors::ConnectorSettings;
use assure_controls::DEFAULT_EVALUATOR;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`AssureConfig::catalog_dir`].
pub const ENV_CATALOG_DIR: &str = "ASSURE_CATALOG_DIR";
/// Environment variable overriding [`AssureConfig::vault_dir`].
pub const ENV_VAULT_DIR: &str = "ASSURE_VAULT_DIR";
/// Environment variable overriding [`AssureConfig::store_dir`].
pub const ENV_STORE_DIR: &str = "ASSURE_STORE_DIR";
/// Environment variable overriding [`AssureConfig::evaluator`].
pub const ENV_EVALUATOR: &str = "ASSURE_EVALUATOR";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssureConfig {
    /// Control catalog file or directory.
    pub catalog_dir: PathBuf,
    /// Evidence vault root.
    pub vault_dir: PathBuf,
    /// Evaluation store directory (holds the journal).
    pub store_dir: PathBuf,
    /// Name recorded as the evaluator of each run.
    pub evaluator: String,
    /// Evaluation threads. `1` evaluates on the calling thread.
    pub workers: usize,
    /// Data sources polled by `assure evaluate`.
    pub connectors: Vec<ConnectorConfig>,
}

/// One configured connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector kind: `aws`, `okta` or `file`.
    pub kind: String,
    /// Kind-specific settings. Secret values are redacted in `Debug`.
    #[serde(default)]
    pub settings: ConnectorSettings,
}

impl ConnectorConfig {
    fn kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            settings: ConnectorSettings::new(),
        }
    }
}

impl Default for AssureConfig {
    fn default() -> Self {
        Self {
            catalog_dir: PathBuf::from("control_catalog"),
            vault_dir: PathBuf::from("evidence_vault"),
            store_dir: PathBuf::from("evaluation_store"),
            evaluator: DEFAULT_EVALUATOR.to_string(),
            workers: 1,
            connectors: vec![ConnectorConfig::kind("aws"), ConnectorConfig::kind("okta")],
        }
    }
}

impl AssureConfig {
    /// Load from an optional YAML file, then apply process environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a YAML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|detail| ConfigError::Parse {
            path: path.to_path_buf(),
            detail,
        })
    }

    fn from_yaml_str(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    /// Apply overrides from an environment lookup. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = get(ENV_CATALOG_DIR) {
            self.catalog_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_VAULT_DIR) {
            self.vault_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_STORE_DIR) {
            self.store_dir = PathBuf::from(dir);
        }
        if let Some(name) = get(ENV_EVALUATOR) {
            self.evaluator = name;
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
}
