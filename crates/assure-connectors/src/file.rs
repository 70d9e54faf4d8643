//! Connector backed by a JSON or YAML file of collections.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::ConnectorSettings;
use crate::connector::{Collections, ConnectionStatus, Connector};
use crate::error::{ConnectorError, ConnectorResult};

/// Reads collections from a file whose top level maps collection names to
/// lists of records. YAML is accepted, and JSON is read as YAML.
///
/// Settings: `path` (required) and `name` (default `file`).
#[derive(Debug, Clone)]
pub struct FileConnector {
    settings: ConnectorSettings,
    name: String,
    path: PathBuf,
    last_sync: Option<DateTime<Utc>>,
}

impl FileConnector {
    /// Build from settings. Fails when `path` is absent.
    pub fn new(settings: ConnectorSettings) -> ConnectorResult<Self> {
        let path = settings
            .get_str("path")
            .map(PathBuf::from)
            .ok_or_else(|| ConnectorError::Config("file connector requires `path`".into()))?;
        Ok(Self {
            name: settings.str_or("name", "file").to_string(),
            path,
            settings,
            last_sync: None,
        })
    }

    fn read(&self) -> ConnectorResult<Collections> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| ConnectorError::File {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        let value: Value = serde_yaml::from_str(&text).map_err(|e| ConnectorError::File {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        match value {
            Value::Null => Ok(Collections::new()),
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(ConnectorError::Collection {
                connector: self.name.clone(),
                detail: format!("top level must be a mapping of collections, found {other}"),
            }),
        }
    }
}

impl Connector for FileConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    fn connect(&mut self) -> ConnectorResult<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(ConnectorError::Connection {
                connector: self.name.clone(),
                detail: format!("{} is not a readable file", self.path.display()),
            })
        }
    }

    fn test_connection(&self) -> ConnectionStatus {
        if self.path.is_file() {
            ConnectionStatus {
                ok: true,
                message: format!("Reading {}", self.path.display()),
            }
        } else {
            ConnectionStatus {
                ok: false,
                message: format!("{} not found", self.path.display()),
            }
        }
    }

    fn collect_data(&mut self) -> ConnectorResult<Collections> {
        let data = self.read()?;
        self.last_sync = Some(Utc::now());
        Ok(data)
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }
}
