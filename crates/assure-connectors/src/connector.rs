//! The connector contract.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::ConnectorSettings;
use crate::error::ConnectorResult;

/// Named collections returned by one connector, e.g. `users`.
pub type Collections = BTreeMap<String, Value>;

/// Outcome of a connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Whether the source answered.
    pub ok: bool,
    /// Human-readable detail.
    pub message: String,
}

/// Operator-facing view of a connector. Never contains secrets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorStatus {
    /// Connector name.
    pub name: String,
    /// Last successful collection.
    pub last_sync: Option<DateTime<Utc>>,
    /// Settings with secrets removed.
    pub config: BTreeMap<String, Value>,
}

/// A data source that produces collections for evaluation.
pub trait Connector: Send + fmt::Debug {
    /// Stable name, also used as the evidence source.
    fn name(&self) -> &str;

    /// Settings the connector was built with.
    fn settings(&self) -> &ConnectorSettings;

    /// Establish a session with the source.
    fn connect(&mut self) -> ConnectorResult<()>;

    /// Probe connectivity without collecting.
    fn test_connection(&self) -> ConnectionStatus;

    /// Collect all collections. Updates [`last_sync`](Self::last_sync) on
    /// success.
    fn collect_data(&mut self) -> ConnectorResult<Collections>;

    /// When data was last collected.
    fn last_sync(&self) -> Option<DateTime<Utc>>;

    /// Name, last sync and redacted settings.
    fn status(&self) -> ConnectorStatus {
        ConnectorStatus {
            name: self.name().to_string(),
            last_sync: self.last_sync(),
            config: self.settings().redacted(),
        }
    }
}
