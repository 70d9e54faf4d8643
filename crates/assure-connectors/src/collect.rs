//! Gathering a [`DataContext`] from a set of connectors.

use assure_controls::DataContext;

use crate::config::ConnectorSettings;
use crate::connector::{Collections, Connector};
use crate::error::{ConnectorError, ConnectorResult};
use crate::file::FileConnector;
use crate::mock::{AwsConnector, OktaConnector};

/// Connector kinds understood by [`build_connector`].
pub const CONNECTOR_KINDS: &[&str] = &["aws", "okta", "file"];

/// Instantiate a connector by kind.
pub fn build_connector(kind: &str, settings: ConnectorSettings) -> ConnectorResult<Box<dyn Connector>> {
    match kind.to_ascii_lowercase().as_str() {
        "aws" => Ok(Box::new(AwsConnector::new(settings))),
        "okta" => Ok(Box::new(OktaConnector::new(settings))),
        "file" => Ok(Box::new(FileConnector::new(settings)?)),
        other => Err(ConnectorError::Config(format!(
            "unknown connector kind `{other}`, expected one of {}",
            CONNECTOR_KINDS.join(", ")
        ))),
    }
}

/// Result of one collection pass.
#[derive(Debug, Default)]
pub struct CollectionRun {
    /// Merged collections from every connector that succeeded.
    pub context: DataContext,
    /// Per-connector raw collections, in connector order.
    pub snapshots: Vec<(String, Collections)>,
    /// Connectors that failed, with the error message.
    pub failures: Vec<(String, String)>,
}

/// Connect to and collect from each connector in order.
///
/// Same-named list collections from different connectors are concatenated.
/// A failing connector is logged and skipped.
pub fn collect_context(connectors: &mut [Box<dyn Connector>]) -> CollectionRun {
    let mut run = CollectionRun::default();
    for connector in connectors.iter_mut() {
        let name = connector.name().to_string();
        let collected = connector.connect().and_then(|()| connector.collect_data());
        match collected {
            Ok(collections) => {
                tracing::info!(
                    connector = %name,
                    collections = collections.len(),
                    "collected connector data"
                );
                run.context.merge(collections.clone());
                run.snapshots.push((name, collections));
            }
            Err(e) => {
                tracing::warn!(connector = %name, error = %e, "connector failed; skipping");
                run.failures.push((name, e.to_string()));
            }
        }
    }
    run
}
