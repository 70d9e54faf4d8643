//! # assure-connectors
//!
//! Sources of evaluation data. Each [`Connector`] yields named collections;
//! [`collect_context`] merges them into the
//! [`DataContext`](assure_controls::DataContext) the engine evaluates.
//!
//! The bundled cloud and identity connectors return fixed sample data.
//! [`FileConnector`] reads real exports from disk.

pub mod collect;
pub mod config;
pub mod connector;
pub mod error;
pub mod file;
pub mod mock;

pub use collect::{build_connector, collect_context, CollectionRun, CONNECTOR_KINDS};
pub use config::{ConnectorSettings, SECRET_KEYS};
pub use connector::{Collections, ConnectionStatus, Connector, ConnectorStatus};
pub use error::{ConnectorError, ConnectorResult};
pub use file::FileConnector;
pub use mock::{AwsConnector, OktaConnector};
