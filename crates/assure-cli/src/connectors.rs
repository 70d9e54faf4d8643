//! # Connectors Subcommand
//!
//! Show configured connectors with redacted settings, optionally probing
//! each one.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use assure_connectors::{ConnectionStatus, ConnectorStatus};

use crate::config::AssureConfig;
use crate::evaluate::configured_connectors;
use crate::print_json;

/// Arguments for `assure connectors`.
#[derive(Args, Debug, Default)]
pub struct ConnectorsArgs {
    /// Probe each connector's connectivity.
    #[arg(long)]
    pub test: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    #[serde(flatten)]
    status: ConnectorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    connection: Option<ConnectionStatus>,
}

/// Execute the connectors subcommand. Exits 1 when a probe fails.
pub fn run_connectors(args: &ConnectorsArgs, config: &AssureConfig) -> Result<u8> {
    let connectors = configured_connectors(config)?;
    let reports: Vec<Report> = connectors
        .iter()
        .map(|c| Report {
            status: c.status(),
            connection: args.test.then(|| c.test_connection()),
        })
        .collect();
    print_json(&reports)?;
    let all_ok = reports
        .iter()
        .all(|r| r.connection.as_ref().map_or(true, |s| s.ok));
    Ok(u8::from(!all_ok))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectorConfig;
    use crate::testing;
    use assure_connectors::ConnectorSettings;

    #[test]
    fn default_connectors_pass_probe() {
        let dir = tempfile::tempdir().unwrap();
        let args = ConnectorsArgs { test: true };
        assert_eq!(run_connectors(&args, &testing::config(dir.path())).unwrap(), 0);
    }

    #[test]
    fn missing_data_file_fails_probe() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = testing::config(dir.path());
        config.connectors.push(ConnectorConfig {
            kind: "file".into(),
            settings: ConnectorSettings::new().with("path", "/nonexistent/data.yaml"),
        });
        assert_eq!(run_connectors(&ConnectorsArgs { test: true }, &config).unwrap(), 1);
        assert_eq!(run_connectors(&ConnectorsArgs { test: false }, &config).unwrap(), 0);
    }

    #[test]
    fn unknown_kind_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = testing::config(dir.path());
        config.connectors = vec![ConnectorConfig {
            kind: "mainframe".into(),
            settings: ConnectorSettings::new(),
        }];
        assert!(run_connectors(&ConnectorsArgs::default(), &config).is_err());
    }
}
