//! # assure-cli: Compliance Assurance Command-Line Interface
//!
//! Thin handlers over the domain crates. Each subcommand module exposes an
//! `XArgs` type parsed by clap and a `run_x(&args, &config) -> Result<u8>`
//! handler whose return value is the process exit code.
//!
//! ## Subcommands
//!
//! - `controls`: List and inspect catalog controls
//! - `evaluate`: Collect data, store snapshots, evaluate, record results
//! - `evidence`: Vault store, get, list, summary, verify, prune
//! - `findings`: List findings and move them through their lifecycle
//! - `evaluations`: Browse recorded evaluations
//! - `connectors`: Show configured connectors and probe them
//!
//! ```bash
//! assure controls list --category security
//! assure evaluate -v
//! assure findings update <ID> --status resolved
//! assure evidence verify
//! ```

pub mod config;
pub mod connectors;
pub mod controls;
pub mod evaluate;
pub mod evaluations;
pub mod evidence;
pub mod findings;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use assure_controls::{CatalogHandle, ControlCatalog, EvaluationEngine, RuleRegistry};
use assure_store::LogStore;
use assure_vault::EvidenceVault;

use crate::config::AssureConfig;

/// Load the catalog with the built-in rules and build an engine.
pub fn open_engine(config: &AssureConfig) -> Result<EvaluationEngine> {
    let rules = Arc::new(RuleRegistry::with_builtin_rules());
    let catalog = ControlCatalog::load(&config.catalog_dir, &rules)
        .with_context(|| format!("failed to load control catalog from {}", config.catalog_dir.display()))?;
    tracing::debug!(controls = catalog.len(), "control catalog loaded");
    Ok(EvaluationEngine::new(CatalogHandle::new(catalog), rules).with_evaluator(config.evaluator.clone()))
}

/// Open (creating if needed) the evidence vault.
pub fn open_vault(config: &AssureConfig) -> Result<EvidenceVault> {
    EvidenceVault::open(&config.vault_dir)
        .with_context(|| format!("failed to open evidence vault at {}", config.vault_dir.display()))
}

/// Open (creating if needed) the evaluation store.
pub fn open_store(config: &AssureConfig) -> Result<LogStore> {
    LogStore::open(&config.store_dir)
        .with_context(|| format!("failed to open evaluation store at {}", config.store_dir.display()))
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
