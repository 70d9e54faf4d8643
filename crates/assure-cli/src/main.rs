//! # assure CLI entry point
//!
//! Parses command-line arguments, resolves configuration and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use assure_cli::config::AssureConfig;
use assure_cli::connectors::{run_connectors, ConnectorsArgs};
use assure_cli::controls::{run_controls, ControlsArgs};
use assure_cli::evaluate::{run_evaluate, EvaluateArgs};
use assure_cli::evaluations::{run_evaluations, EvaluationsArgs};
use assure_cli::evidence::{run_evidence, EvidenceArgs};
use assure_cli::findings::{run_findings, FindingsArgs};

/// Continuous compliance assurance.
///
/// Evaluates SOC 2 controls against data collected from connected systems,
/// keeps tamper-evident evidence, and tracks findings to resolution.
#[derive(Parser, Debug)]
#[command(name = "assure", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Control catalog file or directory.
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,

    /// Evidence vault root.
    #[arg(long, global = true)]
    vault_dir: Option<PathBuf>,

    /// Evaluation store directory.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List and inspect catalog controls.
    Controls(ControlsArgs),

    /// Collect data, store snapshots, evaluate controls and record results.
    Evaluate(EvaluateArgs),

    /// Evidence vault operations (store, get, list, summary, verify, prune).
    Evidence(EvidenceArgs),

    /// List findings and update their status.
    Findings(FindingsArgs),

    /// Browse recorded evaluations.
    Evaluations(EvaluationsArgs),

    /// Show configured connectors and probe connectivity.
    Connectors(ConnectorsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "assure CLI starting");

    let mut config = match AssureConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(2);
        }
    };
    if let Some(dir) = cli.catalog_dir {
        config.catalog_dir = dir;
    }
    if let Some(dir) = cli.vault_dir {
        config.vault_dir = dir;
    }
    if let Some(dir) = cli.store_dir {
        config.store_dir = dir;
    }
    tracing::debug!(?config, "resolved configuration");

    let result = match cli.command {
        Commands::Controls(args) => run_controls(&args, &config),
        Commands::Evaluate(args) => run_evaluate(&args, &config),
        Commands::Evidence(args) => run_evidence(&args, &config),
        Commands::Findings(args) => run_findings(&args, &config),
        Commands::Evaluations(args) => run_evaluations(&args, &config),
        Commands::Connectors(args) => run_connectors(&args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
