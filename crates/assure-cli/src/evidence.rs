//! # Evidence Subcommand
//!
//! Evidence vault operations. Every read goes through digest verification;
//! a tampered file is reported as an error, never printed.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use assure_core::{ControlId, EvaluationId, EvidenceId, EvidenceType};
use assure_vault::{EvidenceContent, EvidenceFilter, EvidenceVault, StoreRequest};

use crate::config::AssureConfig;
use crate::{open_vault, print_json};

/// Arguments for `assure evidence`.
#[derive(Args, Debug)]
pub struct EvidenceArgs {
    #[command(subcommand)]
    pub command: EvidenceCommand,
}

/// Evidence subcommands.
#[derive(Subcommand, Debug)]
pub enum EvidenceCommand {
    /// Store a file as evidence. `.json` files are stored as structured
    /// content, valid UTF-8 as text, anything else as binary.
    Store {
        /// Evidence type: log, config, policy, ticket, screenshot, report.
        #[arg(long = "type", value_name = "TYPE")]
        evidence_type: EvidenceType,
        /// Originating system.
        #[arg(long)]
        source: String,
        /// Control this evidence supports. Repeatable.
        #[arg(long = "control", value_name = "ID")]
        controls: Vec<ControlId>,
        /// Evaluation this evidence belongs to.
        #[arg(long)]
        evaluation: Option<EvaluationId>,
        /// File to store.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Retrieve evidence after verifying its digest.
    Get {
        /// Evidence id.
        id: EvidenceId,
        /// Write the content here instead of printing it.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List evidence, newest first.
    List {
        #[arg(long)]
        control: Option<ControlId>,
        #[arg(long)]
        evaluation: Option<EvaluationId>,
        #[arg(long = "type", value_name = "TYPE")]
        evidence_type: Option<EvidenceType>,
        #[arg(long)]
        source: Option<String>,
        /// RFC 3339 lower bound on collection time (inclusive).
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// RFC 3339 upper bound on collection time (inclusive).
        #[arg(long)]
        until: Option<DateTime<Utc>>,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Record counts by type and source.
    Summary,

    /// Re-verify every record against its digest.
    Verify,

    /// Remove vault files that no index entry refers to.
    Prune {
        /// Only report what would be removed.
        #[arg(long)]
        dry_run: bool,
    },
}

/// Execute the evidence subcommand.
pub fn run_evidence(args: &EvidenceArgs, config: &AssureConfig) -> Result<u8> {
    let vault = open_vault(config)?;

    match &args.command {
        EvidenceCommand::Store {
            evidence_type,
            source,
            controls,
            evaluation,
            file,
        } => cmd_store(&vault, *evidence_type, source, controls, *evaluation, file),

        EvidenceCommand::Get { id, output } => cmd_get(&vault, id, output.as_deref()),

        EvidenceCommand::List {
            control,
            evaluation,
            evidence_type,
            source,
            since,
            until,
            json,
        } => {
            let filter = EvidenceFilter {
                control_id: control.clone(),
                evaluation_id: *evaluation,
                evidence_type: *evidence_type,
                source: source.clone(),
                since: *since,
                until: *until,
            };
            let records = vault.list(&filter);
            if *json {
                print_json(&records)?;
            } else {
                for e in &records {
                    println!(
                        "{}  {}  {:<10} {:<10} {}",
                        e.id,
                        e.collected_at.to_rfc3339(),
                        e.evidence_type,
                        e.source,
                        e.location
                    );
                }
                println!("{} record(s)", records.len());
            }
            Ok(0)
        }

        EvidenceCommand::Summary => {
            print_json(&vault.summary())?;
            Ok(0)
        }

        EvidenceCommand::Verify => {
            let report = vault.verify_all();
            for id in &report.missing {
                println!("MISSING: {id}");
            }
            for id in &report.corrupted {
                println!("CORRUPTED: {id}");
            }
            println!(
                "{} verified, {} missing, {} corrupted",
                report.verified.len(),
                report.missing.len(),
                report.corrupted.len()
            );
            Ok(if report.is_clean() { 0 } else { 1 })
        }

        EvidenceCommand::Prune { dry_run } => {
            let removed = if *dry_run {
                vault.orphans()?
            } else {
                vault.prune_orphans()?
            };
            let verb = if *dry_run { "would remove" } else { "removed" };
            for path in &removed {
                println!("{verb}: {path}");
            }
            println!("{} orphaned file(s) {verb}", removed.len());
            Ok(0)
        }
    }
}

fn cmd_store(
    vault: &EvidenceVault,
    evidence_type: EvidenceType,
    source: &str,
    controls: &[ControlId],
    evaluation: Option<EvaluationId>,
    file: &Path,
) -> Result<u8> {
    if !file.is_file() {
        bail!("file not found: {}", file.display());
    }
    let content = read_content(file)?;
    let mut request = StoreRequest::new(evidence_type, source, content)
        .controls(controls.iter().cloned())
        .meta("original_filename", file_name(file));
    if let Some(id) = evaluation {
        request = request.evaluation(id);
    }
    let evidence = vault.store(request).context("failed to store evidence")?;
    println!(
        "OK: stored evidence id={} digest={} location={}",
        evidence.id, evidence.digest, evidence.location
    );
    Ok(0)
}

fn cmd_get(vault: &EvidenceVault, id: &EvidenceId, output: Option<&Path>) -> Result<u8> {
    let Some((evidence, bytes)) = vault.retrieve(id)? else {
        println!("NOT FOUND: evidence {id}");
        return Ok(1);
    };
    match output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("OK: wrote {} byte(s) to {}", bytes.len(), path.display());
        }
        None => {
            print_json(&evidence)?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
    }
    Ok(0)
}

fn read_content(file: &Path) -> Result<EvidenceContent> {
    let bytes = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let is_json = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse JSON: {}", file.display()))?;
        return Ok(EvidenceContent::Structured(value));
    }
    Ok(match String::from_utf8(bytes) {
        Ok(text) => EvidenceContent::Text(text),
        Err(e) => EvidenceContent::Binary(e.into_bytes()),
    })
}

fn file_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
