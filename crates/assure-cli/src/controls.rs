//! # Controls Subcommand
//!
//! Read-only views of the control catalog.

use anyhow::Result;
use clap::{Args, Subcommand};

use assure_controls::{Control, ControlFilter, ControlLogic};
use assure_core::{Severity, TscCategory};

use crate::config::AssureConfig;
use crate::{open_engine, print_json};

/// Arguments for `assure controls`.
#[derive(Args, Debug)]
pub struct ControlsArgs {
    #[command(subcommand)]
    pub command: ControlsCommand,
}

/// Controls subcommands.
#[derive(Subcommand, Debug)]
pub enum ControlsCommand {
    /// List controls, optionally filtered.
    List {
        /// Trust Services category, e.g. "security" or "processing-integrity".
        #[arg(long)]
        category: Option<TscCategory>,
        /// Severity, e.g. "critical".
        #[arg(long)]
        severity: Option<Severity>,
        /// Include disabled controls.
        #[arg(long)]
        all: bool,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one control in full.
    Show {
        /// Control id, e.g. "CC6.1-MFA".
        id: String,
    },
}

/// Execute the controls subcommand.
pub fn run_controls(args: &ControlsArgs, config: &AssureConfig) -> Result<u8> {
    let engine = open_engine(config)?;
    let catalog = engine.catalog();

    match &args.command {
        ControlsCommand::List {
            category,
            severity,
            all,
            json,
        } => {
            let filter = ControlFilter {
                category: *category,
                severity: *severity,
                enabled_only: !all,
            };
            let controls = catalog.list(&filter);
            if *json {
                print_json(&controls)?;
            } else {
                for control in &controls {
                    println!("{}", summary_line(control));
                }
                println!("{} control(s)", controls.len());
            }
            Ok(0)
        }
        ControlsCommand::Show { id } => match catalog.get(id) {
            Some(control) => {
                print_json(control)?;
                Ok(0)
            }
            None => {
                println!("NOT FOUND: control {id}");
                Ok(1)
            }
        },
    }
}

fn summary_line(control: &Control) -> String {
    let rule = match &control.logic {
        ControlLogic::Unrecognized { type_name } => format!("unsupported:{type_name}"),
        logic => logic.rule().unwrap_or_default().to_string(),
    };
    format!(
        "{:<28} {:<9} {:<22} {:<30} {}{}",
        control.id,
        control.severity,
        control.category,
        rule,
        control.name,
        if control.enabled { "" } else { " (disabled)" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn list(category: Option<TscCategory>, all: bool) -> ControlsArgs {
        ControlsArgs {
            command: ControlsCommand::List {
                category,
                severity: None,
                all,
                json: false,
            },
        }
    }

    #[test]
    fn lists_shipped_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let config = testing::config(dir.path());
        assert_eq!(run_controls(&list(None, false), &config).unwrap(), 0);
        assert_eq!(run_controls(&list(Some(TscCategory::Availability), true), &config).unwrap(), 0);
    }

    #[test]
    fn show_unknown_control_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let args = ControlsArgs {
            command: ControlsCommand::Show {
                id: "NOPE-1".to_string(),
            },
        };
        assert_eq!(run_controls(&args, &testing::config(dir.path())).unwrap(), 1);
    }

    #[test]
    fn show_known_control() {
        let dir = tempfile::tempdir().unwrap();
        let args = ControlsArgs {
            command: ControlsCommand::Show {
                id: "CC6.1-MFA".to_string(),
            },
        };
        assert_eq!(run_controls(&args, &testing::config(dir.path())).unwrap(), 0);
    }

    #[test]
    fn missing_catalog_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = testing::config(dir.path());
        config.catalog_dir = dir.path().join("absent");
        assert!(run_controls(&list(None, false), &config).is_err());
    }

    #[test]
    fn summary_marks_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let engine = open_engine(&testing::config(dir.path())).unwrap();
        let catalog = engine.catalog();
        let mut control = catalog.get("CC6.1-MFA").unwrap().clone();
        assert!(summary_line(&control).contains("admin_without_mfa"));
        control.enabled = false;
        assert!(summary_line(&control).ends_with("(disabled)"));
    }
}
