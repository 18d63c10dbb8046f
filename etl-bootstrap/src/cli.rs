// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling: parse with `clap`, then validate every
//! argument (date ranges, table lists) before it reaches application code.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parse_cli()                     │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. parse_and_validate()            │  Date-range/value validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing or validating CLI arguments.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },
}

/// Main CLI structure.
#[derive(Parser, Debug, Clone)]
#[command(name = "etl")]
#[command(about = concat!("Multi-platform advertising ETL core v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Orchestrator config file path (defaults to `config/orchestrator.yaml`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Platform table config directory (defaults to `config/platforms/`).
    #[arg(long)]
    pub platforms_dir: Option<PathBuf>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run every enabled platform under the scheduler's execution groups.
    RunAll {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Run a single platform, ignoring its declared dependencies.
    RunOne {
        /// Platform name, as declared in the orchestrator config.
        #[arg(long)]
        platform: String,

        /// Restrict the run to these logical tables (comma-separated).
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Export the last run's execution report.
    ExportReport {
        /// Output format.
        #[arg(long, value_enum)]
        format: ReportFormat,

        /// Destination file path.
        #[arg(long)]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Json,
    Csv,
}

/// Arguments shared by `run-all` and `run-one`.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Extract+transform but skip every warehouse write.
    #[arg(long)]
    pub dry_run: bool,

    /// Append the configured test suffix to every target table name.
    #[arg(long)]
    pub test_mode: bool,

    /// Overrides the date range start (inclusive), `YYYY-MM-DD`.
    #[arg(long)]
    pub start_date: Option<String>,

    /// Overrides the date range end (inclusive), `YYYY-MM-DD`.
    #[arg(long)]
    pub end_date: Option<String>,
}

/// Validated CLI configuration: every path/value has been checked before
/// application code sees it.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    pub platforms_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ValidatedRunArgs {
    pub dry_run: bool,
    pub test_mode: bool,
    pub date_range_override: Option<(NaiveDate, NaiveDate)>,
}

/// Validated command variants.
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    RunAll { run: ValidatedRunArgs },
    RunOne { platform: String, tables: Option<Vec<String>>, run: ValidatedRunArgs },
    ExportReport { format: ReportFormat, path: PathBuf },
}

/// Parse CLI arguments. Clap handles `--help`/`--version` and exits the
/// process on parse failure.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse and validate CLI arguments in one call.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(parse_cli())
}

fn validate_run_args(run: RunArgs) -> Result<ValidatedRunArgs, ParseError> {
    let date_range_override = match (run.start_date, run.end_date) {
        (None, None) => None,
        (Some(start), Some(end)) => {
            let start = parse_date("start-date", &start)?;
            let end = parse_date("end-date", &end)?;
            if start > end {
                return Err(ParseError::InvalidValue {
                    arg: "end-date".into(),
                    reason: format!("{end} is before --start-date {start}"),
                });
            }
            Some((start, end))
        }
        _ => {
            return Err(ParseError::InvalidValue {
                arg: "start-date/end-date".into(),
                reason: "both or neither of --start-date and --end-date must be given".into(),
            })
        }
    };
    Ok(ValidatedRunArgs {
        dry_run: run.dry_run,
        test_mode: run.test_mode,
        date_range_override,
    })
}

fn parse_date(arg: &str, raw: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| ParseError::InvalidValue {
        arg: arg.to_string(),
        reason: format!("expected YYYY-MM-DD: {e}"),
    })
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let command = match cli.command {
        Commands::RunAll { run } => ValidatedCommand::RunAll {
            run: validate_run_args(run)?,
        },
        Commands::RunOne { platform, tables, run } => {
            if platform.trim().is_empty() {
                return Err(ParseError::InvalidValue {
                    arg: "platform".into(),
                    reason: "must not be empty".into(),
                });
            }
            ValidatedCommand::RunOne {
                platform,
                tables,
                run: validate_run_args(run)?,
            }
        }
        Commands::ExportReport { format, path } => ValidatedCommand::ExportReport { format, path },
    };

    Ok(ValidatedCli {
        command,
        verbose: cli.verbose,
        config: cli.config,
        platforms_dir: cli.platforms_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(start: Option<&str>, end: Option<&str>) -> RunArgs {
        RunArgs {
            dry_run: false,
            test_mode: false,
            start_date: start.map(String::from),
            end_date: end.map(String::from),
        }
    }

    #[test]
    fn accepts_a_well_formed_date_range() {
        let validated = validate_run_args(run_args(Some("2026-07-01"), Some("2026-07-26"))).unwrap();
        assert!(validated.date_range_override.is_some());
    }

    #[test]
    fn rejects_inverted_date_range() {
        assert!(validate_run_args(run_args(Some("2026-07-26"), Some("2026-07-01"))).is_err());
    }

    #[test]
    fn rejects_one_sided_date_range() {
        assert!(validate_run_args(run_args(Some("2026-07-01"), None)).is_err());
    }

    #[test]
    fn rejects_empty_platform_name() {
        let cli = Cli {
            command: Commands::RunOne {
                platform: "  ".into(),
                tables: None,
                run: run_args(None, None),
            },
            verbose: false,
            config: None,
            platforms_dir: None,
        };
        assert!(validate_cli(cli).is_err());
    }
}
