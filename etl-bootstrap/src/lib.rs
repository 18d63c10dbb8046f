// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! The bootstrap module sits **outside** the domain/application/
//! infrastructure layers in `etl-domain`/`etl-pipeline` and provides:
//!
//! - **Argument parsing** - CLI parsing and validation (`cli`)
//! - **Signal handling** - Graceful shutdown on SIGTERM/SIGINT (`signals`)
//! - **Shutdown coordination** - Cancellation token propagation (`shutdown`)
//! - **Exit codes** - The run's process exit code (`exit_code`)
//! - **Bootstrap logging** - Logging before the application's own tracing
//!   subscriber is installed (`logger`)
//!
//! ## Architecture Position
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          BOOTSTRAP (This Module)            │
//! │  - CLI parsing                              │
//! │  - Signal handling                          │
//! │  - Shutdown coordination                    │
//! │  - Exit codes                               │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │         APPLICATION LAYER (etl-pipeline)    │
//! │  - Orchestrator, scheduler, processing      │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │           DOMAIN LAYER (etl-domain)         │
//! │  - Tabular payload, load modes, ports       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Bootstrap can depend on the enterprise layers; they never depend back on
//! bootstrap.

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod shutdown;
pub mod signals;

pub use cli::{parse_and_validate, ValidatedCli, ValidatedCommand};
pub use exit_code::ExitCode;

/// Parse and validate CLI arguments. Clap handles `--help`/`--version` and
/// exits the process on parse failure.
pub fn bootstrap_cli() -> Result<ValidatedCli, cli::ParseError> {
    cli::parse_and_validate()
}
