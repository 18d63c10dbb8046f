// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Installs the process-wide `tracing` subscriber. Bootstrap logging
//! (`etl_bootstrap::logger`) covers the window before this runs; everything
//! after `init()` goes through here.

/// Output format for application logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Text,
    /// One JSON object per line, for log aggregation in deployed environments.
    Json,
}

/// Installs the global `tracing` subscriber.
///
/// The filter defaults to `info`, overridable with `RUST_LOG` (standard
/// `tracing-subscriber` env-filter syntax, e.g. `etl_pipeline=debug,sqlx=warn`).
/// `--verbose` raises the default to `debug` when `RUST_LOG` is unset.
pub fn init(verbose: bool, format: LogFormat) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}
