// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Tracks the run state of every platform for the duration of one
//! orchestrator run, and exports it as a report afterward.
//!
//! A single `RwLock` over a small `HashMap` is enough: writes are one state
//! transition per platform (rare, short), reads are the export path at the
//! end of the run.

use chrono::{DateTime, Utc};
use etl_domain::LoadMode;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// Result of loading one table within a platform run.
#[derive(Debug, Clone)]
pub struct TableRunResult {
    pub table: String,
    pub load_mode: LoadMode,
    pub rows_inserted: u64,
    pub rows_updated: u64,
}

/// The lifecycle state of a single platform within a run, per the
/// orchestrator's state machine: pending -> running -> (completed | failed |
/// cancelled | skipped).
#[derive(Debug, Clone)]
pub enum PlatformRunState {
    Pending,
    Running {
        started_at: DateTime<Utc>,
    },
    Completed {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        tables: Vec<TableRunResult>,
        /// Total attempts `run_with_retry` needed, including the first.
        attempts: u32,
    },
    Failed {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: String,
        attempts: u32,
    },
    Skipped {
        reason: String,
    },
    Cancelled {
        started_at: Option<DateTime<Utc>>,
    },
}

impl PlatformRunState {
    pub fn label(&self) -> &'static str {
        match self {
            PlatformRunState::Pending => "pending",
            PlatformRunState::Running { .. } => "running",
            PlatformRunState::Completed { .. } => "completed",
            PlatformRunState::Failed { .. } => "failed",
            PlatformRunState::Skipped { .. } => "skipped",
            PlatformRunState::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlatformRunState::Pending | PlatformRunState::Running { .. })
    }
}

/// Shared, clonable handle to the run's execution state.
#[derive(Clone, Default)]
pub struct ExecutionMonitor {
    states: Arc<RwLock<HashMap<String, PlatformRunState>>>,
    run_started_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    run_finished_at: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl ExecutionMonitor {
    pub fn new(platform_names: impl IntoIterator<Item = String>) -> Self {
        let states = platform_names.into_iter().map(|name| (name, PlatformRunState::Pending)).collect();
        Self {
            states: Arc::new(RwLock::new(states)),
            run_started_at: Arc::new(RwLock::new(None)),
            run_finished_at: Arc::new(RwLock::new(None)),
        }
    }

    /// Marks the wall-clock start of the whole run, for `summary.started_at`
    /// and `summary.total_duration_seconds` in the exported report.
    pub fn mark_run_started(&self, at: DateTime<Utc>) {
        *self.run_started_at.write() = Some(at);
    }

    /// Marks the wall-clock end of the whole run.
    pub fn mark_run_finished(&self, at: DateTime<Utc>) {
        *self.run_finished_at.write() = Some(at);
    }

    pub fn mark_running(&self, platform: &str, started_at: DateTime<Utc>) {
        self.states.write().insert(platform.to_string(), PlatformRunState::Running { started_at });
    }

    pub fn mark_completed(
        &self,
        platform: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        tables: Vec<TableRunResult>,
        attempts: u32,
    ) {
        self.states
            .write()
            .insert(platform.to_string(), PlatformRunState::Completed { started_at, finished_at, tables, attempts });
    }

    pub fn mark_failed(&self, platform: &str, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, error: String, attempts: u32) {
        self.states
            .write()
            .insert(platform.to_string(), PlatformRunState::Failed { started_at, finished_at, error, attempts });
    }

    pub fn mark_skipped(&self, platform: &str, reason: String) {
        self.states.write().insert(platform.to_string(), PlatformRunState::Skipped { reason });
    }

    pub fn mark_cancelled(&self, platform: &str, started_at: Option<DateTime<Utc>>) {
        self.states.write().insert(platform.to_string(), PlatformRunState::Cancelled { started_at });
    }

    pub fn state(&self, platform: &str) -> Option<PlatformRunState> {
        self.states.read().get(platform).cloned()
    }

    /// Platform names in the given terminal state, for scheduler decisions
    /// (`completed` feeds `can_execute`, `failed ∪ skipped ∪ cancelled` feeds
    /// dependent-skip logic).
    pub fn names_in(&self, predicate: impl Fn(&PlatformRunState) -> bool) -> Vec<String> {
        self.states
            .read()
            .iter()
            .filter(|(_, s)| predicate(s))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn snapshot(&self) -> HashMap<String, PlatformRunState> {
        self.states.read().clone()
    }

    /// Writes the run report as pretty JSON: a `summary` block plus the flat
    /// `platforms` array.
    pub fn export_json(&self, writer: impl Write) -> Result<(), serde_json::Error> {
        let report = self.to_report();
        serde_json::to_writer_pretty(writer, &report)
    }

    /// Writes the run report as a flat CSV projection of `platforms[]`: one
    /// row per platform.
    pub fn export_csv(&self, mut writer: impl Write) -> std::io::Result<()> {
        writeln!(writer, "platform_name,status,duration_seconds,rows_processed,tables_processed,retry_count,error_message")?;
        let report = self.to_report();
        for entry in &report.platforms {
            writeln!(
                writer,
                "{},{},{},{},{},{},{}",
                entry.platform_name,
                entry.status,
                entry.duration_seconds.map(|d| d.to_string()).unwrap_or_default(),
                entry.rows_processed,
                entry.tables_processed,
                entry.retry_count,
                entry.error_message.as_deref().map(csv_escape).unwrap_or_default(),
            )?;
        }
        Ok(())
    }

    fn to_report(&self) -> RunReport {
        let snapshot = self.snapshot();
        let total_platforms = snapshot.len();
        let mut platforms: Vec<PlatformReportEntry> =
            snapshot.into_iter().map(|(name, state)| PlatformReportEntry::from_state(name, state)).collect();
        platforms.sort_by(|a, b| a.platform_name.cmp(&b.platform_name));

        let completed = platforms.iter().filter(|p| p.status == "completed").count();
        let failed = platforms.iter().filter(|p| p.status == "failed").count();
        let skipped = platforms.iter().filter(|p| p.status == "skipped" || p.status == "cancelled").count();
        let total_rows_processed = platforms.iter().map(|p| p.rows_processed).sum();
        let success_rate = if total_platforms == 0 { 0.0 } else { completed as f64 / total_platforms as f64 };

        let started_at = *self.run_started_at.read();
        let ended_at = *self.run_finished_at.read();
        let total_duration_seconds = match (started_at, ended_at) {
            (Some(s), Some(e)) => Some((e - s).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };

        RunReport {
            summary: RunSummaryReport {
                total_platforms,
                completed,
                failed,
                skipped,
                success_rate,
                total_rows_processed,
                total_duration_seconds,
                started_at,
                ended_at,
            },
            platforms,
        }
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[derive(serde::Serialize)]
struct RunReport {
    summary: RunSummaryReport,
    platforms: Vec<PlatformReportEntry>,
}

#[derive(serde::Serialize)]
struct RunSummaryReport {
    total_platforms: usize,
    completed: usize,
    failed: usize,
    skipped: usize,
    success_rate: f64,
    total_rows_processed: u64,
    total_duration_seconds: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

#[derive(serde::Serialize)]
struct PlatformReportEntry {
    platform_name: String,
    status: &'static str,
    duration_seconds: Option<f64>,
    rows_processed: u64,
    tables_processed: usize,
    retry_count: u32,
    error_message: Option<String>,
}

impl PlatformReportEntry {
    fn from_state(platform_name: String, state: PlatformRunState) -> Self {
        let status = state.label();
        match state {
            PlatformRunState::Completed { started_at, finished_at, tables, attempts } => Self {
                platform_name,
                status,
                duration_seconds: Some((finished_at - started_at).num_milliseconds() as f64 / 1000.0),
                rows_processed: tables.iter().map(|t| t.rows_inserted + t.rows_updated).sum(),
                tables_processed: tables.len(),
                retry_count: attempts.saturating_sub(1),
                error_message: None,
            },
            PlatformRunState::Failed { started_at, finished_at, error, attempts } => Self {
                platform_name,
                status,
                duration_seconds: Some((finished_at - started_at).num_milliseconds() as f64 / 1000.0),
                rows_processed: 0,
                tables_processed: 0,
                retry_count: attempts.saturating_sub(1),
                error_message: Some(error),
            },
            PlatformRunState::Skipped { reason } => Self {
                platform_name,
                status,
                duration_seconds: None,
                rows_processed: 0,
                tables_processed: 0,
                retry_count: 0,
                error_message: Some(reason),
            },
            PlatformRunState::Cancelled { .. } => Self {
                platform_name,
                status,
                duration_seconds: None,
                rows_processed: 0,
                tables_processed: 0,
                retry_count: 0,
                error_message: None,
            },
            PlatformRunState::Pending | PlatformRunState::Running { .. } => Self {
                platform_name,
                status,
                duration_seconds: None,
                rows_processed: 0,
                tables_processed: 0,
                retry_count: 0,
                error_message: None,
            },
        }
    }
}
