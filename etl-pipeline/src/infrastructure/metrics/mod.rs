// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Prometheus metrics for run observability: rows moved per platform/table,
//! per-platform run duration, and retry counts. A thin wrapper over a
//! `prometheus::Registry`, scraped through an external exporter — this
//! crate only records, it does not serve `/metrics` itself.

use etl_domain::EtlError;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use std::sync::Arc;
use tracing::debug;

/// Prometheus metrics for one orchestrator run.
#[derive(Clone)]
pub struct EtlMetrics {
    registry: Arc<Registry>,
    rows_processed_total: IntCounterVec,
    platform_duration_seconds: Histogram,
    retries_total: IntCounterVec,
    table_failures_total: IntCounterVec,
}

impl EtlMetrics {
    pub fn new() -> Result<Self, EtlError> {
        let registry = Registry::new();

        let rows_processed_total = IntCounterVec::new(
            Opts::new("etl_rows_processed_total", "Rows written to the warehouse").namespace("etl"),
            &["platform", "table", "load_mode"],
        )
        .map_err(|e| EtlError::Fatal(format!("failed to create rows_processed_total metric: {e}")))?;

        let platform_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("etl_platform_duration_seconds", "Wall-clock duration of one platform run")
                .namespace("etl")
                .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )
        .map_err(|e| EtlError::Fatal(format!("failed to create platform_duration_seconds metric: {e}")))?;

        let retries_total = IntCounterVec::new(Opts::new("etl_retries_total", "Transient failures retried").namespace("etl"), &["platform"])
            .map_err(|e| EtlError::Fatal(format!("failed to create retries_total metric: {e}")))?;

        let table_failures_total = IntCounterVec::new(
            Opts::new("etl_table_failures_total", "Table loads that failed").namespace("etl"),
            &["platform", "table"],
        )
        .map_err(|e| EtlError::Fatal(format!("failed to create table_failures_total metric: {e}")))?;

        registry
            .register(Box::new(rows_processed_total.clone()))
            .map_err(|e| EtlError::Fatal(format!("failed to register rows_processed_total: {e}")))?;
        registry
            .register(Box::new(platform_duration_seconds.clone()))
            .map_err(|e| EtlError::Fatal(format!("failed to register platform_duration_seconds: {e}")))?;
        registry
            .register(Box::new(retries_total.clone()))
            .map_err(|e| EtlError::Fatal(format!("failed to register retries_total: {e}")))?;
        registry
            .register(Box::new(table_failures_total.clone()))
            .map_err(|e| EtlError::Fatal(format!("failed to register table_failures_total: {e}")))?;

        debug!("EtlMetrics initialized with Prometheus registry");
        Ok(Self {
            registry: Arc::new(registry),
            rows_processed_total,
            platform_duration_seconds,
            retries_total,
            table_failures_total,
        })
    }

    pub fn record_table_load(&self, platform: &str, table: &str, load_mode: &str, rows: u64) {
        self.rows_processed_total.with_label_values(&[platform, table, load_mode]).inc_by(rows);
    }

    pub fn record_platform_duration(&self, seconds: f64) {
        self.platform_duration_seconds.observe(seconds);
    }

    pub fn record_retry(&self, platform: &str) {
        self.retries_total.with_label_values(&[platform]).inc();
    }

    pub fn record_table_failure(&self, platform: &str, table: &str) {
        self.table_failures_total.with_label_values(&[platform, table]).inc();
    }

    /// The underlying registry, for wiring into an HTTP `/metrics` exporter.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}
