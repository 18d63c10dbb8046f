// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for the analytical warehouse the system loads tabular payloads into.
//!
//! This trait is the seam between the orchestrator/platform pipelines and
//! the concrete warehouse driver (a `sqlx`-backed Postgres adapter in
//! `etl-pipeline`, or an in-memory fake in tests). No implementation detail
//! of any particular driver leaks into this interface.

use crate::{EtlError, LoadMode, TabularPayload};
use async_trait::async_trait;

/// Outcome of a single `load` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub rows_inserted: u64,
    pub rows_updated: u64,
}

impl LoadOutcome {
    pub fn rows_affected(&self) -> u64 {
        self.rows_inserted + self.rows_updated
    }
}

/// Persists tabular payloads into a named warehouse table under a chosen
/// load mode, preserving invariants I1-I4 from the system design.
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Loads `payload` into `table` under `mode`. `pk_columns` identifies
    /// the row for dedupe/upsert/increment; `increment_columns` is only
    /// consulted when `mode == LoadMode::Increment`.
    ///
    /// Type-alignment runs before any write; a payload that cannot be
    /// coerced to the target schema fails the whole load before any row is
    /// written.
    async fn load(
        &self,
        payload: TabularPayload,
        table: &str,
        mode: LoadMode,
        pk_columns: &[String],
        increment_columns: &[String],
    ) -> Result<LoadOutcome, EtlError>;

    /// A read-only helper used by platform pipelines to fetch driver keys
    /// from a dependency table (e.g. the set of campaign ids needed to
    /// drive insights extraction).
    async fn query(&self, sql: &str) -> Result<TabularPayload, EtlError>;

    async fn table_exists(&self, table: &str) -> Result<bool, EtlError>;

    async fn close(&self);
}
