// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for a platform's external API collaborator.
//!
//! Everything on the other side of this trait — LinkedIn, Facebook, Google,
//! or Microsoft's HTTP/SDK calls — is deliberately out of scope for the
//! core; only the contract toward the core is specified here.

use crate::{DateRange, EtlError, TabularPayload};
use async_trait::async_trait;

/// Driver keys (e.g. campaign URNs) fetched from a dependency table that
/// parameterize extraction of a dependent table.
pub type DriverKeys = Vec<String>;

/// A platform's external extraction collaborator: given a date range, a
/// logical table name, and (for dependent tables) a set of driver keys,
/// produces a tabular payload.
#[async_trait]
pub trait PlatformExtractor: Send + Sync {
    /// Extracts rows for `table` over `date_range`. `driver_keys` is empty
    /// for root tables and non-empty for tables with a value-level
    /// dependency on another table.
    async fn extract(
        &self,
        table: &str,
        date_range: DateRange,
        driver_keys: &DriverKeys,
    ) -> Result<TabularPayload, EtlError>;
}
