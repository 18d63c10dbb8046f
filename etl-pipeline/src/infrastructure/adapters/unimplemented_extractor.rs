// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A [`PlatformExtractor`] that always fails with a descriptive error.
//!
//! The HTTP/SDK calls to each advertising platform's reporting API are a
//! deliberately external collaborator: only the contract this core depends
//! on (`PlatformExtractor`) is specified, not a concrete implementation.
//! This stub lets every other layer — config loading, the scheduler, the
//! orchestrator, the warehouse sink — be wired and run end to end (e.g.
//! under `--dry-run`, or against a test double in integration tests)
//! without a real HTTP client. A deployment wires in its own
//! `PlatformExtractor` per platform in place of this one.

use async_trait::async_trait;
use etl_domain::{DateRange, DriverKeys, EtlError, PlatformExtractor, TabularPayload};

pub struct UnimplementedExtractor {
    platform: String,
}

impl UnimplementedExtractor {
    pub fn new(platform: impl Into<String>) -> Self {
        Self { platform: platform.into() }
    }
}

#[async_trait]
impl PlatformExtractor for UnimplementedExtractor {
    async fn extract(&self, table: &str, _date_range: DateRange, _driver_keys: &DriverKeys) -> Result<TabularPayload, EtlError> {
        Err(EtlError::Fatal(format!(
            "no PlatformExtractor wired for platform '{}' table '{table}' — this core only specifies the extraction contract; \
             supply a concrete implementation",
            self.platform
        )))
    }
}
