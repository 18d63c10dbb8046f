// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `run-all` use case: every enabled platform, under the scheduler's
//! execution groups.

use crate::application::services::{Orchestrator, RunOptions, RunSummary};
use etl_bootstrap::cli::ValidatedRunArgs;
use etl_domain::{DateRange, EtlError};

/// Resolves `run-all`'s CLI arguments against the orchestrator's configured
/// default date range, then runs it.
pub struct RunAllUseCase<'a> {
    orchestrator: &'a Orchestrator,
    default_date_range: DateRange,
    manual_groups: Option<Vec<Vec<String>>>,
}

impl<'a> RunAllUseCase<'a> {
    pub fn new(orchestrator: &'a Orchestrator, default_date_range: DateRange, manual_groups: Option<Vec<Vec<String>>>) -> Self {
        Self { orchestrator, default_date_range, manual_groups }
    }

    pub async fn execute(&self, args: ValidatedRunArgs) -> Result<RunSummary, EtlError> {
        let date_range = match args.date_range_override {
            Some((start, end)) => DateRange::new(start, end)?,
            None => self.default_date_range,
        };
        let options = RunOptions { date_range, dry_run: args.dry_run, test_mode: args.test_mode, tables: None };
        self.orchestrator.run_all(options, self.manual_groups.as_deref()).await
    }
}
