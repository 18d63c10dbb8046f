// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `run-one` use case: a single named platform, its declared
//! dependencies ignored.

use crate::application::services::{Orchestrator, RunOptions, RunSummary};
use etl_bootstrap::cli::ValidatedRunArgs;
use etl_domain::{DateRange, EtlError};

pub struct RunOneUseCase<'a> {
    orchestrator: &'a Orchestrator,
    default_date_range: DateRange,
}

impl<'a> RunOneUseCase<'a> {
    pub fn new(orchestrator: &'a Orchestrator, default_date_range: DateRange) -> Self {
        Self { orchestrator, default_date_range }
    }

    pub async fn execute(&self, platform: &str, tables: Option<Vec<String>>, args: ValidatedRunArgs) -> Result<RunSummary, EtlError> {
        let date_range = match args.date_range_override {
            Some((start, end)) => DateRange::new(start, end)?,
            None => self.default_date_range,
        };
        let options = RunOptions { date_range, dry_run: args.dry_run, test_mode: args.test_mode, tables };
        self.orchestrator.run_one(platform, options).await
    }
}
