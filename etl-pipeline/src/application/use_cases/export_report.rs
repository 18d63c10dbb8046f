// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `export-report` use case: writes the last run's execution report to a
//! file in the requested format.

use crate::application::services::ExecutionMonitor;
use etl_bootstrap::cli::ReportFormat;
use etl_domain::EtlError;
use std::fs::File;
use std::path::Path;

pub struct ExportReportUseCase<'a> {
    monitor: &'a ExecutionMonitor,
}

impl<'a> ExportReportUseCase<'a> {
    pub fn new(monitor: &'a ExecutionMonitor) -> Self {
        Self { monitor }
    }

    pub fn execute(&self, format: ReportFormat, path: &Path) -> Result<(), EtlError> {
        let file = File::create(path).map_err(|e| EtlError::Fatal(format!("cannot create report file {}: {e}", path.display())))?;
        match format {
            ReportFormat::Json => self
                .monitor
                .export_json(file)
                .map_err(|e| EtlError::Fatal(format!("failed to write JSON report: {e}"))),
            ReportFormat::Csv => self
                .monitor
                .export_csv(file)
                .map_err(|e| EtlError::Fatal(format!("failed to write CSV report: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::TableRunResult;
    use etl_domain::LoadMode;
    use tempfile::NamedTempFile;

    #[test]
    fn writes_json_report_to_disk() {
        let monitor = ExecutionMonitor::new(["linkedin".to_string()]);
        monitor.mark_completed(
            "linkedin",
            chrono::Utc::now(),
            chrono::Utc::now(),
            vec![TableRunResult { table: "campaign".into(), load_mode: LoadMode::Upsert, rows_inserted: 1, rows_updated: 0 }],
            1,
        );
        let temp = NamedTempFile::new().unwrap();
        let use_case = ExportReportUseCase::new(&monitor);
        use_case.execute(ReportFormat::Json, temp.path()).unwrap();
        let contents = std::fs::read_to_string(temp.path()).unwrap();
        assert!(contents.contains("linkedin"));
        assert!(contents.contains("\"summary\""));
    }
}
