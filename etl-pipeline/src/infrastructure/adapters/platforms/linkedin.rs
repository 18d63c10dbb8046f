// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! LinkedIn's table catalog: `campaign`, `creative`, `insights`, where
//! `insights` depends on `campaign` for driver URNs.

use crate::infrastructure::adapters::PlatformCatalog;
use etl_domain::{LoadMode, PlatformConfig, ProcessingStepConfig, RetryPolicy, TableConfig};
use std::collections::HashMap;

fn step(name: &str) -> ProcessingStepConfig {
    ProcessingStepConfig { step_name: name.into(), params: serde_json::Value::Null }
}

/// Builds the LinkedIn platform catalog. `priority`/`timeout_seconds` and
/// `depends_on` (cross-platform, not the in-platform table graph) come from
/// the orchestrator config and are overlaid by the caller after loading it;
/// this is the catalog's own table-level defaults.
pub fn catalog() -> PlatformCatalog {
    let campaign = TableConfig {
        name: "campaign".into(),
        processing: vec![step("extract_id_from_urn"), step("add_row_loaded_date")],
        load_mode: LoadMode::Upsert,
        pk_columns: vec!["id".into()],
        increment_columns: vec![],
        test_mode_suffix: true,
        depends_on_table: None,
        stop_on_failure: true,
    };
    let creative = TableConfig {
        name: "creative".into(),
        processing: vec![step("extract_id_from_urn"), step("add_row_loaded_date")],
        load_mode: LoadMode::Upsert,
        pk_columns: vec!["id".into()],
        increment_columns: vec![],
        test_mode_suffix: true,
        depends_on_table: None,
        stop_on_failure: false,
    };
    let insights = TableConfig {
        name: "insights".into(),
        processing: vec![step("replace_nan_with_zero"), step("convert_unix_timestamp"), step("add_row_loaded_date")],
        load_mode: LoadMode::Increment,
        pk_columns: vec!["campaign_id".into()],
        increment_columns: vec!["impressions".into(), "clicks".into(), "cost".into()],
        test_mode_suffix: true,
        depends_on_table: Some("campaign".into()),
        stop_on_failure: false,
    };

    PlatformCatalog {
        config: PlatformConfig {
            name: "linkedin".into(),
            enabled: true,
            priority: 0,
            timeout_seconds: 300,
            depends_on: vec![],
            retry: RetryPolicy::default(),
            tables: vec![campaign, creative, insights],
        },
        driver_key_columns: HashMap::from([("campaign".to_string(), "id".to_string())]),
        test_mode_suffix: "_test".into(),
    }
}
