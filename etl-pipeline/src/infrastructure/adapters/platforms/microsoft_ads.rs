// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Microsoft Ads' table catalog: `campaign`, `ad_group`, `insights`, where
//! `insights` depends on `ad_group`.

use crate::infrastructure::adapters::PlatformCatalog;
use etl_domain::{LoadMode, PlatformConfig, ProcessingStepConfig, RetryPolicy, TableConfig};
use std::collections::HashMap;

fn step(name: &str) -> ProcessingStepConfig {
    ProcessingStepConfig { step_name: name.into(), params: serde_json::Value::Null }
}

pub fn catalog() -> PlatformCatalog {
    let campaign = TableConfig {
        name: "campaign".into(),
        processing: vec![step("add_row_loaded_date")],
        load_mode: LoadMode::Upsert,
        pk_columns: vec!["id".into()],
        increment_columns: vec![],
        test_mode_suffix: true,
        depends_on_table: None,
        stop_on_failure: true,
    };
    let ad_group = TableConfig {
        name: "ad_group".into(),
        processing: vec![step("add_row_loaded_date")],
        load_mode: LoadMode::Upsert,
        pk_columns: vec!["id".into()],
        increment_columns: vec![],
        test_mode_suffix: true,
        depends_on_table: None,
        stop_on_failure: false,
    };
    let insights = TableConfig {
        name: "insights".into(),
        processing: vec![step("replace_nan_with_zero"), step("add_row_loaded_date")],
        load_mode: LoadMode::Increment,
        pk_columns: vec!["ad_group_id".into()],
        increment_columns: vec!["impressions".into(), "clicks".into(), "spend".into()],
        test_mode_suffix: true,
        depends_on_table: Some("ad_group".into()),
        stop_on_failure: false,
    };

    PlatformCatalog {
        config: PlatformConfig {
            name: "microsoft_ads".into(),
            enabled: true,
            priority: 0,
            timeout_seconds: 300,
            depends_on: vec![],
            retry: RetryPolicy::default(),
            tables: vec![campaign, ad_group, insights],
        },
        driver_key_columns: HashMap::from([("ad_group".to_string(), "id".to_string())]),
        test_mode_suffix: "_test".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_tables_pass_their_own_validation() {
        for table in &catalog().config.tables {
            table.validate().unwrap();
        }
    }

    #[test]
    fn platform_name_matches_the_contract() {
        assert_eq!(catalog().config.name, "microsoft_ads");
    }
}
