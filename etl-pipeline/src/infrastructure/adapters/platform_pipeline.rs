// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The generic platform pipeline: extract -> transform -> load, run once per
//! table in a platform's dependency order, parameterized by the injected
//! [`PlatformExtractor`] and a [`PlatformCatalog`] describing which tables a
//! platform owns and how they depend on one another.
//!
//! The four concrete platforms (LinkedIn, Facebook, Google Ads, Microsoft
//! Ads) differ only in their `PlatformCatalog` and `PlatformExtractor`;
//! this type implements the shared algorithm once.

use crate::application::services::orchestrator::{PlatformPipeline, PlatformRunReport, RunOptions};
use crate::application::services::processing_pipeline::{Pipeline, StepRegistry};
use crate::application::services::TableRunResult;
use crate::infrastructure::adapters::warehouse_sink::quote_ident;
use async_trait::async_trait;
use etl_domain::{EtlError, PlatformConfig, PlatformExtractor, TableConfig, Value, WarehouseSink};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A platform's table configuration plus the driver-key wiring between its
/// own tables (the value-level dependencies `TableConfig::depends_on_table`
/// refers to by name).
#[derive(Debug, Clone)]
pub struct PlatformCatalog {
    pub config: PlatformConfig,
    /// Maps a driver table's name to the column of its *processed* payload
    /// whose values become the driver keys for tables that depend on it.
    /// Tables absent from this map default to `"id"`.
    pub driver_key_columns: HashMap<String, String>,
    /// Suffix appended to a table's name under `--test-mode` (only for
    /// tables that opt in via `TableConfig::test_mode_suffix`).
    pub test_mode_suffix: String,
}

impl PlatformCatalog {
    fn driver_key_column(&self, driver_table: &str) -> &str {
        self.driver_key_columns.get(driver_table).map(String::as_str).unwrap_or("id")
    }
}

/// Extract -> transform -> load for one platform, generic over its external
/// collaborator.
pub struct GenericPlatformPipeline<E: PlatformExtractor> {
    catalog: PlatformCatalog,
    extractor: E,
    warehouse: Arc<dyn WarehouseSink>,
    step_registry: StepRegistry,
}

impl<E: PlatformExtractor> GenericPlatformPipeline<E> {
    pub fn new(catalog: PlatformCatalog, extractor: E, warehouse: Arc<dyn WarehouseSink>, step_registry: StepRegistry) -> Self {
        Self { catalog, extractor, warehouse, step_registry }
    }

    fn wants_table(&self, table: &str, restrict: &Option<Vec<String>>) -> bool {
        restrict.as_ref().map(|names| names.iter().any(|n| n == table)).unwrap_or(true)
    }

    /// Resolves the driver keys a dependent table's extraction is
    /// parameterized by. When the driver table ran earlier in this same
    /// invocation its in-memory output is used directly; when it didn't
    /// (e.g. `--tables insights` restricts the run to the dependent table
    /// alone), its already-loaded values are queried back out of the
    /// warehouse instead of treating the dependency as unsatisfiable.
    async fn driver_keys_for(
        &self,
        table: &TableConfig,
        outputs: &HashMap<String, etl_domain::TabularPayload>,
        options: &RunOptions,
    ) -> Result<Vec<String>, EtlError> {
        let Some(driver_table) = &table.depends_on_table else {
            return Ok(Vec::new());
        };
        let column_name = self.catalog.driver_key_column(driver_table);

        if let Some(payload) = outputs.get(driver_table) {
            return extract_keys(payload, driver_table, column_name);
        }

        warn!(
            platform = self.name(),
            driver_table = driver_table.as_str(),
            "driver table did not run this invocation, querying its existing warehouse rows instead"
        );
        let driver_config = self
            .catalog
            .config
            .table(driver_table)
            .ok_or_else(|| EtlError::Dependency(format!("table '{}' depends on undeclared table '{driver_table}'", table.name)))?;
        let target = driver_config.target_table_name(options.test_mode, &self.catalog.test_mode_suffix);
        let sql = format!("SELECT DISTINCT {} FROM {}", quote_ident(column_name), quote_ident(&target));
        let payload = self.warehouse.query(&sql).await.map_err(|e| {
            EtlError::Dependency(format!(
                "table '{}' depends on '{driver_table}', which did not run this invocation, \
                 and querying its existing rows failed: {e}",
                table.name
            ))
        })?;
        extract_keys(&payload, driver_table, column_name)
    }
}

fn extract_keys(payload: &etl_domain::TabularPayload, driver_table: &str, column_name: &str) -> Result<Vec<String>, EtlError> {
    let column = payload
        .column(column_name)
        .ok_or_else(|| EtlError::Dependency(format!("driver table '{driver_table}' has no column '{column_name}'")))?;
    if column.values.is_empty() {
        return Err(EtlError::Dependency(format!("driver table '{driver_table}' produced zero keys")));
    }
    Ok(column.values.iter().map(Value::stringify).collect())
}

#[async_trait]
impl<E: PlatformExtractor> PlatformPipeline for GenericPlatformPipeline<E> {
    fn name(&self) -> &str {
        &self.catalog.config.name
    }

    async fn run(&self, options: &RunOptions) -> Result<PlatformRunReport, EtlError> {
        let order = self.catalog.config.table_execution_order()?;
        let mut outputs: HashMap<String, etl_domain::TabularPayload> = HashMap::new();
        let mut results = Vec::new();

        for table in order {
            if !self.wants_table(&table.name, &options.tables) {
                continue;
            }

            let driver_keys = self.driver_keys_for(table, &outputs, options).await?;
            let extracted = self.extractor.extract(&table.name, options.date_range, &driver_keys).await?;
            let pipeline = Pipeline::build(&self.step_registry, &table.processing)?;
            let processed = pipeline.process(extracted)?;

            if outputs_feed_a_dependent(&self.catalog.config, &table.name) {
                outputs.insert(table.name.clone(), processed.clone());
            }

            if options.dry_run {
                info!(platform = self.name(), table = table.name.as_str(), "dry run: skipping warehouse load");
                continue;
            }

            let target = table.target_table_name(options.test_mode, &self.catalog.test_mode_suffix);
            match self.warehouse.load(processed, &target, table.load_mode, &table.pk_columns, &table.increment_columns).await {
                Ok(outcome) => {
                    results.push(TableRunResult {
                        table: table.name.clone(),
                        load_mode: table.load_mode,
                        rows_inserted: outcome.rows_inserted,
                        rows_updated: outcome.rows_updated,
                    });
                }
                Err(e) if table.stop_on_failure => return Err(e),
                Err(e) => {
                    error!(platform = self.name(), table = table.name.as_str(), error = %e, "table load failed, continuing with remaining tables");
                }
            }
        }

        Ok(PlatformRunReport { tables: results })
    }
}

fn outputs_feed_a_dependent(config: &PlatformConfig, table_name: &str) -> bool {
    config.tables.iter().any(|t| t.depends_on_table.as_deref() == Some(table_name))
}
