// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end coverage of the orchestrator/pipeline/warehouse stack, wired
//! the way `main.rs` wires it but against an in-memory warehouse instead of
//! Postgres, so load-mode semantics, driver-key propagation, and
//! continue-on-failure behavior are exercised through the public API
//! rather than unit-by-unit.

use async_trait::async_trait;
use etl_bootstrap::shutdown::ShutdownCoordinator;
use etl_domain::{
    Column, DateRange, DriverKeys, EtlError, LoadMode, LoadOutcome, PlatformConfig, PlatformExtractor, RetryPolicy, TableConfig,
    TabularPayload, Value, WarehouseSink,
};
use etl_pipeline::application::services::{register_builtin_steps, Orchestrator, OrchestratorPolicy, PlatformPipeline, RunOptions, StepRegistry};
use etl_pipeline::infrastructure::adapters::{GenericPlatformPipeline, PlatformCatalog};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// An in-memory warehouse implementing the same four load-mode semantics as
/// the Postgres sink, keyed by stringified primary-key tuples instead of a
/// real `ON CONFLICT` statement.
#[derive(Default)]
struct FakeWarehouse {
    tables: Mutex<HashMap<String, Vec<HashMap<String, Value>>>>,
    fail_tables: HashSet<String>,
}

impl FakeWarehouse {
    fn new() -> Self {
        Self::default()
    }

    fn failing_on(tables: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            fail_tables: tables.into_iter().map(String::from).collect(),
        }
    }

    fn rows_of(&self, table: &str) -> Vec<HashMap<String, Value>> {
        self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    fn payload_rows(payload: &TabularPayload) -> Vec<HashMap<String, Value>> {
        (0..payload.row_count())
            .map(|i| payload.row(i).into_iter().map(|(name, value)| (name.to_string(), value.clone())).collect())
            .collect()
    }

    fn key_of(row: &HashMap<String, Value>, pk_columns: &[String]) -> Vec<String> {
        pk_columns.iter().map(|c| row.get(c).map(Value::stringify).unwrap_or_default()).collect()
    }

    fn numeric_sum(a: &Value, b: &Value) -> Value {
        match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => Value::Integer(x + y),
            (Value::Floating(x), Value::Floating(y)) => Value::Floating(x + y),
            _ => b.clone(),
        }
    }
}

#[async_trait]
impl WarehouseSink for FakeWarehouse {
    async fn load(
        &self,
        payload: TabularPayload,
        table: &str,
        mode: LoadMode,
        pk_columns: &[String],
        increment_columns: &[String],
    ) -> Result<LoadOutcome, EtlError> {
        if self.fail_tables.contains(table) {
            return Err(EtlError::Data(format!("simulated load failure for table '{table}'")));
        }

        let incoming = Self::payload_rows(&payload);
        let mut store = self.tables.lock().unwrap();
        let rows = store.entry(table.to_string()).or_default();
        let mut outcome = LoadOutcome::default();

        match mode {
            LoadMode::Replace => {
                outcome.rows_inserted = incoming.len() as u64;
                *rows = incoming;
            }
            LoadMode::Append if pk_columns.is_empty() => {
                outcome.rows_inserted = incoming.len() as u64;
                rows.extend(incoming);
            }
            LoadMode::Append => {
                let existing: HashSet<Vec<String>> = rows.iter().map(|r| Self::key_of(r, pk_columns)).collect();
                for row in incoming {
                    if !existing.contains(&Self::key_of(&row, pk_columns)) {
                        outcome.rows_inserted += 1;
                        rows.push(row);
                    }
                }
            }
            LoadMode::Upsert => {
                for row in incoming {
                    let key = Self::key_of(&row, pk_columns);
                    if let Some(existing) = rows.iter_mut().find(|r| Self::key_of(r, pk_columns) == key) {
                        *existing = row;
                        outcome.rows_updated += 1;
                    } else {
                        outcome.rows_inserted += 1;
                        rows.push(row);
                    }
                }
            }
            LoadMode::Increment => {
                for row in incoming {
                    let key = Self::key_of(&row, pk_columns);
                    if let Some(existing) = rows.iter_mut().find(|r| Self::key_of(r, pk_columns) == key) {
                        for (name, value) in &row {
                            if increment_columns.contains(name) {
                                let merged = existing.get(name).map(|prior| Self::numeric_sum(prior, value)).unwrap_or_else(|| value.clone());
                                existing.insert(name.clone(), merged);
                            } else {
                                existing.insert(name.clone(), value.clone());
                            }
                        }
                        outcome.rows_updated += 1;
                    } else {
                        outcome.rows_inserted += 1;
                        rows.push(row);
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn query(&self, _sql: &str) -> Result<TabularPayload, EtlError> {
        Ok(TabularPayload::empty())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, EtlError> {
        Ok(self.tables.lock().unwrap().contains_key(table))
    }

    async fn close(&self) {}
}

/// Replays a fixed script of per-call responses, one per `extract` call for
/// a given table, so a test can simulate the same table's payload changing
/// between two runs.
struct ScriptedExtractor {
    responses: Mutex<HashMap<String, Vec<TabularPayload>>>,
}

impl ScriptedExtractor {
    fn new(responses: HashMap<&'static str, Vec<TabularPayload>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
        }
    }
}

#[async_trait]
impl PlatformExtractor for ScriptedExtractor {
    async fn extract(&self, table: &str, _date_range: DateRange, _driver_keys: &DriverKeys) -> Result<TabularPayload, EtlError> {
        let mut responses = self.responses.lock().unwrap();
        let queue = responses.get_mut(table).ok_or_else(|| EtlError::Data(format!("no scripted response for table '{table}'")))?;
        if queue.is_empty() {
            return Err(EtlError::Data(format!("scripted responses exhausted for table '{table}'")));
        }
        Ok(queue.remove(0))
    }
}

fn insights_row(campaign_id: &str, date: &str, impressions: i64, clicks: i64) -> TabularPayload {
    TabularPayload::new(vec![
        Column::new("campaign_id", vec![Value::Text(campaign_id.into())]),
        Column::new("date", vec![Value::Text(date.into())]),
        Column::new("impressions", vec![Value::Integer(impressions)]),
        Column::new("clicks", vec![Value::Integer(clicks)]),
    ])
    .unwrap()
}

fn insights_table(load_mode: LoadMode, increment_columns: Vec<&str>) -> TableConfig {
    TableConfig {
        name: "insights".into(),
        processing: vec![],
        load_mode,
        pk_columns: vec!["campaign_id".into()],
        increment_columns: increment_columns.into_iter().map(String::from).collect(),
        test_mode_suffix: false,
        depends_on_table: None,
        stop_on_failure: false,
    }
}

fn single_table_catalog(platform: &str, table: TableConfig) -> PlatformCatalog {
    PlatformCatalog {
        config: PlatformConfig {
            name: platform.into(),
            enabled: true,
            priority: 0,
            timeout_seconds: 60,
            depends_on: vec![],
            retry: RetryPolicy::default(),
            tables: vec![table],
        },
        driver_key_columns: HashMap::new(),
        test_mode_suffix: "_test".into(),
    }
}

fn run_options() -> RunOptions {
    RunOptions {
        date_range: DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2026, 7, 26).unwrap(),
        )
        .unwrap(),
        dry_run: false,
        test_mode: false,
        tables: None,
    }
}

#[tokio::test]
async fn increment_mode_accumulates_across_two_runs_instead_of_overwriting() {
    // Different dates on purpose: increment mode keys on the entity alone, so
    // the second day's run must still accumulate onto the same warehouse row
    // rather than starting a fresh one (pk_columns carries no date column).
    let table = insights_table(LoadMode::Increment, vec!["impressions", "clicks"]);
    let catalog = single_table_catalog("linkedin", table);
    let extractor = ScriptedExtractor::new(HashMap::from([(
        "insights",
        vec![insights_row("c1", "2026-07-01", 100, 10), insights_row("c1", "2026-07-02", 50, 5)],
    )]));
    let warehouse = Arc::new(FakeWarehouse::new());
    let mut registry = StepRegistry::new();
    register_builtin_steps(&mut registry);
    let pipeline = GenericPlatformPipeline::new(catalog, extractor, warehouse.clone(), registry);

    pipeline.run(&run_options()).await.unwrap();
    pipeline.run(&run_options()).await.unwrap();

    let rows = warehouse.rows_of("insights");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["impressions"], Value::Integer(150));
    assert_eq!(rows[0]["clicks"], Value::Integer(15));
}

#[tokio::test]
async fn upsert_mode_overwrites_rather_than_accumulates() {
    let table = TableConfig {
        name: "campaign".into(),
        processing: vec![],
        load_mode: LoadMode::Upsert,
        pk_columns: vec!["id".into()],
        increment_columns: vec![],
        test_mode_suffix: false,
        depends_on_table: None,
        stop_on_failure: false,
    };
    let catalog = single_table_catalog("linkedin", table);
    let first = TabularPayload::new(vec![
        Column::new("id", vec![Value::Text("c1".into())]),
        Column::new("name", vec![Value::Text("spring sale".into())]),
    ])
    .unwrap();
    let second = TabularPayload::new(vec![
        Column::new("id", vec![Value::Text("c1".into())]),
        Column::new("name", vec![Value::Text("spring sale (renamed)".into())]),
    ])
    .unwrap();
    let extractor = ScriptedExtractor::new(HashMap::from([("campaign", vec![first, second])]));
    let warehouse = Arc::new(FakeWarehouse::new());
    let mut registry = StepRegistry::new();
    register_builtin_steps(&mut registry);
    let pipeline = GenericPlatformPipeline::new(catalog, extractor, warehouse.clone(), registry);

    pipeline.run(&run_options()).await.unwrap();
    pipeline.run(&run_options()).await.unwrap();

    let rows = warehouse.rows_of("campaign");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], Value::Text("spring sale (renamed)".into()));
}

#[tokio::test]
async fn append_with_declared_pk_drops_rows_already_loaded() {
    let table = TableConfig {
        name: "creative".into(),
        processing: vec![],
        load_mode: LoadMode::Append,
        pk_columns: vec!["id".into()],
        increment_columns: vec![],
        test_mode_suffix: false,
        depends_on_table: None,
        stop_on_failure: false,
    };
    let catalog = single_table_catalog("linkedin", table);
    let first = TabularPayload::new(vec![Column::new("id", vec![Value::Text("cr1".into()), Value::Text("cr2".into())])]).unwrap();
    let second = TabularPayload::new(vec![Column::new("id", vec![Value::Text("cr2".into()), Value::Text("cr3".into())])]).unwrap();
    let extractor = ScriptedExtractor::new(HashMap::from([("creative", vec![first, second])]));
    let warehouse = Arc::new(FakeWarehouse::new());
    let mut registry = StepRegistry::new();
    register_builtin_steps(&mut registry);
    let pipeline = GenericPlatformPipeline::new(catalog, extractor, warehouse.clone(), registry);

    pipeline.run(&run_options()).await.unwrap();
    pipeline.run(&run_options()).await.unwrap();

    let rows = warehouse.rows_of("creative");
    assert_eq!(rows.len(), 3, "cr2 reappearing in the second run must not be duplicated");
}

#[tokio::test]
async fn a_platform_continues_past_a_table_that_is_not_marked_stop_on_failure() {
    let campaign = TableConfig {
        name: "campaign".into(),
        processing: vec![],
        load_mode: LoadMode::Upsert,
        pk_columns: vec!["id".into()],
        increment_columns: vec![],
        test_mode_suffix: false,
        depends_on_table: None,
        stop_on_failure: true,
    };
    let insights = insights_table(LoadMode::Increment, vec!["impressions", "clicks"]);
    let catalog = PlatformCatalog {
        config: PlatformConfig {
            name: "linkedin".into(),
            enabled: true,
            priority: 0,
            timeout_seconds: 60,
            depends_on: vec![],
            retry: RetryPolicy::default(),
            tables: vec![campaign, insights],
        },
        driver_key_columns: HashMap::from([("campaign".to_string(), "id".to_string())]),
        test_mode_suffix: "_test".into(),
    };
    let campaign_payload = TabularPayload::new(vec![Column::new("id", vec![Value::Text("c1".into())])]).unwrap();
    let insights_payload = insights_row("c1", "2026-07-01", 10, 1);
    let extractor = ScriptedExtractor::new(HashMap::from([("campaign", vec![campaign_payload]), ("insights", vec![insights_payload])]));
    let warehouse = Arc::new(FakeWarehouse::failing_on(["insights"]));
    let mut registry = StepRegistry::new();
    register_builtin_steps(&mut registry);
    let pipeline = GenericPlatformPipeline::new(catalog, extractor, warehouse.clone(), registry);

    let report = pipeline.run(&run_options()).await.unwrap();
    assert_eq!(report.tables.len(), 1, "only campaign's load should have succeeded");
    assert_eq!(report.tables[0].table, "campaign");
    assert!(warehouse.rows_of("campaign").len() == 1);
    assert!(warehouse.rows_of("insights").is_empty());
}

#[tokio::test]
async fn orchestrator_skips_dependents_of_a_platform_whose_load_fails() {
    let campaign = TableConfig {
        name: "campaign".into(),
        processing: vec![],
        load_mode: LoadMode::Upsert,
        pk_columns: vec!["id".into()],
        increment_columns: vec![],
        test_mode_suffix: false,
        depends_on_table: None,
        stop_on_failure: true,
    };
    let linkedin_catalog = PlatformCatalog {
        config: PlatformConfig {
            name: "linkedin".into(),
            enabled: true,
            priority: 0,
            timeout_seconds: 60,
            depends_on: vec![],
            retry: RetryPolicy { max_attempts: 1, backoff_seconds: 0, backoff_multiplier: 1.0, max_backoff_seconds: 1 },
            tables: vec![campaign],
        },
        driver_key_columns: HashMap::new(),
        test_mode_suffix: "_test".into(),
    };
    let mixed_media_catalog = PlatformCatalog {
        config: PlatformConfig {
            name: "mixed_media".into(),
            enabled: true,
            priority: 0,
            timeout_seconds: 60,
            depends_on: vec!["linkedin".into()],
            retry: RetryPolicy::default(),
            tables: vec![],
        },
        driver_key_columns: HashMap::new(),
        test_mode_suffix: "_test".into(),
    };

    let platforms = vec![linkedin_catalog.config.clone(), mixed_media_catalog.config.clone()];

    let failing_warehouse = Arc::new(FakeWarehouse::failing_on(["campaign"]));
    let linkedin_extractor = ScriptedExtractor::new(HashMap::from([(
        "campaign",
        vec![TabularPayload::new(vec![Column::new("id", vec![Value::Text("c1".into())])]).unwrap()],
    )]));
    let linkedin_pipeline: Arc<dyn PlatformPipeline> =
        Arc::new(GenericPlatformPipeline::new(linkedin_catalog, linkedin_extractor, failing_warehouse, {
            let mut r = StepRegistry::new();
            register_builtin_steps(&mut r);
            r
        }));

    let mixed_media_warehouse = Arc::new(FakeWarehouse::new());
    let mixed_media_extractor = ScriptedExtractor::new(HashMap::new());
    let mixed_media_pipeline: Arc<dyn PlatformPipeline> =
        Arc::new(GenericPlatformPipeline::new(mixed_media_catalog, mixed_media_extractor, mixed_media_warehouse, {
            let mut r = StepRegistry::new();
            register_builtin_steps(&mut r);
            r
        }));

    let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
    pipelines.insert("linkedin".into(), linkedin_pipeline);
    pipelines.insert("mixed_media".into(), mixed_media_pipeline);

    let orchestrator = Orchestrator::new(platforms, pipelines, OrchestratorPolicy { max_parallel: 2, ..OrchestratorPolicy::default() }, ShutdownCoordinator::default().token());
    let summary = orchestrator.run_all(run_options(), None).await.unwrap();

    assert_eq!(summary.failed, vec!["linkedin".to_string()]);
    assert_eq!(summary.skipped, vec!["mixed_media".to_string()]);
    assert!(summary.is_total_failure());
}

/// A platform pipeline that just records its own name into a shared log when
/// it runs, used to observe scheduling order without depending on timing.
struct RecordingPlatform {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PlatformPipeline for RecordingPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _options: &RunOptions) -> Result<etl_pipeline::application::services::PlatformRunReport, EtlError> {
        self.log.lock().unwrap().push(self.name.clone());
        Ok(Default::default())
    }
}

fn platform_config(name: &str, depends_on: Vec<&str>) -> PlatformConfig {
    PlatformConfig {
        name: name.into(),
        enabled: true,
        priority: 0,
        timeout_seconds: 60,
        depends_on: depends_on.into_iter().map(String::from).collect(),
        retry: RetryPolicy::default(),
        tables: vec![],
    }
}

#[tokio::test]
async fn a_dependent_platform_waits_for_its_whole_group_before_starting() {
    // M, L independent; F independent; G depends on M. Group 0 = {M, L},
    // group 1 = {F, G}: G must never start before M has finished, even
    // though it doesn't depend on L or F.
    let platforms = vec![
        platform_config("m", vec![]),
        platform_config("l", vec![]),
        platform_config("f", vec![]),
        platform_config("g", vec!["m"]),
    ];
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
    for name in ["m", "l", "f", "g"] {
        pipelines.insert(name.into(), Arc::new(RecordingPlatform { name: name.into(), log: log.clone() }));
    }

    let orchestrator = Orchestrator::new(platforms, pipelines, OrchestratorPolicy { max_parallel: 2, ..OrchestratorPolicy::default() }, ShutdownCoordinator::default().token());
    let summary = orchestrator.run_all(run_options(), None).await.unwrap();

    assert!(summary.is_success());
    let order = log.lock().unwrap().clone();
    let m_index = order.iter().position(|p| p == "m").unwrap();
    let g_index = order.iter().position(|p| p == "g").unwrap();
    assert!(m_index < g_index, "g ran before its dependency m: {order:?}");
}

/// Fails a fixed number of calls with a retryable transport error, then
/// succeeds — the same shape as the orchestrator's own retry-until-success
/// coverage, exercised here through the public `run_all` entry point.
struct FlakyPlatform {
    name: String,
    failures_before_success: u32,
    calls: AtomicU32,
}

#[async_trait]
impl PlatformPipeline for FlakyPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _options: &RunOptions) -> Result<etl_pipeline::application::services::PlatformRunReport, EtlError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            Err(EtlError::Transport(etl_domain::TransportError::Timeout("slow upstream".into())))
        } else {
            Ok(Default::default())
        }
    }
}

#[tokio::test]
async fn a_platform_that_fails_twice_then_succeeds_completes_within_its_retry_budget() {
    let mut config = platform_config("linkedin", vec![]);
    config.retry = RetryPolicy { max_attempts: 3, backoff_seconds: 0, backoff_multiplier: 2.0, max_backoff_seconds: 1 };
    let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
    pipelines.insert(
        "linkedin".into(),
        Arc::new(FlakyPlatform { name: "linkedin".into(), failures_before_success: 2, calls: AtomicU32::new(0) }),
    );

    let orchestrator = Orchestrator::new(vec![config], pipelines, OrchestratorPolicy { max_parallel: 2, ..OrchestratorPolicy::default() }, ShutdownCoordinator::default().token());
    let summary = orchestrator.run_all(run_options(), None).await.unwrap();

    assert_eq!(summary.completed, vec!["linkedin".to_string()]);
    assert!(summary.failed.is_empty());
}
