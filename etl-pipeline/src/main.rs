// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process entry point: parses and validates CLI arguments, wires the
//! orchestrator's dependencies, dispatches to the requested use case, and
//! maps the outcome to a process exit code.

use etl_bootstrap::cli::ValidatedCommand;
use etl_bootstrap::shutdown::ShutdownCoordinator;
use etl_bootstrap::signals::create_signal_handler;
use etl_bootstrap::ExitCode;
use etl_domain::{DateRange, EtlError};
use etl_pipeline::application::services::{register_builtin_steps, Orchestrator, OrchestratorPolicy, PlatformPipeline, StepRegistry};
use etl_pipeline::application::use_cases::{ExportReportUseCase, RunAllUseCase, RunOneUseCase};
use etl_pipeline::infrastructure::adapters::{builtin_catalog, GenericPlatformPipeline, PostgresWarehouseSink, UnimplementedExtractor};
use etl_pipeline::infrastructure::config::{load_orchestrator_config, load_platform_configs};
use etl_pipeline::infrastructure::logging::{self, LogFormat};
use etl_pipeline::infrastructure::metrics::EtlMetrics;
use etl_pipeline::infrastructure::runtime::{EtlResourceManager, ResourceConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const DEFAULT_ORCHESTRATOR_CONFIG: &str = "config/orchestrator.yaml";
const DEFAULT_PLATFORMS_DIR: &str = "config/platforms";

#[tokio::main]
async fn main() {
    let code = run().await.unwrap_or_else(|e| {
        eprintln!("fatal: {e}");
        ExitCode::Internal
    });
    std::process::exit(code.as_i32());
}

async fn run() -> Result<ExitCode, EtlError> {
    let cli = match etl_bootstrap::bootstrap_cli() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::ConfigError);
        }
    };

    logging::init(cli.verbose, LogFormat::Text);

    let resource_manager = EtlResourceManager::new(ResourceConfig::default());
    info!(
        cpu_tokens = resource_manager.available_cpu_tokens(),
        io_tokens = resource_manager.available_io_tokens(),
        "resource manager initialized"
    );

    let metrics = EtlMetrics::new()?;
    info!("metrics registry initialized");

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_ORCHESTRATOR_CONFIG));
    let platforms_dir = cli.platforms_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_PLATFORMS_DIR));

    let orchestrator_config = match load_orchestrator_config(&config_path).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load orchestrator config");
            return Ok(ExitCode::ConfigError);
        }
    };

    let mut registry = StepRegistry::new();
    register_builtin_steps(&mut registry);

    let platform_configs = match load_platform_configs(&platforms_dir, &registry).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to load platform configs");
            return Ok(ExitCode::ConfigError);
        }
    };

    let warehouse = match PostgresWarehouseSink::connect(&orchestrator_config.database_url, orchestrator_config.max_parallel as u32).await {
        Ok(w) => Arc::new(w),
        Err(e) => {
            error!(error = %e, "failed to connect to the warehouse");
            return Ok(ExitCode::ConfigError);
        }
    };

    let pipelines = match wire_pipelines(&platform_configs, registry, warehouse) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to wire platform pipelines");
            return Ok(ExitCode::ConfigError);
        }
    };

    let shutdown = ShutdownCoordinator::new(Duration::from_secs(orchestrator_config.shutdown_grace_period_secs));
    let signal_handler = create_signal_handler();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        signal_handler
            .wait_for_signal(Box::new(move || shutdown_for_signal.initiate_shutdown()))
            .await;
    });

    let policy = OrchestratorPolicy {
        max_parallel: orchestrator_config.max_parallel,
        continue_on_failure: orchestrator_config.continue_on_failure,
        parallel_execution: orchestrator_config.parallel_execution,
        global_timeout: Duration::from_secs(orchestrator_config.global_timeout_secs),
    };
    let orchestrator = Orchestrator::new(platform_configs, pipelines, policy, shutdown.token());

    let default_date_range = match default_date_range(orchestrator_config.default_lookback_days) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "invalid default_lookback_days");
            return Ok(ExitCode::ConfigError);
        }
    };

    let outcome = match cli.command {
        ValidatedCommand::RunAll { run } => {
            let use_case = RunAllUseCase::new(&orchestrator, default_date_range, orchestrator_config.parallel_groups.clone());
            use_case.execute(run).await
        }
        ValidatedCommand::RunOne { platform, tables, run } => {
            let use_case = RunOneUseCase::new(&orchestrator, default_date_range);
            use_case.execute(&platform, tables, run).await
        }
        ValidatedCommand::ExportReport { format, path } => {
            let use_case = ExportReportUseCase::new(orchestrator.monitor());
            return export_report_exit_code(use_case.execute(format, &path));
        }
    };

    if shutdown.is_shutting_down() {
        shutdown.complete_shutdown();
    }

    match outcome {
        Ok(summary) => {
            record_run_metrics(&metrics, &orchestrator);
            if summary.is_success() {
                info!(completed = summary.completed.len(), "run finished successfully");
                Ok(ExitCode::Success)
            } else if summary.is_total_failure() {
                error!(failed = summary.failed.len(), "every platform failed");
                Ok(ExitCode::TotalFailure)
            } else if !summary.cancelled.is_empty() {
                warn!(cancelled = summary.cancelled.len(), "run interrupted");
                Ok(ExitCode::Interrupted)
            } else if summary.is_partial_failure() {
                warn!(completed = summary.completed.len(), failed = summary.failed.len(), "run partially failed");
                Ok(ExitCode::PartialFailure)
            } else {
                Ok(ExitCode::Success)
            }
        }
        Err(e) => {
            error!(error = %e, "run aborted");
            Ok(ExitCode::Internal)
        }
    }
}

/// Reflects the finished run's per-platform/per-table outcome into the
/// metrics registry: rows loaded for each completed table, a platform
/// duration sample for each, and a failure count for each failed platform.
fn record_run_metrics(metrics: &EtlMetrics, orchestrator: &Orchestrator) {
    use etl_pipeline::application::services::PlatformRunState;

    for (platform, state) in orchestrator.monitor().snapshot() {
        match state {
            PlatformRunState::Completed { started_at, finished_at, tables, .. } => {
                let elapsed = (finished_at - started_at).num_milliseconds().max(0) as f64 / 1000.0;
                metrics.record_platform_duration(elapsed);
                for table in tables {
                    metrics.record_table_load(&platform, &table.table, &table.load_mode.to_string(), table.rows_inserted + table.rows_updated);
                }
            }
            _ => {}
        }
    }
}

fn export_report_exit_code(result: Result<(), EtlError>) -> Result<ExitCode, EtlError> {
    match result {
        Ok(()) => Ok(ExitCode::Success),
        Err(e) => {
            error!(error = %e, "failed to export report");
            Ok(ExitCode::Internal)
        }
    }
}

fn default_date_range(lookback_days: i64) -> Result<DateRange, EtlError> {
    DateRange::lookback(chrono::Utc::now().date_naive(), lookback_days)
}

/// Builds one [`GenericPlatformPipeline`] per loaded platform config, paired
/// with an [`UnimplementedExtractor`] — a deployment swaps this for a real
/// `PlatformExtractor` per platform.
fn wire_pipelines(
    platform_configs: &[etl_domain::PlatformConfig],
    registry: StepRegistry,
    warehouse: Arc<PostgresWarehouseSink>,
) -> Result<HashMap<String, Arc<dyn PlatformPipeline>>, EtlError> {
    let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();

    for platform_config in platform_configs {
        let mut catalog = builtin_catalog(&platform_config.name)
            .ok_or_else(|| EtlError::Config(format!("no built-in catalog for platform '{}'", platform_config.name)))?;
        catalog.config = platform_config.clone();

        let extractor = UnimplementedExtractor::new(platform_config.name.clone());
        let pipeline = GenericPlatformPipeline::new(catalog, extractor, warehouse.clone(), registry.clone());
        pipelines.insert(platform_config.name.clone(), Arc::new(pipeline));
    }

    Ok(pipelines)
}
