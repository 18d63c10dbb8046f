// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Loads and validates the two configuration documents the orchestrator
//! needs: the orchestrator-level YAML (warehouse connection, concurrency,
//! manual execution groups) and the per-platform table configuration
//! directory. Both are validated into strongly typed structs before any
//! platform runs — an unknown `load_mode`, an unreferenced processing step,
//! or a `depends_on` naming an undeclared platform all fail here, at
//! startup, rather than mid-run.

use crate::application::services::StepRegistry;
use etl_domain::{EtlError, PlatformConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Orchestrator-level settings: everything that isn't a per-platform table
/// declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub database_url: String,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: i64,
    /// Manual `parallel_groups` override, validated against every declared
    /// platform's `depends_on` at load time.
    #[serde(default)]
    pub parallel_groups: Option<Vec<Vec<String>>>,
    #[serde(default = "default_grace_period_secs")]
    pub shutdown_grace_period_secs: u64,
    /// If false, execute strictly sequentially regardless of the scheduler's
    /// execution groups.
    #[serde(default = "default_parallel_execution")]
    pub parallel_execution: bool,
    /// If false, a platform failure aborts the whole run; the remaining
    /// platforms are marked `skipped` rather than attempted.
    #[serde(default = "default_continue_on_failure")]
    pub continue_on_failure: bool,
    /// Wall-clock budget in seconds for the entire run. On expiry, in-flight
    /// platforms are cancelled and remaining platforms are marked `skipped`.
    #[serde(default = "default_global_timeout_secs")]
    pub global_timeout_secs: u64,
}

fn default_max_parallel() -> usize {
    4
}

fn default_lookback_days() -> i64 {
    1
}

fn default_grace_period_secs() -> u64 {
    30
}

fn default_parallel_execution() -> bool {
    true
}

fn default_continue_on_failure() -> bool {
    true
}

fn default_global_timeout_secs() -> u64 {
    3600
}

/// Loads `orchestrator.yaml` layered with `ETL_WAREHOUSE__*` /
/// `ETL_ORCHESTRATOR__*` environment overrides (`config` crate double-
/// underscore nesting), matching the teacher's environment-override
/// pattern for its observability settings.
pub async fn load_orchestrator_config(path: &Path) -> Result<OrchestratorConfig, EtlError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()).required(true))
        .add_source(config::Environment::with_prefix("ETL_WAREHOUSE").separator("__"))
        .add_source(config::Environment::with_prefix("ETL_ORCHESTRATOR").separator("__"));

    let settings = builder.build().map_err(|e| EtlError::Config(format!("failed to load {}: {e}", path.display())))?;
    let config: OrchestratorConfig = settings.try_deserialize().map_err(|e| EtlError::Config(format!("invalid orchestrator config: {e}")))?;

    if config.max_parallel == 0 {
        return Err(EtlError::Config("max_parallel must be at least 1".into()));
    }
    debug!(database_url_set = !config.database_url.is_empty(), max_parallel = config.max_parallel, "loaded orchestrator config");
    Ok(config)
}

/// Loads every `*.yaml`/`*.yml` file in `dir` as one platform's table
/// configuration, then validates the whole set: every `depends_on` name
/// must resolve to a declared platform, every processing step name must be
/// registered, and every table's own invariants (pk/increment columns) must
/// hold.
pub async fn load_platform_configs(dir: &Path, registry: &StepRegistry) -> Result<Vec<PlatformConfig>, EtlError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| EtlError::Config(format!("cannot read platform config directory {}: {e}", dir.display())))?;

    let mut platforms = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| EtlError::Config(e.to_string()))? {
        let path = entry.path();
        let is_yaml = path.extension().and_then(|e| e.to_str()).map(|e| e == "yaml" || e == "yml").unwrap_or(false);
        if !is_yaml {
            continue;
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| EtlError::Config(format!("cannot read {}: {e}", path.display())))?;
        let platform: PlatformConfig =
            serde_yaml::from_str(&content).map_err(|e| EtlError::Config(format!("invalid platform config {}: {e}", path.display())))?;
        platforms.push(platform);
    }

    validate_platforms(&platforms, registry)?;
    Ok(platforms)
}

fn validate_platforms(platforms: &[PlatformConfig], registry: &StepRegistry) -> Result<(), EtlError> {
    let names: std::collections::HashSet<&str> = platforms.iter().map(|p| p.name.as_str()).collect();

    for platform in platforms {
        platform.validate()?;
        for dep in &platform.depends_on {
            if !names.contains(dep.as_str()) {
                return Err(EtlError::Config(format!(
                    "platform '{}' depends on undeclared platform '{}'",
                    platform.name, dep
                )));
            }
        }
        for table in &platform.tables {
            for step in &table.processing {
                if !registry.contains(&step.step_name) {
                    return Err(EtlError::Config(format!(
                        "platform '{}' table '{}' references unknown processing step '{}'",
                        platform.name, table.name, step.step_name
                    )));
                }
            }
            if let Some(dep) = &table.depends_on_table {
                if platform.table(dep).is_none() {
                    return Err(EtlError::Config(format!(
                        "platform '{}' table '{}' depends on undeclared table '{}'",
                        platform.name, table.name, dep
                    )));
                }
            }
        }
    }

    if let Some(duplicate) = first_duplicate(platforms.iter().map(|p| p.name.as_str())) {
        return Err(EtlError::Config(format!("duplicate platform name '{duplicate}'")));
    }

    for platform in platforms {
        if !platform.enabled {
            warn!(platform = platform.name.as_str(), "platform declared but disabled");
        }
    }

    Ok(())
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Some(name);
        }
    }
    None
}
