// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Configuration loading: orchestrator settings and per-platform table
//! configuration, both validated before any platform runs.

pub mod config_service;

pub use config_service::{load_orchestrator_config, load_platform_configs, OrchestratorConfig};
