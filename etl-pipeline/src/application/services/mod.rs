// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application services: the processing pipeline/step registry, the
//! scheduler, the orchestrator, and the execution monitor it reports
//! through.

pub mod execution_monitor;
pub mod orchestrator;
pub mod processing_pipeline;
pub mod scheduler;
pub mod steps;

pub use execution_monitor::{ExecutionMonitor, PlatformRunState, TableRunResult};
pub use orchestrator::{Orchestrator, OrchestratorPolicy, PlatformPipeline, PlatformRunReport, RunOptions, RunSummary};
pub use processing_pipeline::{Pipeline, ProcessingStep, StepRegistry};
pub use scheduler::{build_groups, can_execute};
pub use steps::register_builtin_steps;
