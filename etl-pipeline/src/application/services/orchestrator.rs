// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The orchestrator: fans a run out across the scheduler's execution groups,
//! bounded by a semaphore, retrying transient platform failures and skipping
//! dependents of a platform that fails or is skipped itself.
//!
//! Concurrency model: one [`tokio::task::JoinSet`] per execution group, a
//! [`Semaphore`] sized to `max_parallel` shared across the whole run, and the
//! bootstrap crate's [`CancellationToken`] for Ctrl-C/global-timeout
//! propagation. Within a group every platform's dependencies are already
//! complete, so the group itself fans out with no further ordering.

use super::execution_monitor::{ExecutionMonitor, PlatformRunState, TableRunResult};
use super::scheduler::build_groups;
use async_trait::async_trait;
use chrono::Utc;
use etl_bootstrap::shutdown::CancellationToken;
use etl_domain::{DateRange, EtlError, PlatformConfig, TransportError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Options that parameterize one orchestrator run, derived from the
/// validated CLI arguments.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub date_range: DateRange,
    pub dry_run: bool,
    pub test_mode: bool,
    /// Restricts a `run-one` invocation to these logical tables; `None` runs
    /// every table the platform declares.
    pub tables: Option<Vec<String>>,
}

/// Report of one platform run, produced by a [`PlatformPipeline`].
#[derive(Debug, Clone, Default)]
pub struct PlatformRunReport {
    pub tables: Vec<TableRunResult>,
}

/// The application-level seam to a concrete platform pipeline
/// (`GenericPlatformPipeline<E>` in the infrastructure layer, or a fake in
/// tests). The orchestrator only ever calls `run`; everything about how a
/// platform extracts, transforms, and loads its tables is the pipeline's own
/// concern.
#[async_trait]
pub trait PlatformPipeline: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, options: &RunOptions) -> Result<PlatformRunReport, EtlError>;
}

/// The orchestrator-wide knobs that shape `run_groups`, distinct from
/// `RunOptions` (which parameterizes a single invocation): how many
/// platforms may run at once, whether a failure aborts the whole run, and
/// how long the whole run may take.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorPolicy {
    pub max_parallel: usize,
    pub continue_on_failure: bool,
    pub parallel_execution: bool,
    pub global_timeout: Duration,
}

impl Default for OrchestratorPolicy {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            continue_on_failure: true,
            parallel_execution: true,
            global_timeout: Duration::from_secs(3600),
        }
    }
}

/// Coordinates a run of every enabled platform (or a single platform, for
/// `run-one`) under the scheduler's execution groups.
pub struct Orchestrator {
    platforms: Vec<PlatformConfig>,
    pipelines: HashMap<String, Arc<dyn PlatformPipeline>>,
    monitor: ExecutionMonitor,
    policy: OrchestratorPolicy,
    shutdown: CancellationToken,
}

/// Aggregate outcome of a run, used to compute the process exit code.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub cancelled: Vec<String>,
}

impl RunSummary {
    pub fn is_total_failure(&self) -> bool {
        self.completed.is_empty() && !self.failed.is_empty()
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty() && !self.completed.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }
}

impl Orchestrator {
    pub fn new(
        platforms: Vec<PlatformConfig>,
        pipelines: HashMap<String, Arc<dyn PlatformPipeline>>,
        policy: OrchestratorPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        let monitor = ExecutionMonitor::new(platforms.iter().map(|p| p.name.clone()));
        Self { platforms, pipelines, monitor, policy, shutdown }
    }

    pub fn monitor(&self) -> &ExecutionMonitor {
        &self.monitor
    }

    /// Runs every enabled platform, honoring `manual_groups` if the caller
    /// supplied one at config-load time (already validated against the
    /// depends_on graph by the scheduler).
    pub async fn run_all(&self, options: RunOptions, manual_groups: Option<&[Vec<String>]>) -> Result<RunSummary, EtlError> {
        let enabled: Vec<PlatformConfig> = self.platforms.iter().filter(|p| p.enabled).cloned().collect();
        let groups = build_groups(&enabled, manual_groups)?;
        self.run_groups(&groups, &options).await
    }

    /// Runs a single named platform, ignoring its declared dependencies
    /// entirely (the CLI contract for `run-one`).
    pub async fn run_one(&self, platform: &str, options: RunOptions) -> Result<RunSummary, EtlError> {
        if !self.pipelines.contains_key(platform) {
            return Err(EtlError::Config(format!("unknown platform: {platform}")));
        }
        self.run_groups(&[vec![platform.to_string()]], &options).await
    }

    async fn run_groups(&self, groups: &[Vec<String>], options: &RunOptions) -> Result<RunSummary, EtlError> {
        self.monitor.mark_run_started(Utc::now());
        let result = self.run_groups_inner(groups, options).await;
        self.monitor.mark_run_finished(Utc::now());
        result
    }

    async fn run_groups_inner(&self, groups: &[Vec<String>], options: &RunOptions) -> Result<RunSummary, EtlError> {
        let semaphore = Arc::new(Semaphore::new(self.policy.max_parallel.max(1)));
        let mut blocked: HashSet<String> = HashSet::new();

        // `parallel_execution=false` means strictly sequential regardless of
        // the scheduler's groups: flatten every group into its own singleton
        // group so no two platforms are ever in flight together.
        let flattened: Vec<Vec<String>>;
        let effective_groups: &[Vec<String>] = if self.policy.parallel_execution {
            groups
        } else {
            flattened = groups.iter().flatten().cloned().map(|name| vec![name]).collect();
            &flattened
        };

        let shutdown_for_timeout = self.shutdown.clone();
        let global_timeout = self.policy.global_timeout;
        let timeout_guard = tokio::spawn(async move {
            tokio::time::sleep(global_timeout).await;
            warn!(seconds = global_timeout.as_secs(), "global_timeout elapsed, initiating shutdown");
            shutdown_for_timeout.initiate_shutdown();
        });

        'groups: for group in effective_groups {
            if self.shutdown.is_cancelled() {
                for name in group {
                    self.monitor.mark_cancelled(name, None);
                }
                continue;
            }

            let mut runnable = Vec::new();
            for name in group {
                let deps_blocked = self
                    .platforms
                    .iter()
                    .find(|p| &p.name == name)
                    .map(|p| p.depends_on.iter().any(|d| blocked.contains(d)))
                    .unwrap_or(false);
                if deps_blocked {
                    let reason = "a dependency failed or was skipped".to_string();
                    warn!(platform = name.as_str(), "skipping: {reason}");
                    self.monitor.mark_skipped(name, reason);
                    blocked.insert(name.clone());
                } else {
                    runnable.push(name.clone());
                }
            }

            let mut joins: JoinSet<(String, chrono::DateTime<Utc>, AttemptOutcome)> = JoinSet::new();
            for name in runnable {
                let Some(pipeline) = self.pipelines.get(&name).cloned() else {
                    self.monitor.mark_skipped(&name, "no pipeline registered for this platform".into());
                    blocked.insert(name);
                    continue;
                };
                let retry = self.platforms.iter().find(|p| p.name == name).map(|p| p.retry).unwrap_or_default();
                let timeout_seconds = self.platforms.iter().find(|p| p.name == name).map(|p| p.timeout_seconds).unwrap_or(60);
                let options = options.clone();
                let permit = semaphore.clone();
                let token = self.shutdown.clone();
                let started_at = Utc::now();
                self.monitor.mark_running(&name, started_at);
                joins.spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                    let outcome = run_with_retry(pipeline.as_ref(), &options, retry, timeout_seconds, &token).await;
                    (name, started_at, outcome)
                });
            }

            let mut failed_this_group = false;
            while let Some(joined) = joins.join_next().await {
                let (name, started_at, outcome) = joined.map_err(|e| EtlError::Fatal(format!("platform task panicked: {e}")))?;
                match outcome.result {
                    Ok(report) => {
                        info!(platform = name.as_str(), tables = report.tables.len(), attempts = outcome.attempts, "platform completed");
                        self.monitor.mark_completed(&name, started_at, Utc::now(), report.tables, outcome.attempts);
                    }
                    Err(EtlError::Fatal(msg)) if self.shutdown.is_cancelled() => {
                        debug!(platform = name.as_str(), "cancelled: {msg}");
                        self.monitor.mark_cancelled(&name, Some(started_at));
                    }
                    Err(e) => {
                        error!(platform = name.as_str(), error = %e, attempts = outcome.attempts, "platform failed");
                        self.monitor.mark_failed(&name, started_at, Utc::now(), e.to_string(), outcome.attempts);
                        blocked.insert(name);
                        failed_this_group = true;
                    }
                }
            }

            if failed_this_group && !self.policy.continue_on_failure {
                let reason = "orchestrator stopped: continue_on_failure is false and a prior platform failed".to_string();
                for platform in &self.platforms {
                    if matches!(self.monitor.state(&platform.name), Some(PlatformRunState::Pending)) {
                        self.monitor.mark_skipped(&platform.name, reason.clone());
                    }
                }
                break 'groups;
            }
        }

        timeout_guard.abort();
        Ok(self.summarize())
    }

    fn summarize(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for (name, state) in self.monitor.snapshot() {
            match state {
                PlatformRunState::Completed { .. } => summary.completed.push(name),
                PlatformRunState::Failed { .. } => summary.failed.push(name),
                PlatformRunState::Skipped { .. } => summary.skipped.push(name),
                PlatformRunState::Cancelled { .. } => summary.cancelled.push(name),
                PlatformRunState::Pending | PlatformRunState::Running { .. } => {}
            }
        }
        summary
    }
}

/// The outcome of `run_with_retry`: the final result, plus how many attempts
/// it took (1 on first-try success or a non-retryable first failure).
/// `retry_count` (attempts - 1) is what the exported report shows.
struct AttemptOutcome {
    result: Result<PlatformRunReport, EtlError>,
    attempts: u32,
}

/// Retries a platform run per its `RetryPolicy`, honoring a server-supplied
/// `Retry-After` hint over the computed backoff when present, bounding each
/// attempt by the platform's own `timeout_seconds`, and bailing out early on
/// cancellation between attempts.
async fn run_with_retry(
    pipeline: &dyn PlatformPipeline,
    options: &RunOptions,
    retry: etl_domain::RetryPolicy,
    timeout_seconds: u64,
    token: &CancellationToken,
) -> AttemptOutcome {
    let mut attempt = 1;
    loop {
        if token.is_cancelled() {
            return AttemptOutcome { result: Err(EtlError::Fatal("run cancelled".into())), attempts: attempt };
        }
        let attempt_result = match tokio::time::timeout(Duration::from_secs(timeout_seconds), pipeline.run(options)).await {
            Ok(result) => result,
            Err(_) => Err(EtlError::Transport(TransportError::Timeout(format!(
                "platform '{}' exceeded its {timeout_seconds}s timeout",
                pipeline.name()
            )))),
        };
        match attempt_result {
            Ok(report) => return AttemptOutcome { result: Ok(report), attempts: attempt },
            Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                let delay = e.retry_after().unwrap_or_else(|| retry.delay_before_attempt(attempt + 1));
                warn!(
                    platform = pipeline.name(),
                    attempt,
                    delay_secs = delay.as_secs(),
                    "transient failure, retrying: {e}"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => return AttemptOutcome {
                        result: Err(EtlError::Fatal("run cancelled during backoff".into())),
                        attempts: attempt,
                    },
                }
                attempt += 1;
            }
            Err(e) => return AttemptOutcome { result: Err(e), attempts: attempt },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_bootstrap::shutdown::ShutdownCoordinator;
    use etl_domain::RetryPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn test_token() -> CancellationToken {
        ShutdownCoordinator::default().token()
    }

    fn test_policy() -> OrchestratorPolicy {
        OrchestratorPolicy { max_parallel: 2, ..OrchestratorPolicy::default() }
    }

    struct FlakyPipeline {
        name: String,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PlatformPipeline for FlakyPipeline {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _options: &RunOptions) -> Result<PlatformRunReport, EtlError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(EtlError::Transport(etl_domain::TransportError::Timeout("slow".into())))
            } else {
                Ok(PlatformRunReport::default())
            }
        }
    }

    struct AlwaysFails {
        name: String,
    }

    #[async_trait]
    impl PlatformPipeline for AlwaysFails {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _options: &RunOptions) -> Result<PlatformRunReport, EtlError> {
            Err(EtlError::Data("bad payload".into()))
        }
    }

    struct RecordingPipeline {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PlatformPipeline for RecordingPipeline {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _options: &RunOptions) -> Result<PlatformRunReport, EtlError> {
            self.seen.lock().unwrap().push(self.name.clone());
            Ok(PlatformRunReport::default())
        }
    }

    fn platform(name: &str, depends_on: Vec<&str>) -> PlatformConfig {
        PlatformConfig {
            name: name.into(),
            enabled: true,
            priority: 0,
            timeout_seconds: 60,
            depends_on: depends_on.into_iter().map(String::from).collect(),
            retry: RetryPolicy { max_attempts: 3, backoff_seconds: 0, backoff_multiplier: 1.0, max_backoff_seconds: 1 },
            tables: vec![],
        }
    }

    struct SlowPipeline {
        name: String,
        sleep_for: Duration,
    }

    #[async_trait]
    impl PlatformPipeline for SlowPipeline {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _options: &RunOptions) -> Result<PlatformRunReport, EtlError> {
            tokio::time::sleep(self.sleep_for).await;
            Ok(PlatformRunReport::default())
        }
    }

    fn options() -> RunOptions {
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
    async fn transient_failures_are_retried_until_success() {
        let platforms = vec![platform("linkedin", vec![])];
        let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
        pipelines.insert(
            "linkedin".into(),
            Arc::new(FlakyPipeline { name: "linkedin".into(), failures_before_success: 2, calls: AtomicU32::new(0) }),
        );
        let orchestrator = Orchestrator::new(platforms, pipelines, test_policy(), test_token());
        let summary = orchestrator.run_all(options(), None).await.unwrap();
        assert_eq!(summary.completed, vec!["linkedin".to_string()]);
    }

    #[tokio::test]
    async fn a_failed_platform_skips_its_dependents_but_not_independents() {
        let platforms = vec![platform("linkedin", vec![]), platform("insights_dependent", vec!["linkedin"]), platform("facebook", vec![])];
        let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
        pipelines.insert("linkedin".into(), Arc::new(AlwaysFails { name: "linkedin".into() }));
        pipelines.insert("insights_dependent".into(), Arc::new(AlwaysFails { name: "insights_dependent".into() }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        pipelines.insert("facebook".into(), Arc::new(RecordingPipeline { name: "facebook".into(), seen: seen.clone() }));

        let orchestrator = Orchestrator::new(platforms, pipelines, test_policy(), test_token());
        let summary = orchestrator.run_all(options(), None).await.unwrap();

        assert_eq!(summary.failed, vec!["linkedin".to_string()]);
        assert_eq!(summary.skipped, vec!["insights_dependent".to_string()]);
        assert_eq!(summary.completed, vec!["facebook".to_string()]);
        assert!(summary.is_partial_failure());
    }

    #[tokio::test]
    async fn run_one_ignores_declared_dependencies() {
        let platforms = vec![platform("linkedin", vec![]), platform("insights_dependent", vec!["linkedin"])];
        let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
        pipelines.insert("linkedin".into(), Arc::new(AlwaysFails { name: "linkedin".into() }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        pipelines.insert(
            "insights_dependent".into(),
            Arc::new(RecordingPipeline { name: "insights_dependent".into(), seen: seen.clone() }),
        );

        let orchestrator = Orchestrator::new(platforms, pipelines, test_policy(), test_token());
        let summary = orchestrator.run_one("insights_dependent", options()).await.unwrap();
        assert_eq!(summary.completed, vec!["insights_dependent".to_string()]);
    }

    #[tokio::test]
    async fn continue_on_failure_false_aborts_the_whole_run_on_first_failure() {
        let platforms = vec![platform("linkedin", vec![]), platform("facebook", vec![])];
        let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
        pipelines.insert("linkedin".into(), Arc::new(AlwaysFails { name: "linkedin".into() }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        pipelines.insert("facebook".into(), Arc::new(RecordingPipeline { name: "facebook".into(), seen: seen.clone() }));

        // Two singleton groups (no depends_on relation) so `linkedin` fails
        // in the first group before `facebook`'s group is ever reached.
        let policy = OrchestratorPolicy { continue_on_failure: false, ..test_policy() };
        let orchestrator = Orchestrator::new(platforms, pipelines, policy, test_token());
        let summary = orchestrator.run_all(options(), Some(&[vec!["linkedin".into()], vec!["facebook".into()]])).await.unwrap();

        assert_eq!(summary.failed, vec!["linkedin".to_string()]);
        assert_eq!(summary.skipped, vec!["facebook".to_string()]);
        assert!(seen.lock().unwrap().is_empty(), "facebook must never have run");
    }

    #[tokio::test]
    async fn parallel_execution_false_forces_strictly_sequential_runs() {
        let platforms = vec![platform("linkedin", vec![]), platform("facebook", vec![])];
        let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        pipelines.insert("linkedin".into(), Arc::new(RecordingPipeline { name: "linkedin".into(), seen: seen.clone() }));
        pipelines.insert("facebook".into(), Arc::new(RecordingPipeline { name: "facebook".into(), seen: seen.clone() }));

        // A single group containing both platforms would normally run them
        // concurrently; parallel_execution=false must flatten it regardless.
        let policy = OrchestratorPolicy { parallel_execution: false, ..test_policy() };
        let orchestrator = Orchestrator::new(platforms, pipelines, policy, test_token());
        let summary = orchestrator.run_all(options(), Some(&[vec!["linkedin".into(), "facebook".into()]])).await.unwrap();

        assert_eq!(summary.completed.len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn a_platform_exceeding_its_timeout_is_treated_as_a_retryable_failure() {
        let mut slow_platform = platform("linkedin", vec![]);
        slow_platform.timeout_seconds = 0;
        slow_platform.retry = RetryPolicy { max_attempts: 1, backoff_seconds: 0, backoff_multiplier: 1.0, max_backoff_seconds: 1 };
        let mut pipelines: HashMap<String, Arc<dyn PlatformPipeline>> = HashMap::new();
        pipelines.insert("linkedin".into(), Arc::new(SlowPipeline { name: "linkedin".into(), sleep_for: Duration::from_millis(200) }));

        let orchestrator = Orchestrator::new(vec![slow_platform], pipelines, test_policy(), test_token());
        let summary = orchestrator.run_all(options(), None).await.unwrap();
        assert_eq!(summary.failed, vec!["linkedin".to_string()]);
    }
}
