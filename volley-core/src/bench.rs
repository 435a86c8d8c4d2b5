//! Top-level benchmark driver
//!
//! Sequence for one run:
//!
//! 1. setup hooks (failure aborts before anything is launched)
//! 2. start the server, unless attaching to one already running
//! 3. wait for readiness, then settle
//! 4. optionally verify the data endpoint once
//! 5. run the matrix
//! 6. stop the server, then teardown hooks
//!
//! Step 6 happens on every path out of steps 2 to 5, including cancellation
//! and panics. Teardown hooks run exactly once per [`Benchmark::run`].

use crate::attack::Attacker;
use crate::error::BenchError;
use crate::hooks::{Collaborator, CommandHooks, NoopHooks};
use crate::plan::{BenchmarkPlan, TargetTemplate};
use crate::probe::ReadinessProber;
use crate::process::{ProcessLifecycleManager, ServerSpec, ServerWatch};
use crate::progress::{NoopProgress, ProgressObserver};
use crate::report::{CellReport, ReportSink, StdoutSink};
use crate::runner::MatrixRunner;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use volley_config::BenchConfig;
use volley_http::{HttpClient, HttpError, ReqwestClient};
use volley_resilience::Cancellation;

pub const SUCCESS_MESSAGE: &str = "Benchmark completed successfully";

/// Final result of a completed benchmark
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub cells: Vec<CellReport>,
    pub message: String,
}

impl BenchReport {
    pub fn total_requests(&self) -> u64 {
        self.cells.iter().map(|c| c.metrics.requests).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct Benchmark {
    base_url: String,
    plan: BenchmarkPlan,
    template: TargetTemplate,
    settle_delay: Duration,
    verify_endpoint: bool,
    attacker: Attacker,
    prober: ReadinessProber,
    runner: MatrixRunner,
    server: Option<ServerSpec>,
    lifecycle: ProcessLifecycleManager,
    hooks: Arc<dyn Collaborator>,
    progress: Arc<dyn ProgressObserver>,
}

impl Benchmark {
    pub fn builder(base_url: impl Into<String>, plan: BenchmarkPlan) -> BenchmarkBuilder {
        BenchmarkBuilder::new(base_url, plan)
    }

    /// Wire a benchmark from configuration with the reqwest transport
    pub fn from_config(config: &BenchConfig) -> Result<BenchmarkBuilder, BenchError> {
        let plan = BenchmarkPlan::from_config(&config.plan)?;
        let template = TargetTemplate::from_config(&config.target)?;
        let client = ReqwestClient::with_config(&config.http).map_err(transport_setup_error)?;
        let probe_client = client.with_timeout(config.readiness.probe_timeout);

        let mut builder = BenchmarkBuilder::new(config.target.base_url.clone(), plan)
            .template(template)
            .client(Arc::new(client))
            .probe_client(Arc::new(probe_client))
            .max_in_flight(config.attack.max_in_flight, config.attack.channel_capacity)
            .health_path(config.target.health_path.clone())
            .readiness(config.readiness.timeout, config.readiness.interval)
            .settle_delay(config.plan.settle_delay)
            .verify_endpoint(config.target.verify_endpoint)
            .hooks(Arc::new(CommandHooks::from_config(&config.hooks)));

        if let Some(server) = &config.server {
            builder = builder.server(ServerSpec::from(server));
        }

        Ok(builder)
    }

    pub fn plan(&self) -> &BenchmarkPlan {
        &self.plan
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run the whole benchmark
    pub async fn run(&self, cancel: &Cancellation) -> Result<BenchReport, BenchError> {
        let result = AssertUnwindSafe(self.run_hooked(cancel)).catch_unwind().await;

        self.progress.on_progress("Cleaning up...");
        if let Err(e) = self.hooks.teardown().await {
            warn!("Teardown failed: {}", e);
        }

        match result {
            Ok(Ok(cells)) => {
                info!(cells = cells.len(), "{}", SUCCESS_MESSAGE);
                Ok(BenchReport {
                    cells,
                    message: SUCCESS_MESSAGE.to_string(),
                })
            }
            Ok(Err(e)) => {
                warn!("{}: {}", e.summary(), e);
                Err(e)
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn run_hooked(&self, cancel: &Cancellation) -> Result<Vec<CellReport>, BenchError> {
        self.progress.on_progress("Running setup hooks...");
        self.hooks.setup().await?;

        match &self.server {
            Some(spec) => {
                self.progress.on_progress("Starting API server...");
                self.lifecycle
                    .scoped(spec, |server| self.against_ready_target(server, cancel))
                    .await
            }
            None => {
                info!(base_url = %self.base_url, "No server configured, attaching to running target");
                self.against_ready_target(ServerWatch::detached(), cancel)
                    .await
            }
        }
    }

    async fn against_ready_target(
        &self,
        server: ServerWatch,
        cancel: &Cancellation,
    ) -> Result<Vec<CellReport>, BenchError> {
        self.progress.on_progress("Waiting for server to be ready...");
        // A server that dies while starting up will never become ready
        let probe = tokio::select! {
            biased;
            exited = server.exited() => return Err(exited.into()),
            probe = self.prober.wait_until_ready(&self.base_url, cancel) => probe?,
        };
        if !probe.ready {
            return Err(BenchError::ReadinessTimeout {
                budget: self.prober.budget(),
                attempts: probe.attempts,
            });
        }

        self.settle(cancel).await?;

        if self.verify_endpoint {
            self.verify(cancel).await?;
        }

        self.runner.run(&self.base_url, &self.plan, cancel).await
    }

    /// One request with `limit=1`; a failure only warns and waits longer
    async fn verify(&self, cancel: &Cancellation) -> Result<(), BenchError> {
        self.progress.on_progress("Verifying endpoint...");
        let target = self.template.target(&self.base_url, 1)?;
        let outcome = tokio::select! {
            biased;
            reason = cancel.cancelled() => return Err(BenchError::Cancelled(reason)),
            outcome = self.attacker.hit(&target, "endpoint-check") => outcome,
        };

        if !outcome.is_success() {
            warn!(
                status = outcome.status,
                error = outcome.error.as_deref().unwrap_or(""),
                "Endpoint check failed"
            );
            self.progress.on_progress(&format!(
                "WARNING: Endpoint check failed with status {}",
                outcome.status
            ));
            self.settle(cancel).await?;
        }
        Ok(())
    }

    async fn settle(&self, cancel: &Cancellation) -> Result<(), BenchError> {
        if self.settle_delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            reason = cancel.cancelled() => Err(BenchError::Cancelled(reason)),
            _ = tokio::time::sleep(self.settle_delay) => Ok(()),
        }
    }
}

fn transport_setup_error(e: HttpError) -> BenchError {
    BenchError::Config(volley_config::ConfigError::DomainError {
        domain: "http".to_string(),
        message: e.to_string(),
    })
}

/// Assembles a [`Benchmark`]; every part has a default
pub struct BenchmarkBuilder {
    base_url: String,
    plan: BenchmarkPlan,
    template: TargetTemplate,
    client: Option<Arc<dyn HttpClient>>,
    probe_client: Option<Arc<dyn HttpClient>>,
    max_in_flight: usize,
    channel_capacity: usize,
    health_path: String,
    readiness_budget: Duration,
    readiness_interval: Duration,
    settle_delay: Duration,
    verify_endpoint: bool,
    server: Option<ServerSpec>,
    lifecycle: Option<ProcessLifecycleManager>,
    hooks: Arc<dyn Collaborator>,
    progress: Arc<dyn ProgressObserver>,
    sink: Arc<dyn ReportSink>,
}

impl BenchmarkBuilder {
    pub fn new(base_url: impl Into<String>, plan: BenchmarkPlan) -> Self {
        let defaults = BenchConfig::default();
        Self {
            base_url: base_url.into(),
            plan,
            template: TargetTemplate::default(),
            client: None,
            probe_client: None,
            max_in_flight: defaults.attack.max_in_flight,
            channel_capacity: defaults.attack.channel_capacity,
            health_path: defaults.target.health_path,
            readiness_budget: defaults.readiness.timeout,
            readiness_interval: defaults.readiness.interval,
            settle_delay: defaults.plan.settle_delay,
            verify_endpoint: defaults.target.verify_endpoint,
            server: None,
            lifecycle: None,
            hooks: Arc::new(NoopHooks),
            progress: Arc::new(NoopProgress),
            sink: Arc::new(StdoutSink::default()),
        }
    }

    pub fn template(mut self, template: TargetTemplate) -> Self {
        self.template = template;
        self
    }

    /// Transport for attacks, and for probes unless [`probe_client`](Self::probe_client) is set
    pub fn client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn probe_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.probe_client = Some(client);
        self
    }

    pub fn max_in_flight(mut self, max_in_flight: usize, channel_capacity: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self.channel_capacity = channel_capacity;
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn readiness(mut self, budget: Duration, interval: Duration) -> Self {
        self.readiness_budget = budget;
        self.readiness_interval = interval;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn verify_endpoint(mut self, verify: bool) -> Self {
        self.verify_endpoint = verify;
        self
    }

    /// Launch this server instead of attaching to a running one
    pub fn server(mut self, spec: ServerSpec) -> Self {
        self.server = Some(spec);
        self
    }

    pub fn lifecycle(mut self, lifecycle: ProcessLifecycleManager) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn Collaborator>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Result<Benchmark, BenchError> {
        let client: Arc<dyn HttpClient> = match self.client {
            Some(client) => client,
            None => Arc::new(
                ReqwestClient::with_config(&Default::default()).map_err(transport_setup_error)?,
            ),
        };
        let probe_client = self.probe_client.unwrap_or_else(|| client.clone());

        let attack_config = volley_config::AttackConfig {
            max_in_flight: self.max_in_flight,
            channel_capacity: self.channel_capacity,
        };
        let attacker = Attacker::with_config(client, &attack_config);
        let prober = ReadinessProber::new(
            Attacker::with_config(probe_client, &attack_config),
            self.health_path,
            self.readiness_budget,
            self.readiness_interval,
        );
        let runner = MatrixRunner::new(attacker.clone(), self.template.clone())
            .with_sink(self.sink)
            .with_progress(self.progress.clone());

        Ok(Benchmark {
            base_url: self.base_url,
            plan: self.plan,
            template: self.template,
            settle_delay: self.settle_delay,
            verify_endpoint: self.verify_endpoint,
            attacker,
            prober,
            runner,
            server: self.server,
            lifecycle: self.lifecycle.unwrap_or_default(),
            hooks: self.hooks,
            progress: self.progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::testing::ScriptedClient;
    use crate::error::ProcessError;
    use crate::hooks::testing::CountingHooks;
    use crate::plan::PlanCell;
    use crate::process::testing::FakeLauncher;
    use crate::progress::testing::RecordingProgress;
    use crate::progress::ProgressFn;
    use crate::report::MemorySink;
    use tokio_test::{assert_err, assert_ok};
    use volley_resilience::{CancelReason, CancellationSource};

    struct Harness {
        launcher_log: Arc<crate::process::testing::LifecycleLog>,
        hooks: Arc<CountingHooks>,
        sink: Arc<MemorySink>,
        progress: Arc<RecordingProgress>,
        builder: BenchmarkBuilder,
    }

    fn harness(client: ScriptedClient, fail_setup: bool) -> Harness {
        let launcher = FakeLauncher::new();
        let launcher_log = launcher.log.clone();
        let hooks = Arc::new(CountingHooks {
            fail_setup,
            ..Default::default()
        });
        let sink = Arc::new(MemorySink::new());
        let progress = Arc::new(RecordingProgress::default());
        let plan = BenchmarkPlan::new(vec![
            PlanCell::new(10, 2, Duration::from_secs(1)),
            PlanCell::new(10, 4, Duration::from_secs(1)),
        ])
        .unwrap();

        let builder = Benchmark::builder("http://localhost:3001", plan)
            .client(Arc::new(client))
            .readiness(Duration::from_secs(3), Duration::from_millis(500))
            .settle_delay(Duration::from_millis(100))
            .server(ServerSpec::new("./bin/benchmark-server"))
            .lifecycle(ProcessLifecycleManager::with_launcher(Arc::new(launcher)))
            .hooks(hooks.clone())
            .sink(sink.clone())
            .progress(progress.clone());

        Harness {
            launcher_log,
            hooks,
            sink,
            progress,
            builder,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_run() {
        let h = harness(ScriptedClient::always(200, Duration::from_millis(10)), false);
        let bench = h.builder.build().unwrap();

        let report = assert_ok!(bench.run(&Cancellation::never()).await);

        assert_eq!(report.message, "Benchmark completed successfully");
        assert_eq!(report.cells.len(), 2);
        assert_eq!(report.total_requests(), 6);
        assert_eq!(h.sink.lines().len(), 2);
        assert_eq!(h.launcher_log.launches(), 1);
        assert_eq!(h.launcher_log.terminations(), 1);
        assert_eq!(h.hooks.teardowns(), 1);

        assert_eq!(
            h.progress.messages(),
            vec![
                "Running setup hooks...",
                "Starting API server...",
                "Waiting for server to be ready...",
                "Verifying endpoint...",
                "Running benchmarks...",
                "Completed 2 benchmark runs",
                "Cleaning up...",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_timeout_still_tears_down() {
        let h = harness(ScriptedClient::always(503, Duration::from_millis(1)), false);
        let bench = h.builder.build().unwrap();

        let err = assert_err!(bench.run(&Cancellation::never()).await);

        assert!(matches!(err, BenchError::ReadinessTimeout { .. }));
        assert_eq!(err.summary(), "Server failed to start within 3s");
        assert!(h.sink.lines().is_empty());
        assert_eq!(h.launcher_log.terminations(), 1);
        assert_eq!(h.hooks.teardowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_crash_during_startup_is_lifecycle_error() {
        let mut launcher = FakeLauncher::new();
        launcher.crash_on_launch = true;
        let log = launcher.log.clone();
        let h = harness(ScriptedClient::always(503, Duration::from_millis(1)), false);
        let bench = h
            .builder
            .lifecycle(ProcessLifecycleManager::with_launcher(Arc::new(launcher)))
            .build()
            .unwrap();

        let started = tokio::time::Instant::now();
        let err = assert_err!(bench.run(&Cancellation::never()).await);

        assert!(matches!(
            err,
            BenchError::ProcessLifecycle(ProcessError::ExitedEarly { pid: 4242, .. })
        ));
        assert_eq!(err.summary(), "Failed to start server");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(h.sink.lines().is_empty());
        assert_eq!(log.terminations(), 1);
        assert_eq!(h.hooks.teardowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_endpoint_check() {
        let h = harness(ScriptedClient::always(200, Duration::from_millis(1)), false);
        let bench = h
            .builder
            .client(Arc::new(ScriptedClient::always(200, Duration::from_secs(30))))
            .probe_client(Arc::new(ScriptedClient::always(200, Duration::from_millis(1))))
            .build()
            .unwrap();
        let source = CancellationSource::new();
        // ready at 500ms, settle until 600ms, endpoint check hangs
        source.cancel_after(Duration::from_secs(1));

        let started = tokio::time::Instant::now();
        let err = assert_err!(bench.run(&source.token()).await);

        assert!(matches!(err, BenchError::Cancelled(CancelReason::Deadline)));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(h.launcher_log.terminations(), 1);
        assert_eq!(h.hooks.teardowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_failure_skips_server() {
        let h = harness(ScriptedClient::always(200, Duration::from_millis(1)), true);
        let bench = h.builder.build().unwrap();

        let err = assert_err!(bench.run(&Cancellation::never()).await);

        assert!(matches!(err, BenchError::Setup(_)));
        assert_eq!(err.summary(), "Setup failed");
        assert_eq!(h.launcher_log.launches(), 0);
        assert_eq!(h.hooks.teardowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_cell_still_tears_down() {
        let h = harness(ScriptedClient::always(200, Duration::from_millis(1)), false);
        let bench = h.builder.build().unwrap();
        let source = CancellationSource::new();
        // ready at 500ms, settle until 600ms, cancel inside the first cell
        source.cancel_after(Duration::from_millis(900));

        let err = assert_err!(bench.run(&source.token()).await);

        assert!(matches!(err, BenchError::Cancelled(CancelReason::Deadline)));
        assert!(h.sink.lines().is_empty());
        assert_eq!(h.launcher_log.terminations(), 1);
        assert_eq!(h.hooks.teardowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_still_tears_down() {
        let h = harness(ScriptedClient::always(200, Duration::from_millis(1)), false);
        let bench = h
            .builder
            .progress(Arc::new(ProgressFn(|message: &str| {
                if message == "Running benchmarks..." {
                    panic!("observer exploded");
                }
            })))
            .build()
            .unwrap();

        let outcome = AssertUnwindSafe(bench.run(&Cancellation::never()))
            .catch_unwind()
            .await;

        assert!(outcome.is_err());
        assert_eq!(h.launcher_log.terminations(), 1);
        assert_eq!(h.hooks.teardowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_endpoint_check_only_warns() {
        // health probe passes, endpoint check gets a 404, matrix is fine
        let client = ScriptedClient::scripted(vec![Ok(200), Ok(404)], 200);
        let h = harness(client, false);
        let bench = h.builder.build().unwrap();

        let report = assert_ok!(bench.run(&Cancellation::never()).await);

        assert_eq!(report.cells.len(), 2);
        assert!(h
            .progress
            .messages()
            .contains(&"WARNING: Endpoint check failed with status 404".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_mode_launches_nothing() {
        let h = harness(ScriptedClient::always(200, Duration::from_millis(1)), false);
        let plan = BenchmarkPlan::new(vec![PlanCell::new(10, 1, Duration::from_secs(1))]).unwrap();
        let bench = Benchmark::builder("http://localhost:3001", plan)
            .client(Arc::new(ScriptedClient::always(200, Duration::from_millis(1))))
            .lifecycle(ProcessLifecycleManager::with_launcher(Arc::new(FakeLauncher::new())))
            .settle_delay(Duration::ZERO)
            .verify_endpoint(false)
            .hooks(h.hooks.clone())
            .sink(h.sink.clone())
            .build()
            .unwrap();

        let report = assert_ok!(bench.run(&Cancellation::never()).await);
        assert_eq!(report.cells.len(), 1);
        assert_eq!(h.launcher_log.launches(), 0);
        assert_eq!(h.hooks.teardowns(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let report = BenchReport {
            cells: vec![],
            message: SUCCESS_MESSAGE.to_string(),
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("Benchmark completed successfully"));
    }
}
