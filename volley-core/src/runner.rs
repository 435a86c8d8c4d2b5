//! Benchmark matrix runner
//!
//! Cells run strictly one after another: a cell's outcome stream is
//! drained and its metrics sealed before the next attack starts, so no
//! two cells ever contend for the target at the same time.

use crate::attack::Attacker;
use crate::error::BenchError;
use crate::metrics::MetricsAggregator;
use crate::plan::{BenchmarkPlan, PlanCell, TargetTemplate};
use crate::progress::{NoopProgress, ProgressObserver};
use crate::report::{CellReport, ReportSink, StdoutSink, SummaryLine};
use std::sync::Arc;
use tracing::{debug, info};
use volley_http::Target;
use volley_resilience::{CancelReason, Cancellation};

pub struct MatrixRunner {
    attacker: Attacker,
    template: TargetTemplate,
    sink: Arc<dyn ReportSink>,
    progress: Arc<dyn ProgressObserver>,
}

impl MatrixRunner {
    pub fn new(attacker: Attacker, template: TargetTemplate) -> Self {
        Self {
            attacker,
            template,
            sink: Arc::new(StdoutSink::default()),
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// Run every cell of `plan` in order, reporting one summary line each
    pub async fn run(
        &self,
        base_url: &str,
        plan: &BenchmarkPlan,
        cancel: &Cancellation,
    ) -> Result<Vec<CellReport>, BenchError> {
        // Resolve every target first so a bad template fails before any load
        let targets = plan
            .cells()
            .iter()
            .map(|cell| self.template.target(base_url, cell.limit))
            .collect::<Result<Vec<_>, _>>()?;

        self.progress.on_progress("Running benchmarks...");
        self.sink.begin();

        let mut reports = Vec::with_capacity(plan.len());
        let mut current_limit = None;

        for (cell, target) in plan.cells().iter().zip(targets) {
            if let Some(reason) = cancel.reason() {
                return Err(self.abort(current_limit.is_some(), reason));
            }

            if current_limit != Some(cell.limit) {
                if current_limit.is_some() {
                    self.sink.end_group();
                }
                self.sink
                    .begin_group(target.method(), &target.path_and_query());
                current_limit = Some(cell.limit);
            }

            let report = self.run_cell(cell, target, cancel).await;

            // A cut-short cell would report a misleading rate
            if let Some(reason) = cancel.reason() {
                return Err(self.abort(true, reason));
            }

            self.sink.summary(&SummaryLine::from_report(&report));
            reports.push(report);
        }

        if current_limit.is_some() {
            self.sink.end_group();
        }
        self.sink.finish();
        self.progress
            .on_progress(&format!("Completed {} benchmark runs", reports.len()));

        Ok(reports)
    }

    /// Attack one cell and seal its metrics once the stream is drained
    pub async fn run_cell(
        &self,
        cell: &PlanCell,
        target: Target,
        cancel: &Cancellation,
    ) -> CellReport {
        let method = target.method();
        let path = target.path_and_query();
        let label = cell.label();
        debug!(limit = cell.limit, concurrency = cell.concurrency, "Starting cell");

        let mut stream = self
            .attacker
            .attack(target, cell.rate(), cell.duration, &label, cancel);
        let mut aggregator = MetricsAggregator::new(cell.duration);
        while let Some(outcome) = stream.recv().await {
            aggregator.add(outcome);
        }
        let metrics = aggregator.finish();

        info!(
            limit = cell.limit,
            concurrency = cell.concurrency,
            requests = metrics.requests,
            rate = metrics.rate,
            error_rate = metrics.error_rate(),
            "Cell complete"
        );

        CellReport {
            cell: *cell,
            method,
            path,
            metrics,
        }
    }

    fn abort(&self, group_open: bool, reason: CancelReason) -> BenchError {
        if group_open {
            self.sink.end_group();
        }
        info!("Benchmark matrix stopped: {}", reason);
        BenchError::Cancelled(reason)
    }
}
