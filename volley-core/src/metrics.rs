//! Per-run metrics aggregation
//!
//! Percentiles use the nearest-rank method: for fraction `p` over `n`
//! sorted latencies the result is the element at rank `ceil(p * n)`
//! (1-based, clamped to `1..=n`). This is the smallest recorded latency
//! with at least `p` of the samples at or below it, is deterministic, and
//! keeps `p50 <= p95 <= p99` for any sample set.

use crate::outcome::Outcome;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Latency distribution of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyMetrics {
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    #[serde(with = "humantime_serde")]
    pub mean: Duration,
    #[serde(with = "humantime_serde")]
    pub p50: Duration,
    #[serde(with = "humantime_serde")]
    pub p95: Duration,
    #[serde(with = "humantime_serde")]
    pub p99: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

/// Aggregated statistics for one matrix cell
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Outcomes absorbed
    pub requests: u64,
    /// Outcomes that were non-2xx or never got a response
    pub failures: u64,
    /// Achieved throughput: `requests / duration`
    pub rate: f64,
    /// Nominal attack duration
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub latencies: LatencyMetrics,
    pub bytes_in: u64,
    /// Share of outcomes with a 2xx status
    pub success_ratio: f64,
    pub status_codes: BTreeMap<u16, u64>,
    /// Distinct error descriptions in first-seen order
    pub errors: Vec<String>,
}

impl RunMetrics {
    /// `failures / requests`, zero for an empty run
    pub fn error_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.failures as f64 / self.requests as f64
        }
    }

    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

/// Folds one run's outcomes into [`RunMetrics`]
///
/// Statistics are computed on [`close`](Self::close); outcomes added after
/// that are dropped with a warning.
#[derive(Debug)]
pub struct MetricsAggregator {
    metrics: RunMetrics,
    latencies: Vec<Duration>,
    closed: bool,
}

impl MetricsAggregator {
    pub fn new(duration: Duration) -> Self {
        Self {
            metrics: RunMetrics {
                duration,
                ..Default::default()
            },
            latencies: Vec::new(),
            closed: false,
        }
    }

    pub fn add(&mut self, outcome: Outcome) {
        if self.closed {
            warn!(label = %outcome.label, "Outcome arrived after metrics were sealed, ignoring");
            return;
        }

        let metrics = &mut self.metrics;
        metrics.requests += 1;
        metrics.bytes_in += outcome.bytes_in;
        *metrics.status_codes.entry(outcome.status).or_insert(0) += 1;
        self.latencies.push(outcome.latency);

        if let Some(error) = outcome.error {
            metrics.failures += 1;
            if !metrics.errors.contains(&error) {
                metrics.errors.push(error);
            }
        }
    }

    /// Seal the run and compute statistics. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let metrics = &mut self.metrics;
        let secs = metrics.duration.as_secs_f64();
        metrics.rate = if secs > 0.0 {
            metrics.requests as f64 / secs
        } else {
            0.0
        };
        metrics.success_ratio = if metrics.requests == 0 {
            0.0
        } else {
            (metrics.requests - metrics.failures) as f64 / metrics.requests as f64
        };

        if self.latencies.is_empty() {
            return;
        }
        self.latencies.sort_unstable();

        let total: Duration = self.latencies.iter().sum();
        let count = u32::try_from(self.latencies.len()).unwrap_or(u32::MAX);
        metrics.latencies = LatencyMetrics {
            min: self.latencies[0],
            mean: total / count,
            p50: nearest_rank(&self.latencies, 0.50),
            p95: nearest_rank(&self.latencies, 0.95),
            p99: nearest_rank(&self.latencies, 0.99),
            max: self.latencies[self.latencies.len() - 1],
        };
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Close and hand over the metrics
    pub fn finish(mut self) -> RunMetrics {
        self.close();
        self.metrics
    }
}

/// Nearest-rank percentile over an ascending slice
pub fn nearest_rank(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let n = sorted.len();
    let rank = (p * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}
