//! Target readiness prober
//!
//! Probes go through [`Attacker::hit`], the same request path as the
//! benchmark itself, but their outcomes are inspected and discarded here
//! and never reach a [`crate::MetricsAggregator`].

use crate::attack::Attacker;
use crate::error::BenchError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use volley_config::{ReadinessConfig, TargetConfig};
use volley_http::Target;
use volley_resilience::Cancellation;

const PROBE_LABEL: &str = "readiness";

/// Result of waiting for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub ready: bool,
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct ReadinessProber {
    attacker: Attacker,
    health_path: String,
    budget: Duration,
    interval: Duration,
}

impl ReadinessProber {
    pub fn new(
        attacker: Attacker,
        health_path: impl Into<String>,
        budget: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            attacker,
            health_path: health_path.into(),
            budget,
            interval,
        }
    }

    pub fn from_config(attacker: Attacker, target: &TargetConfig, config: &ReadinessConfig) -> Self {
        Self::new(attacker, target.health_path.clone(), config.timeout, config.interval)
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Probe `base_url` + health path until a 2xx or the budget runs out.
    ///
    /// Each attempt waits one interval first, then sends a single request
    /// bounded by the remaining budget. Not-ready is reported once the
    /// budget is spent, never before. Cancellation is an error.
    pub async fn wait_until_ready(
        &self,
        base_url: &str,
        cancel: &Cancellation,
    ) -> Result<ProbeReport, BenchError> {
        let target = Target::get(base_url, &self.health_path)
            .map_err(|e| BenchError::InvalidPlan(e.to_string()))?;
        let start = Instant::now();
        let mut attempts = 0;

        debug!(target = %target, budget = ?self.budget, "Waiting for readiness");

        loop {
            let remaining = self.budget.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                warn!(attempts, "Target not ready within {:?}", self.budget);
                return Ok(ProbeReport {
                    ready: false,
                    attempts,
                    elapsed: start.elapsed(),
                });
            }

            tokio::select! {
                biased;
                reason = cancel.cancelled() => return Err(BenchError::Cancelled(reason)),
                _ = tokio::time::sleep(self.interval.min(remaining)) => {}
            }

            let remaining = self.budget.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                continue;
            }

            attempts += 1;
            let probe = tokio::time::timeout(remaining, self.attacker.hit(&target, PROBE_LABEL));
            let outcome = tokio::select! {
                biased;
                reason = cancel.cancelled() => return Err(BenchError::Cancelled(reason)),
                outcome = probe => outcome,
            };

            match outcome {
                Ok(outcome) if outcome.is_success() => {
                    info!(attempts, elapsed = ?start.elapsed(), "Target is ready");
                    return Ok(ProbeReport {
                        ready: true,
                        attempts,
                        elapsed: start.elapsed(),
                    });
                }
                Ok(outcome) => debug!(
                    attempt = attempts,
                    status = outcome.status,
                    error = outcome.error.as_deref().unwrap_or(""),
                    "Probe failed"
                ),
                Err(_) => debug!(attempt = attempts, "Probe outlived the readiness budget"),
            }
        }
    }
}
