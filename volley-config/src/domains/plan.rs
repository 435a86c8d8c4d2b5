//! Benchmark matrix configuration

use crate::error::ConfigResult;
use crate::validation::{validate_non_empty, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The (limit x concurrency) matrix and its timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Result-limit values, benchmarked in this order
    pub limits: Vec<u64>,

    /// Requests per second for each cell, in this order
    pub concurrency_levels: Vec<u32>,

    /// Attack duration per cell
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Pause between readiness and the first cell
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            limits: vec![10, 100, 1000],
            concurrency_levels: vec![1, 10, 50],
            duration: Duration::from_secs(5),
            settle_delay: Duration::from_secs(2),
        }
    }
}

impl PlanConfig {
    /// Number of matrix cells this plan expands to
    pub fn cell_count(&self) -> usize {
        self.limits.len() * self.concurrency_levels.len()
    }
}

impl Validatable for PlanConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_non_empty(&self.limits, "limits", self.domain_name())?;
        validate_non_empty(&self.concurrency_levels, "concurrency_levels", self.domain_name())?;

        for level in &self.concurrency_levels {
            validate_positive(*level, "concurrency_levels[]", self.domain_name())?;
        }

        if self.duration.is_zero() {
            return Err(self.validation_error("duration must be greater than 0"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "plan"
    }
}
