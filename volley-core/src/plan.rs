//! Benchmark matrix definition

use crate::error::BenchError;
use crate::rate::Rate;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use volley_config::{PlanConfig, TargetConfig};
use volley_http::{HttpMethod, Target};

/// One (limit, concurrency, duration) tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanCell {
    pub limit: u64,
    /// Requests issued per second
    pub concurrency: u32,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl PlanCell {
    pub fn new(limit: u64, concurrency: u32, duration: Duration) -> Self {
        Self {
            limit,
            concurrency,
            duration,
        }
    }

    pub fn rate(&self) -> Rate {
        Rate::per_second(u64::from(self.concurrency))
    }

    pub fn label(&self) -> String {
        format!("limit={} concurrency={}", self.limit, self.concurrency)
    }
}

impl fmt::Display for PlanCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {:?}", self.label(), self.duration)
    }
}

/// Ordered matrix of cells. Order decides execution and report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkPlan {
    cells: Vec<PlanCell>,
}

impl BenchmarkPlan {
    pub fn new(cells: Vec<PlanCell>) -> Result<Self, BenchError> {
        if cells.is_empty() {
            return Err(BenchError::InvalidPlan("plan has no cells".to_string()));
        }
        if let Some(cell) = cells.iter().find(|c| c.concurrency == 0) {
            return Err(BenchError::InvalidPlan(format!(
                "{}: concurrency must be greater than 0",
                cell.label()
            )));
        }
        if let Some(cell) = cells.iter().find(|c| c.duration.is_zero()) {
            return Err(BenchError::InvalidPlan(format!(
                "{}: duration must be greater than 0",
                cell.label()
            )));
        }
        Ok(Self { cells })
    }

    /// Limit-major expansion: every concurrency level for the first limit,
    /// then every level for the next
    pub fn from_config(config: &PlanConfig) -> Result<Self, BenchError> {
        let cells = config
            .limits
            .iter()
            .flat_map(|&limit| {
                config
                    .concurrency_levels
                    .iter()
                    .map(move |&concurrency| PlanCell::new(limit, concurrency, config.duration))
            })
            .collect();
        Self::new(cells)
    }

    pub fn cells(&self) -> &[PlanCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Upper bound on wall time spent attacking
    pub fn total_duration(&self) -> Duration {
        self.cells.iter().map(|c| c.duration).sum()
    }
}

/// Request shape with a `{limit}` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTemplate {
    pub method: HttpMethod,
    pub path: String,
}

impl TargetTemplate {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self, BenchError> {
        let method = config
            .method
            .parse::<HttpMethod>()
            .map_err(|e| BenchError::InvalidPlan(e.to_string()))?;
        Ok(Self::new(method, config.data_path.clone()))
    }

    /// Concrete target for one limit value
    pub fn target(&self, base_url: &str, limit: u64) -> Result<Target, BenchError> {
        Target::from_template(self.method, base_url, &self.path, &[("limit", limit.to_string())])
            .map_err(|e| BenchError::InvalidPlan(e.to_string()))
    }
}

impl Default for TargetTemplate {
    fn default() -> Self {
        Self::from_config(&TargetConfig::default())
            .unwrap_or_else(|_| Self::new(HttpMethod::Get, "/benchmarkitems?limit={limit}"))
    }
}
