//! Readiness probe configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long and how often to probe the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Total wait budget; exceeding it aborts the run
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Pause before each probe attempt
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Ceiling for a single probe request
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            interval: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(1),
        }
    }
}

impl Validatable for ReadinessConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.timeout.is_zero() {
            return Err(self.validation_error("timeout must be greater than 0"));
        }
        if self.interval.is_zero() {
            return Err(self.validation_error("interval must be greater than 0"));
        }
        if self.interval > self.timeout {
            return Err(self.validation_error(format!(
                "interval ({:?}) cannot exceed timeout ({:?})",
                self.interval, self.timeout
            )));
        }
        if self.probe_timeout.is_zero() {
            return Err(self.validation_error("probe_timeout must be greater than 0"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "readiness"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_defaults() {
        let config = ReadinessConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.interval, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_cannot_exceed_timeout() {
        let config = ReadinessConfig {
            timeout: Duration::from_secs(1),
            interval: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
