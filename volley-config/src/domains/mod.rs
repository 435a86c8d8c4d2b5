//! Domain-specific configuration modules

pub mod attack;
pub mod hooks;
pub mod http;
pub mod logging;
pub mod plan;
pub mod readiness;
pub mod server;
pub mod target;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main volley configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BenchConfig {
    /// Service under test
    pub target: target::TargetConfig,

    /// Benchmark matrix
    pub plan: plan::PlanConfig,

    /// Readiness probing
    pub readiness: readiness::ReadinessConfig,

    /// Attack engine tuning
    pub attack: attack::AttackConfig,

    /// HTTP client configuration
    pub http: http::HttpConfig,

    /// Server process to launch (attach mode when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<server::ServerConfig>,

    /// External setup/teardown commands
    pub hooks: hooks::HooksConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,
}

impl BenchConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.plan.validate()?;
        self.readiness.validate()?;
        self.attack.validate()?;
        self.http.validate()?;
        self.hooks.validate()?;
        self.logging.validate()?;

        if let Some(ref server) = self.server {
            server.validate()?;
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = BenchConfig {
            server: Some(server::ServerConfig::default()),
            ..Default::default()
        };
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BenchConfig::default();
        assert!(config.server.is_none());
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_sample_parses_back() {
        let sample = BenchConfig::generate_sample();
        let parsed: BenchConfig = serde_yaml::from_str(&sample).unwrap();
        assert!(parsed.server.is_some());
        assert_eq!(parsed.plan.limits, vec![10, 100, 1000]);
    }
}
