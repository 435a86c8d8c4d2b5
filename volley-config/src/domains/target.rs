//! Target service configuration

use crate::error::ConfigResult;
use crate::validation::{validate_http_url, validate_path, Validatable};
use serde::{Deserialize, Serialize};

/// Placeholder substituted with the plan's limit value in `data_path`
pub const LIMIT_PLACEHOLDER: &str = "{limit}";

/// Where the service under test lives and which endpoints to hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL, e.g. `http://localhost:3001`
    pub base_url: String,

    /// Health endpoint used by the readiness prober
    pub health_path: String,

    /// Data endpoint; `{limit}` is replaced per matrix cell
    pub data_path: String,

    /// HTTP method used for the data endpoint
    pub method: String,

    /// Probe the data endpoint once before the matrix starts
    pub verify_endpoint: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            health_path: "/status".to_string(),
            data_path: "/benchmarkitems?limit={limit}".to_string(),
            method: "GET".to_string(),
            verify_endpoint: true,
        }
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_http_url(&self.base_url, "base_url", self.domain_name())?;
        validate_path(&self.health_path, "health_path", self.domain_name())?;
        validate_path(&self.data_path, "data_path", self.domain_name())?;

        if !self.data_path.contains(LIMIT_PLACEHOLDER) {
            return Err(self.validation_error(format!(
                "data_path must contain the {} placeholder",
                LIMIT_PLACEHOLDER
            )));
        }

        const METHODS: [&str; 6] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD"];
        if !METHODS.iter().any(|m| m.eq_ignore_ascii_case(&self.method)) {
            return Err(self.validation_error(format!(
                "method has invalid value '{}'. Valid choices: {}",
                self.method,
                METHODS.join(", ")
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults() {
        let config = TargetConfig::default();
        assert_eq!(config.base_url, "http://localhost:3001");
        assert_eq!(config.health_path, "/status");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_data_path_requires_placeholder() {
        let config = TargetConfig {
            data_path: "/benchmarkitems".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_method_is_checked() {
        let mut config = TargetConfig {
            method: "post".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.method = "BREW".to_string();
        assert!(config.validate().is_err());
    }
}
