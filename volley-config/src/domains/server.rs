//! Configuration for the server process under test

use crate::error::ConfigResult;
use crate::validation::{validate_port, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Environment keys the launched server must receive
pub const REQUIRED_SERVER_ENV: [&str; 7] = [
    "DATABASE_URL",
    "PORT",
    "JWT_SECRET",
    "PAGINATION_LIMIT",
    "PAGINATION_MAX_LIMIT",
    "CORS_ORIGINS",
    "ENVIRONMENT",
];

/// Server binary, arguments and injected environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path to the already-built server binary
    pub binary: PathBuf,

    /// Extra command-line arguments
    pub args: Vec<String>,

    /// Variables merged over the ambient environment
    pub env: BTreeMap<String, String>,

    /// Forward the server's stdout/stderr instead of discarding them
    pub inherit_output: bool,

    /// Grace period between SIGTERM and SIGKILL on teardown
    #[serde(with = "humantime_serde")]
    pub graceful_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let env = [
            ("PORT", "3001"),
            ("JWT_SECRET", "volley-benchmark-signing-key-not-for-production"),
            ("JWT_TTL", "3600"),
            ("PAGINATION_LIMIT", "50"),
            ("PAGINATION_MAX_LIMIT", "10000"),
            ("CORS_ORIGINS", "*"),
            ("ENVIRONMENT", "test"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            binary: PathBuf::from("./bin/benchmark-server"),
            args: Vec::new(),
            env,
            inherit_output: false,
            graceful_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Listen port taken from the `PORT` variable, if parseable
    pub fn port(&self) -> Option<u16> {
        self.env.get("PORT").and_then(|p| p.parse().ok())
    }

    /// Required variables missing from `env`
    pub fn missing_env(&self) -> Vec<&'static str> {
        REQUIRED_SERVER_ENV
            .iter()
            .copied()
            .filter(|key| self.env.get(*key).map_or(true, |v| v.is_empty()))
            .collect()
    }
}

impl Validatable for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(
            &self.binary.to_string_lossy(),
            "binary",
            self.domain_name(),
        )?;

        let missing = self.missing_env();
        if !missing.is_empty() {
            return Err(self.validation_error(format!(
                "env is missing required variables: {}",
                missing.join(", ")
            )));
        }

        match self.port() {
            Some(port) => validate_port(port, "PORT", self.domain_name())?,
            None => {
                return Err(self.validation_error("PORT must be a valid port number"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lacks_database_url() {
        let config = ServerConfig::default();
        assert_eq!(config.missing_env(), vec!["DATABASE_URL"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_complete_env_validates() {
        let mut config = ServerConfig::default();
        config
            .env
            .insert("DATABASE_URL".to_string(), "postgres://localhost/bench".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.port(), Some(3001));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = ServerConfig::default();
        config
            .env
            .insert("DATABASE_URL".to_string(), "postgres://localhost/bench".to_string());
        config.env.insert("PORT".to_string(), "http".to_string());
        assert!(config.validate().is_err());
    }
}
