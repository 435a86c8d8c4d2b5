//! Configuration loading and environment variable handling

use crate::domains::BenchConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "VOLLEY".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<BenchConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml(&self, content: &str) -> ConfigResult<BenchConfig> {
        let mut config: BenchConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<BenchConfig> {
        let mut config = BenchConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<BenchConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut BenchConfig) -> ConfigResult<()> {
        self.apply_target_overrides(&mut config.target);
        self.apply_plan_overrides(&mut config.plan)?;
        self.apply_readiness_overrides(&mut config.readiness)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_logging_overrides(&mut config.logging)?;

        if let Ok(binary) = self.get_env_var("SERVER_BINARY") {
            config.server.get_or_insert_with(Default::default).binary = binary.into();
        }

        if let Some(ref mut server) = config.server {
            self.apply_server_overrides(server, &mut config.target)?;
        }

        Ok(())
    }

    fn apply_target_overrides(&self, config: &mut crate::domains::target::TargetConfig) {
        if let Ok(base_url) = self.get_env_var("BASE_URL") {
            config.base_url = base_url;
        }
    }

    fn apply_plan_overrides(
        &self,
        config: &mut crate::domains::plan::PlanConfig,
    ) -> ConfigResult<()> {
        if let Ok(limits) = self.get_env_var("LIMITS") {
            config.limits = parse_list(&limits, "LIMITS")?;
        }

        if let Ok(levels) = self.get_env_var("CONCURRENCY") {
            config.concurrency_levels = parse_list(&levels, "CONCURRENCY")?;
        }

        if let Ok(duration) = self.get_env_var("DURATION") {
            config.duration = parse_duration(&duration, "DURATION")?;
        }

        Ok(())
    }

    fn apply_readiness_overrides(
        &self,
        config: &mut crate::domains::readiness::ReadinessConfig,
    ) -> ConfigResult<()> {
        if let Ok(timeout) = self.get_env_var("READY_TIMEOUT") {
            config.timeout = parse_duration(&timeout, "READY_TIMEOUT")?;
        }
        Ok(())
    }

    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            config.timeout = parse_duration(&timeout, "HTTP_TIMEOUT")?;
        }
        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Server overrides; a changed port also moves the default base URL
    fn apply_server_overrides(
        &self,
        server: &mut crate::domains::server::ServerConfig,
        target: &mut crate::domains::target::TargetConfig,
    ) -> ConfigResult<()> {
        if let Ok(port) = self.get_env_var("SERVER_PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid SERVER_PORT: {}", e)))?;
            server.env.insert("PORT".to_string(), port.to_string());

            if self.get_env_var("BASE_URL").is_err() {
                if let Ok(mut url) = url::Url::parse(&target.base_url) {
                    if url.set_port(Some(port)).is_ok() {
                        target.base_url = url.as_str().trim_end_matches('/').to_string();
                    }
                }
            }
        }

        // The database URL comes from the ambient environment unless pinned in the file
        if !server.env.contains_key("DATABASE_URL") {
            if let Ok(database_url) = std::env::var("DATABASE_URL") {
                server.env.insert("DATABASE_URL".to_string(), database_url);
            }
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_list<T: FromStr>(raw: &str, name: &str) -> ConfigResult<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| ConfigError::EnvError(format!("Invalid {} entry '{}': {}", name, s, e)))
        })
        .collect()
}

fn parse_duration(raw: &str, name: &str) -> ConfigResult<Duration> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e)))
}
