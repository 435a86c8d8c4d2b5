//! Domain-driven configuration management for volley
//!
//! Configuration is split by functional domain (target, plan, readiness,
//! attack, http, server, hooks, logging). Each domain carries its own
//! defaults and validation; the loader layers a YAML file and `VOLLEY_*`
//! environment overrides on top.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    attack::AttackConfig,
    hooks::{HookCommand, HooksConfig},
    http::HttpConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    plan::PlanConfig,
    readiness::ReadinessConfig,
    server::{ServerConfig, REQUIRED_SERVER_ENV},
    target::TargetConfig,
    BenchConfig,
};
