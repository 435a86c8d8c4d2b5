//! Error taxonomy for a benchmark run
//!
//! Per-request failures never appear here; they are recorded on
//! [`crate::Outcome`] and surface only through [`crate::RunMetrics`].

use std::time::Duration;
use thiserror::Error;
use volley_config::ConfigError;
use volley_resilience::{CancelReason, ShutdownError};

/// Fatal errors that stop a benchmark
#[derive(Debug, Error)]
pub enum BenchError {
    /// A collaborator could not prepare the target
    #[error("Setup failed: {0}")]
    Setup(#[from] HookError),

    /// No healthy probe within the readiness budget
    #[error("Server failed to start within {budget:?} ({attempts} probes)")]
    ReadinessTimeout { budget: Duration, attempts: u32 },

    /// Server process could not be launched or managed
    #[error("Process lifecycle error: {0}")]
    ProcessLifecycle(#[from] ProcessError),

    /// External abort or deadline
    #[error("Benchmark cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid benchmark plan: {0}")]
    InvalidPlan(String),
}

impl BenchError {
    /// Short top-level message for the final result
    pub fn summary(&self) -> String {
        match self {
            BenchError::Setup(_) => "Setup failed".to_string(),
            BenchError::ReadinessTimeout { budget, .. } => {
                format!("Server failed to start within {:?}", budget)
            }
            BenchError::ProcessLifecycle(_) => "Failed to start server".to_string(),
            BenchError::Cancelled(_) => "Benchmark cancelled".to_string(),
            BenchError::Config(_) => "Invalid configuration".to_string(),
            BenchError::InvalidPlan(_) => "Invalid benchmark plan".to_string(),
        }
    }
}

/// Server process errors
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server process {pid} exited before becoming ready ({status})")]
    ExitedEarly { pid: u32, status: String },

    #[error("Failed to stop server process: {0}")]
    Shutdown(#[from] ShutdownError),
}

/// Collaborator hook errors
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    Failed { command: String, status: String },

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_exit_reads_as_start_failure() {
        let err = BenchError::from(ProcessError::ExitedEarly {
            pid: 77,
            status: "exit status: 1".to_string(),
        });
        assert_eq!(err.summary(), "Failed to start server");
        assert!(err.to_string().contains("77 exited before becoming ready"));
    }

    #[test]
    fn test_readiness_timeout_message() {
        let err = BenchError::ReadinessTimeout {
            budget: Duration::from_secs(15),
            attempts: 30,
        };
        assert_eq!(err.summary(), "Server failed to start within 15s");
        assert!(err.to_string().contains("30 probes"));
    }

    #[test]
    fn test_cancelled_summary() {
        let err = BenchError::Cancelled(CancelReason::Deadline);
        assert_eq!(err.summary(), "Benchmark cancelled");
        assert_eq!(err.to_string(), format!("Benchmark cancelled: {}", CancelReason::Deadline));
    }
}
