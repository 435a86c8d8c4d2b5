//! Graceful shutdown of external processes
//!
//! Termination escalates: SIGTERM first, then a hard kill once the grace
//! period runs out.

use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// How long to wait for the OS to reap a killed process
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Shutdown error types
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// Waiting on the child failed
    #[error("Failed to wait for process: {0}")]
    WaitFailed(String),

    /// Hard kill could not be delivered
    #[error("Failed to kill process: {0}")]
    KillFailed(String),

    /// Process survived a hard kill
    #[error("Process unresponsive to termination")]
    Unresponsive,
}

/// Process shutdown manager for external processes
pub struct ProcessShutdownManager;

impl ProcessShutdownManager {
    /// Shutdown a process gracefully with escalating signals
    ///
    /// Returns immediately with the exit status if the process already exited.
    pub async fn shutdown_process(
        child: &mut Child,
        graceful_timeout: Duration,
    ) -> Result<ExitStatus, ShutdownError> {
        if let Ok(Some(status)) = child.try_wait() {
            info!("Process already exited with status: {}", status);
            return Ok(status);
        }

        // Phase 1: Try graceful termination (SIGTERM on Unix)
        if let Some(id) = child.id() {
            info!("Initiating graceful shutdown for process {}", id);
            Self::send_terminate(id);
        }

        match timeout(graceful_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!("Process terminated gracefully with status: {}", status);
                return Ok(status);
            }
            Ok(Err(e)) => {
                error!("Error waiting for process: {}", e);
            }
            Err(_) => {
                warn!(
                    "Process did not terminate within {:?}, killing",
                    graceful_timeout
                );
            }
        }

        // Phase 2: Force termination
        if let Err(e) = child.start_kill() {
            // InvalidInput means the child was already reaped
            if e.kind() != std::io::ErrorKind::InvalidInput {
                error!("Failed to kill process: {}", e);
                return Err(ShutdownError::KillFailed(e.to_string()));
            }
        }

        match timeout(KILL_WAIT, child.wait()).await {
            Ok(Ok(status)) => {
                info!("Process terminated forcefully with status: {}", status);
                Ok(status)
            }
            Ok(Err(e)) => {
                error!("Error waiting for killed process: {}", e);
                Err(ShutdownError::WaitFailed(e.to_string()))
            }
            Err(_) => {
                error!("Process did not terminate even after force kill");
                Err(ShutdownError::Unresponsive)
            }
        }
    }

    #[cfg(all(unix, feature = "shutdown"))]
    fn send_terminate(id: u32) {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if let Err(e) = signal::kill(Pid::from_raw(id as i32), Signal::SIGTERM) {
            warn!("Failed to send SIGTERM to process {}: {}", id, e);
        }
    }

    #[cfg(not(all(unix, feature = "shutdown")))]
    fn send_terminate(id: u32) {
        warn!(
            "No graceful termination signal available for process {}, waiting before kill",
            id
        );
    }
}
