//! Collaborator hooks
//!
//! Setup prepares the target (schema, seed data, code generation) before
//! anything is launched; teardown restores prior state afterwards. The
//! benchmark only sequences them.

use crate::error::HookError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use volley_config::{HookCommand, HooksConfig};

/// External setup and teardown steps
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn setup(&self) -> Result<(), HookError>;

    async fn teardown(&self) -> Result<(), HookError>;
}

/// For callers without collaborators
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl Collaborator for NoopHooks {
    async fn setup(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn teardown(&self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Runs configured commands with their output discarded
#[derive(Debug, Clone, Default)]
pub struct CommandHooks {
    setup: Vec<HookCommand>,
    teardown: Vec<HookCommand>,
}

impl CommandHooks {
    pub fn new(setup: Vec<HookCommand>, teardown: Vec<HookCommand>) -> Self {
        Self { setup, teardown }
    }

    pub fn from_config(config: &HooksConfig) -> Self {
        Self::new(config.setup.clone(), config.teardown.clone())
    }

    async fn run(command: &HookCommand) -> Result<(), HookError> {
        debug!(command = %command, "Running hook");

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &command.working_dir {
            process.current_dir(dir);
        }

        let status = process.status().await.map_err(|source| HookError::Spawn {
            command: command.to_string(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(HookError::Failed {
                command: command.to_string(),
                status: status.to_string(),
            })
        }
    }
}

#[async_trait]
impl Collaborator for CommandHooks {
    /// Stops at the first failing command
    async fn setup(&self) -> Result<(), HookError> {
        for command in &self.setup {
            Self::run(command).await?;
        }
        if !self.setup.is_empty() {
            info!(commands = self.setup.len(), "Setup hooks complete");
        }
        Ok(())
    }

    /// Runs every command; reports the first failure after all have run
    async fn teardown(&self) -> Result<(), HookError> {
        let mut first_error = None;
        for command in &self.teardown {
            if let Err(e) = Self::run(command).await {
                warn!("Teardown hook failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
