//! Process lifecycle management
//!
//! The server under test is owned by exactly one [`ManagedServer`]. Its
//! state only moves forward:
//!
//! ```text
//! NotStarted -> Running -> Terminating -> Exited
//! ```
//!
//! A new start creates a new handle. [`ProcessLifecycleManager::scoped`]
//! pairs every start with a terminate-and-wait on every exit path,
//! including panics inside the scoped body.

use crate::error::{BenchError, ProcessError};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use volley_config::ServerConfig;
use volley_resilience::ProcessShutdownManager;

/// What to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub binary: PathBuf,
    pub args: Vec<String>,
    /// Merged over the ambient environment
    pub env: BTreeMap<String, String>,
    pub inherit_output: bool,
    pub graceful_timeout: Duration,
}

impl ServerSpec {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            inherit_output: false,
            graceful_timeout: Duration::from_secs(5),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl From<&ServerConfig> for ServerSpec {
    fn from(config: &ServerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            inherit_output: config.inherit_output,
            graceful_timeout: config.graceful_timeout,
        }
    }
}

/// A launched server as seen by the lifecycle manager
#[async_trait]
pub trait ServerProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Exit status once the process has exited on its own, `None` while running
    fn exit_status(&mut self) -> Option<String>;

    /// Stop the process and wait for it to exit
    async fn terminate(&mut self, graceful_timeout: Duration) -> Result<(), ProcessError>;
}

/// Creates [`ServerProcess`]es
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    async fn launch(&self, spec: &ServerSpec) -> Result<Box<dyn ServerProcess>, ProcessError>;
}

/// Launches real subprocesses
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildLauncher;

#[async_trait]
impl ServerLauncher for ChildLauncher {
    async fn launch(&self, spec: &ServerSpec) -> Result<Box<dyn ServerProcess>, ProcessError> {
        let mut command = Command::new(&spec.binary);
        command.args(&spec.args).envs(&spec.env).kill_on_drop(true);

        if spec.inherit_output {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        command.stdin(Stdio::null());

        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            binary: spec.binary.display().to_string(),
            source,
        })?;

        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl ServerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn exit_status(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(None) => None,
            Ok(Some(status)) => Some(status.to_string()),
            Err(e) => Some(format!("unknown ({})", e)),
        }
    }

    async fn terminate(&mut self, graceful_timeout: Duration) -> Result<(), ProcessError> {
        ProcessShutdownManager::shutdown_process(&mut self.child, graceful_timeout).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Terminating,
    Exited,
}

/// Exclusive handle to the server under test
pub struct ManagedServer {
    process: Option<Box<dyn ServerProcess>>,
    state: ProcessState,
    pid: Option<u32>,
    graceful_timeout: Duration,
}

impl ManagedServer {
    fn running(process: Box<dyn ServerProcess>, graceful_timeout: Duration) -> Self {
        Self {
            pid: process.id(),
            process: Some(process),
            state: ProcessState::Running,
            graceful_timeout,
        }
    }

    /// A handle with nothing behind it
    pub fn not_started() -> Self {
        Self {
            process: None,
            state: ProcessState::NotStarted,
            pid: None,
            graceful_timeout: Duration::ZERO,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_alive(&mut self) -> bool {
        match (&mut self.process, self.state) {
            (Some(process), ProcessState::Running) => process.exit_status().is_none(),
            _ => false,
        }
    }

    /// Poll until the process exits on its own, publish the status, then idle
    async fn publish_exit(&mut self, exit: watch::Sender<Option<String>>) -> Infallible {
        if let (Some(process), ProcessState::Running) = (&mut self.process, self.state) {
            loop {
                tokio::time::sleep(EXIT_POLL_INTERVAL).await;
                if let Some(status) = process.exit_status() {
                    warn!(pid = ?self.pid, %status, "Server exited unexpectedly");
                    let _ = exit.send(Some(status));
                    break;
                }
            }
        }
        std::future::pending().await
    }

    /// Stop the server and wait for it. Safe to call any number of times;
    /// only the first call on a running server does anything.
    pub async fn terminate(&mut self) -> Result<(), ProcessError> {
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };
        if self.state == ProcessState::Exited {
            return Ok(());
        }

        self.state = ProcessState::Terminating;
        info!(pid = ?self.pid, "Stopping server");
        let result = process.terminate(self.graceful_timeout).await;
        self.state = ProcessState::Exited;
        result
    }
}

impl Drop for ManagedServer {
    fn drop(&mut self) {
        if matches!(self.state, ProcessState::Running | ProcessState::Terminating) {
            warn!(pid = ?self.pid, "Server handle dropped before termination completed");
        }
    }
}

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// View of the server handed to a scoped body
#[derive(Debug, Clone)]
pub struct ServerWatch {
    pid: Option<u32>,
    exit: Option<watch::Receiver<Option<String>>>,
}

impl ServerWatch {
    /// Nothing was launched; [`ServerWatch::exited`] never resolves
    pub fn detached() -> Self {
        Self {
            pid: None,
            exit: None,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Resolves once the server has exited without being asked to
    pub async fn exited(&self) -> ProcessError {
        if let Some(mut exit) = self.exit.clone() {
            if let Ok(status) = exit.wait_for(Option::is_some).await {
                return ProcessError::ExitedEarly {
                    pid: self.pid.unwrap_or_default(),
                    status: status.clone().unwrap_or_default(),
                };
            }
        }
        std::future::pending().await
    }
}

/// Starts the server and guarantees it is stopped
pub struct ProcessLifecycleManager {
    launcher: Arc<dyn ServerLauncher>,
}

impl ProcessLifecycleManager {
    pub fn new() -> Self {
        Self::with_launcher(Arc::new(ChildLauncher))
    }

    pub fn with_launcher(launcher: Arc<dyn ServerLauncher>) -> Self {
        Self { launcher }
    }

    pub async fn start(&self, spec: &ServerSpec) -> Result<ManagedServer, BenchError> {
        debug!(binary = %spec.binary.display(), env_vars = spec.env.len(), "Launching server");
        let process = self.launcher.launch(spec).await?;
        let server = ManagedServer::running(process, spec.graceful_timeout);
        info!(pid = ?server.id(), binary = %spec.binary.display(), "Server started");
        Ok(server)
    }

    /// Run `body` with a started server, then stop it whatever happened.
    ///
    /// The body gets a [`ServerWatch`] that reports an unprompted exit. A
    /// failed stop is logged and never replaces the body's result. A panic
    /// in the body resumes after the server is stopped.
    pub async fn scoped<F, Fut, T>(&self, spec: &ServerSpec, body: F) -> Result<T, BenchError>
    where
        F: FnOnce(ServerWatch) -> Fut,
        Fut: Future<Output = Result<T, BenchError>>,
    {
        let mut server = self.start(spec).await?;
        let (exit_tx, exit_rx) = watch::channel(None);
        let body = body(ServerWatch {
            pid: server.id(),
            exit: Some(exit_rx),
        });

        let result = AssertUnwindSafe(async {
            tokio::select! {
                result = body => result,
                never = server.publish_exit(exit_tx) => match never {},
            }
        })
        .catch_unwind()
        .await;

        if let Err(e) = server.terminate().await {
            warn!("Failed to stop server cleanly: {}", e);
        }

        match result {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Default for ProcessLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
