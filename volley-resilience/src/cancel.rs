//! Run-wide cancellation
//!
//! A [`CancellationSource`] owns the trigger; any number of cloned
//! [`Cancellation`] tokens observe it. The first reason recorded wins.

use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Why a run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Interrupt signal from the terminal
    Interrupted,
    /// Overall deadline elapsed
    Deadline,
    /// Cancelled programmatically
    Requested,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Interrupted => write!(f, "interrupted"),
            CancelReason::Deadline => write!(f, "deadline exceeded"),
            CancelReason::Requested => write!(f, "cancellation requested"),
        }
    }
}

/// Trigger side of a cancellation
#[derive(Debug, Clone)]
pub struct CancellationSource {
    sender: std::sync::Arc<watch::Sender<Option<CancelReason>>>,
}

impl CancellationSource {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: std::sync::Arc::new(sender),
        }
    }

    /// New observer token
    pub fn token(&self) -> Cancellation {
        Cancellation {
            receiver: self.sender.subscribe(),
        }
    }

    /// Record `reason` unless a reason is already set. Returns whether this call cancelled.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let fired = self.sender.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if fired {
            info!("Cancelling run: {}", reason);
        }
        fired
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Cancel with [`CancelReason::Deadline`] once `after` has elapsed
    pub fn cancel_after(&self, after: Duration) -> JoinHandle<()> {
        let source = self.clone();
        debug!("Run deadline set to {:?}", after);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            source.cancel(CancelReason::Deadline);
        })
    }

    /// Cancel with [`CancelReason::Interrupted`] on the first Ctrl-C
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let source = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                source.cancel(CancelReason::Interrupted);
            }
        })
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation
#[derive(Debug, Clone)]
pub struct Cancellation {
    receiver: watch::Receiver<Option<CancelReason>>,
}

impl Cancellation {
    /// A token that never fires
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(None);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.receiver.borrow()
    }

    /// Resolves once cancelled. Pends forever if the source is dropped first.
    pub async fn cancelled(&self) -> CancelReason {
        let mut receiver = self.receiver.clone();
        let result = receiver
            .wait_for(Option::is_some)
            .await
            .map(|reason| (*reason).unwrap_or(CancelReason::Requested));
        match result {
            Ok(reason) => reason,
            Err(_) => std::future::pending().await,
        }
    }
}
