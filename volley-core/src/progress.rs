//! Progress notifications
//!
//! An optional side channel for human-facing status messages. Callers that
//! don't care pass [`NoopProgress`].

/// Receives progress messages from the driver and matrix runner
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, message: &str);
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _message: &str) {}
}

/// Adapts a closure into an observer
pub struct ProgressFn<F>(pub F);

impl<F> ProgressObserver for ProgressFn<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn on_progress(&self, message: &str) {
        (self.0)(message)
    }
}
