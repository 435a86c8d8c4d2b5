//! Resilience patterns for volley
//!
//! This crate provides run-wide cancellation and graceful shutdown of
//! external processes.

pub mod cancel;
pub mod shutdown;

// Re-export commonly used types
pub use cancel::{CancelReason, Cancellation, CancellationSource};
pub use shutdown::{ProcessShutdownManager, ShutdownError};
