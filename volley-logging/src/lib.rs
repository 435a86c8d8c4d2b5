//! Logging setup for volley
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for
//! benchmark reports.

mod init;

pub use init::{build_filter, init_simple_tracing, init_tracing};
