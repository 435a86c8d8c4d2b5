//! HTTP client functionality for volley
//!
//! This crate provides the request-shape types ([`HttpMethod`], [`Target`])
//! and the [`HttpClient`] seam the attack engine drives. [`ReqwestClient`]
//! is the production implementation; tests substitute their own.

pub mod client;
pub mod errors;
pub mod target;
pub mod types;

// Re-export main types for convenience
pub use client::{HttpClient, HttpResponse, ReqwestClient};
pub use errors::HttpError;
pub use target::Target;
pub use types::{status_description, HttpMethod, HttpMethodError};
