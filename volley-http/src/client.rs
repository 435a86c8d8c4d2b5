//! HTTP client implementation

use crate::errors::HttpError;
use crate::target::Target;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, trace};
use volley_config::HttpConfig;

/// What the attack engine needs to know about a completed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub bytes_in: u64,
}

/// HTTP client trait for issuing benchmark requests
///
/// Implementations must read the response body to completion so measured
/// latency covers the full exchange.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, target: &Target) -> Result<HttpResponse, HttpError>;
}

/// reqwest-backed client shared by every in-flight request
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Create a client with specific configuration
    pub fn with_config(config: &HttpConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating HTTP client with timeout: {}s",
            config.timeout.as_secs()
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    /// Same client with a different per-request timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            client: self.client.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, target: &Target) -> Result<HttpResponse, HttpError> {
        trace!("Sending {}", target);

        let response = self
            .client
            .request(target.method().into(), target.url())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(e, self.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::from_reqwest(e, self.timeout))?;

        trace!("{} -> {} ({} bytes)", target, status, body.len());

        Ok(HttpResponse {
            status,
            bytes_in: body.len() as u64,
        })
    }
}
