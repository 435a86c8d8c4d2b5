//! Per-request result records

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use volley_http::{status_description, HttpResponse};

/// Status recorded when no HTTP exchange completed
pub const TRANSPORT_FAILURE: u16 = 0;

/// One issued request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub label: String,
    pub status: u16,
    #[serde(with = "humantime_serde")]
    pub latency: Duration,
    pub bytes_in: u64,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    /// Outcome for a completed exchange; non-2xx statuses carry an error
    pub fn from_response(
        label: impl Into<String>,
        response: HttpResponse,
        latency: Duration,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let error = if (200..300).contains(&response.status) {
            None
        } else {
            Some(status_description(response.status))
        };
        Self {
            label: label.into(),
            status: response.status,
            latency,
            bytes_in: response.bytes_in,
            error,
            timestamp,
        }
    }

    /// Outcome for a request that never got a response
    pub fn transport_failure(
        label: impl Into<String>,
        error: impl Into<String>,
        latency: Duration,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            label: label.into(),
            status: TRANSPORT_FAILURE,
            latency,
            bytes_in: 0,
            error: Some(error.into()),
            timestamp,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_2xx_carries_error() {
        let ok = Outcome::from_response(
            "cell",
            HttpResponse { status: 204, bytes_in: 0 },
            Duration::from_millis(3),
            Utc::now(),
        );
        assert!(ok.is_success());

        let failed = Outcome::from_response(
            "cell",
            HttpResponse { status: 503, bytes_in: 19 },
            Duration::from_millis(3),
            Utc::now(),
        );
        assert!(!failed.is_success());
        assert_eq!(failed.error.as_deref(), Some("503 Service Unavailable"));
    }

    #[test]
    fn test_transport_failure_uses_sentinel() {
        let outcome = Outcome::transport_failure(
            "cell",
            "connection refused",
            Duration::from_millis(1),
            Utc::now(),
        );
        assert_eq!(outcome.status, TRANSPORT_FAILURE);
        assert!(!outcome.is_success());
    }
}
