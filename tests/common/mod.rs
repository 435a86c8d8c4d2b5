//! In-process fake of the service under test

#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Artificial latency of the data endpoint
pub const DATA_LATENCY: Duration = Duration::from_millis(10);

#[derive(Default)]
pub struct Counters {
    pub health: AtomicUsize,
    pub data: AtomicUsize,
    /// Health probes answered with 503 before the service reports ready
    pub unhealthy_for: usize,
}

pub struct FakeService {
    pub base_url: String,
    pub counters: Arc<Counters>,
}

impl FakeService {
    pub fn health_calls(&self) -> usize {
        self.counters.health.load(Ordering::SeqCst)
    }

    pub fn data_calls(&self) -> usize {
        self.counters.data.load(Ordering::SeqCst)
    }
}

async fn status(State(counters): State<Arc<Counters>>) -> StatusCode {
    let call = counters.health.fetch_add(1, Ordering::SeqCst);
    if call < counters.unhealthy_for {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn items(State(counters): State<Arc<Counters>>) -> Json<serde_json::Value> {
    counters.data.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(DATA_LATENCY).await;
    Json(serde_json::json!({ "items": [] }))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Serve `/status`, `/benchmarkitems` and `/broken` on an ephemeral port
pub async fn spawn_service(unhealthy_for: usize) -> anyhow::Result<FakeService> {
    let counters = Arc::new(Counters {
        unhealthy_for,
        ..Default::default()
    });

    let app = Router::new()
        .route("/status", get(status))
        .route("/benchmarkitems", get(items))
        .route("/broken", get(broken))
        .with_state(counters.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(FakeService {
        base_url: format!("http://{}", addr),
        counters,
    })
}

/// A base URL nothing listens on
pub async fn closed_base_url() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}
