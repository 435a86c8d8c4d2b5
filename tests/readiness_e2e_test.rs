//! Readiness probing against live and absent services

mod common;

use anyhow::Result;
use common::{closed_base_url, spawn_service};
use std::sync::Arc;
use std::time::Duration;
use volley_config::HttpConfig;
use volley_core::{Attacker, BenchError, Benchmark, BenchmarkPlan, PlanCell, ReadinessProber};
use volley_http::ReqwestClient;
use volley_resilience::CancellationSource;

fn prober(budget: Duration) -> Result<ReadinessProber> {
    let config = HttpConfig {
        timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let client = ReqwestClient::with_config(&config)?;
    Ok(ReadinessProber::new(
        Attacker::new(Arc::new(client)),
        "/status",
        budget,
        Duration::from_millis(100),
    ))
}

#[tokio::test]
async fn test_ready_after_unhealthy_probes() -> Result<()> {
    let service = spawn_service(3).await?;

    let report = prober(Duration::from_secs(5))?
        .wait_until_ready(&service.base_url, &CancellationSource::new().token())
        .await?;

    assert!(report.ready);
    assert_eq!(report.attempts, 4);
    assert_eq!(service.health_calls(), 4);
    assert!(report.elapsed >= Duration::from_millis(400));
    Ok(())
}

#[tokio::test]
async fn test_not_ready_when_nothing_listens() -> Result<()> {
    let base_url = closed_base_url().await?;
    let budget = Duration::from_millis(500);

    let report = prober(budget)?
        .wait_until_ready(&base_url, &CancellationSource::new().token())
        .await?;

    assert!(!report.ready);
    assert!(report.attempts >= 1);
    assert!(report.elapsed >= budget);
    Ok(())
}

#[tokio::test]
async fn test_benchmark_fails_fast_when_target_never_ready() -> Result<()> {
    let base_url = closed_base_url().await?;
    let plan = BenchmarkPlan::new(vec![PlanCell::new(10, 1, Duration::from_secs(1))])?;

    let benchmark = Benchmark::builder(base_url, plan)
        .readiness(Duration::from_millis(300), Duration::from_millis(100))
        .build()?;

    let err = benchmark
        .run(&CancellationSource::new().token())
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::ReadinessTimeout { .. }));
    assert!(err.to_string().starts_with("Server failed to start within 300ms"));
    Ok(())
}
