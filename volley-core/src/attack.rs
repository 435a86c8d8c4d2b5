//! Attack engine
//!
//! Issues requests against one [`Target`] at a fixed [`Rate`] for a fixed
//! duration. Request `i` is due at `start + i * interval`; requests are
//! issued while that offset is below the duration, so an attack issues
//! `ceil(duration / interval)` requests when the target keeps up, and
//! lasts at least the full duration. Each request runs in its own task and
//! reports through a bounded channel; the channel closes once the window has
//! elapsed and every in-flight task has finished, which ends the
//! [`OutcomeStream`].

use crate::outcome::Outcome;
use crate::rate::Rate;
use chrono::Utc;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use volley_config::AttackConfig;
use volley_http::{HttpClient, Target};
use volley_resilience::Cancellation;

/// Paces requests and yields one [`Outcome`] per request
#[derive(Clone)]
pub struct Attacker {
    client: Arc<dyn HttpClient>,
    max_in_flight: usize,
    channel_capacity: usize,
}

impl Attacker {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self::with_config(client, &AttackConfig::default())
    }

    pub fn with_config(client: Arc<dyn HttpClient>, config: &AttackConfig) -> Self {
        Self {
            client,
            max_in_flight: config.max_in_flight.max(1),
            channel_capacity: config.channel_capacity.max(1),
        }
    }

    /// Issue a single request outside of any attack
    pub async fn hit(&self, target: &Target, label: &str) -> Outcome {
        hit(self.client.as_ref(), target, label).await
    }

    /// Start an attack. The returned stream is finite and not restartable.
    ///
    /// Cancelling stops issuing new requests and aborts those in flight;
    /// the stream then closes with whatever outcomes were already sent.
    pub fn attack(
        &self,
        target: Target,
        rate: Rate,
        duration: Duration,
        label: &str,
        cancel: &Cancellation,
    ) -> OutcomeStream {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let scheduler = Scheduler {
            client: self.client.clone(),
            target: Arc::new(target),
            label: Arc::from(label),
            permits: Arc::new(Semaphore::new(self.max_in_flight)),
            cancel: cancel.clone(),
        };

        debug!(
            label,
            rate = %rate,
            ?duration,
            max_in_flight = self.max_in_flight,
            "Starting attack"
        );
        let scheduler = tokio::spawn(scheduler.run(rate, duration, tx));

        OutcomeStream {
            inner: ReceiverStream::new(rx),
            scheduler,
        }
    }
}

struct Scheduler {
    client: Arc<dyn HttpClient>,
    target: Arc<Target>,
    label: Arc<str>,
    permits: Arc<Semaphore>,
    cancel: Cancellation,
}

impl Scheduler {
    async fn run(self, rate: Rate, duration: Duration, tx: mpsc::Sender<Outcome>) {
        let Some(interval) = rate.interval() else {
            return;
        };

        let start = Instant::now();
        let mut in_flight = JoinSet::new();
        let mut issued: u64 = 0;

        loop {
            let offset = interval.saturating_mul(u32::try_from(issued).unwrap_or(u32::MAX));
            if offset >= duration {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tx.closed() => break,
                _ = tokio::time::sleep_until(start + offset) => {}
            }

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tx.closed() => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // Saturated past the window: the remaining schedule is forfeit
            if start.elapsed() >= duration {
                break;
            }

            issued += 1;
            let client = self.client.clone();
            let target = self.target.clone();
            let label = self.label.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let outcome = hit(client.as_ref(), &target, &label).await;
                drop(permit);
                // Receiver gone means the consumer stopped listening
                let _ = tx.send(outcome).await;
            });
        }

        // The attack occupies its whole window even when the schedule ran out early
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = tx.closed() => {}
            _ = tokio::time::sleep_until(start + duration) => {}
        }

        // Cancelled or abandoned: drop what is still in flight
        if self.cancel.is_cancelled() || tx.is_closed() {
            in_flight.abort_all();
        }
        drop(tx);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !in_flight.is_empty() => {
                    in_flight.abort_all();
                    while in_flight.join_next().await.is_some() {}
                    break;
                }
                next = in_flight.join_next() => match next {
                    Some(Err(e)) if e.is_panic() => warn!("Request task panicked: {}", e),
                    Some(_) => {}
                    None => break,
                },
            }
        }

        debug!(
            label = %self.label,
            issued,
            elapsed = ?start.elapsed(),
            "Attack finished"
        );
    }
}

async fn hit(client: &dyn HttpClient, target: &Target, label: &str) -> Outcome {
    let timestamp = Utc::now();
    let started = Instant::now();
    let result = client.execute(target).await;
    let latency = started.elapsed();

    match result {
        Ok(response) => Outcome::from_response(label, response, latency, timestamp),
        Err(e) => Outcome::transport_failure(label, e.to_string(), latency, timestamp),
    }
}

/// Outcomes of one attack, in completion order.
///
/// Dropping the stream stops the attack: no further requests are issued and
/// those in flight are aborted.
pub struct OutcomeStream {
    inner: ReceiverStream<Outcome>,
    scheduler: JoinHandle<()>,
}

impl Drop for OutcomeStream {
    fn drop(&mut self) {
        self.scheduler.abort();
    }
}

impl OutcomeStream {
    pub async fn recv(&mut self) -> Option<Outcome> {
        self.inner.as_mut().recv().await
    }

    /// Drain to completion
    pub async fn collect_all(mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

impl Stream for OutcomeStream {
    type Item = Outcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedClient;
    use super::*;
    use volley_resilience::{CancelReason, CancellationSource};

    fn target() -> Target {
        Target::get("http://localhost:3001", "/benchmarkitems?limit=10").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_attack_issues_expected_count() {
        let client = Arc::new(ScriptedClient::always(200, Duration::from_millis(10)));
        let attacker = Attacker::new(client.clone());

        let outcomes = attacker
            .attack(
                target(),
                Rate::per_second(10),
                Duration::from_secs(1),
                "c10",
                &Cancellation::never(),
            )
            .collect_all()
            .await;

        assert_eq!(outcomes.len(), 10);
        assert_eq!(client.calls(), 10);
        assert!(outcomes.iter().all(|o| o.is_success() && o.label == "c10"));
        assert!(outcomes.iter().all(|o| o.latency >= Duration::from_millis(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_outcomes_not_errors() {
        let client = Arc::new(ScriptedClient::scripted(
            vec![Ok(500), Err("connection refused".to_string())],
            200,
        ));
        let attacker = Attacker::new(client);

        let outcomes = attacker
            .attack(
                target(),
                Rate::per_second(5),
                Duration::from_secs(1),
                "mixed",
                &Cancellation::never(),
            )
            .collect_all()
            .await;

        assert_eq!(outcomes.len(), 5);
        let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_success()).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().any(|o| o.status == 500));
        assert!(failed.iter().any(|o| o.status == crate::TRANSPORT_FAILURE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_cap_slows_pacing() {
        let client = Arc::new(ScriptedClient::always(200, Duration::from_millis(500)));
        let config = AttackConfig {
            max_in_flight: 1,
            ..Default::default()
        };
        let attacker = Attacker::with_config(client, &config);

        let outcomes = attacker
            .attack(
                target(),
                Rate::per_second(100),
                Duration::from_secs(1),
                "capped",
                &Cancellation::never(),
            )
            .collect_all()
            .await;

        // one request every 500ms fits twice in the window
        assert_eq!(outcomes.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_attack() {
        let client = Arc::new(ScriptedClient::always(200, Duration::from_millis(5)));
        let attacker = Attacker::new(client.clone());
        let source = CancellationSource::new();
        source.cancel_after(Duration::from_millis(250));

        let started = Instant::now();
        let outcomes = attacker
            .attack(
                target(),
                Rate::per_second(10),
                Duration::from_secs(10),
                "cancelled",
                &source.token(),
            )
            .collect_all()
            .await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(outcomes.len() <= 3);
        assert_eq!(source.token().reason(), Some(CancelReason::Deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_stays_open_for_whole_window() {
        let client = Arc::new(ScriptedClient::always(200, Duration::from_millis(1)));
        let attacker = Attacker::new(client);

        let started = Instant::now();
        let outcomes = attacker
            .attack(
                target(),
                Rate::per_second(1),
                Duration::from_secs(1),
                "c1",
                &Cancellation::never(),
            )
            .collect_all()
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_stops_requests() {
        let client = Arc::new(ScriptedClient::always(200, Duration::from_millis(1)));
        let attacker = Attacker::new(client.clone());

        let stream = attacker.attack(
            target(),
            Rate::per_second(10),
            Duration::from_secs(1),
            "abandoned",
            &Cancellation::never(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        let calls_at_drop = client.calls();
        drop(stream);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls_at_drop, 1);
        assert_eq!(client.calls(), calls_at_drop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_yields_empty_stream() {
        let attacker = Attacker::new(Arc::new(ScriptedClient::always(200, Duration::ZERO)));
        let outcomes = attacker
            .attack(
                target(),
                Rate::per_second(0),
                Duration::from_secs(1),
                "idle",
                &Cancellation::never(),
            )
            .collect_all()
            .await;
        assert!(outcomes.is_empty());
    }
}
