//! Relayer: publishes unpublished outbox rows to the bus.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fulfillment_domain::CloudEvent;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::publisher::BusPublisher;
use crate::store::OutboxStore;

/// Relayer configuration. Backoff mirrors the activity retry policy shape
/// (spec §4.3: "same policy as C2 retries, unbounded attempts") but the
/// relayer never gives up — only `poll_interval`/`batch_size` bound its pace.
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_coefficient: f64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 100,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_coefficient: 2.0,
        }
    }
}

/// Background task that relays unpublished [`fulfillment_domain::OutboxEvent`]
/// rows to the bus, in insertion order per `aggregate_id` (spec §4.3 ordering
/// guarantee — no cross-aggregate ordering is guaranteed).
pub struct Relayer<S: OutboxStore, P: BusPublisher> {
    store: Arc<S>,
    publisher: Arc<P>,
    config: RelayerConfig,
    backlog: Arc<AtomicU32>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S: OutboxStore, P: BusPublisher> Relayer<S, P> {
    pub fn new(store: Arc<S>, publisher: Arc<P>, config: RelayerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            publisher,
            config,
            backlog: Arc::new(AtomicU32::new(0)),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Current backlog depth, a gauge-style accessor the same shape as
    /// `WorkerPool::current_load()` (spec §4.3 "monitored via backlog depth").
    pub fn backlog_depth(&self) -> u32 {
        self.backlog.load(Ordering::Relaxed)
    }

    /// Run one poll-publish-mark cycle. Public so tests and the replay
    /// harness can drive the relayer deterministically without a background loop.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize, crate::store::OutboxError> {
        let rows = self.store.unpublished(self.config.batch_size).await?;
        self.backlog.store(rows.len() as u32, Ordering::Relaxed);

        let mut blocked_aggregates: HashSet<String> = HashSet::new();
        let mut published = 0usize;

        for row in rows {
            if blocked_aggregates.contains(&row.aggregate_id) {
                // Preserve per-aggregate ordering: don't skip ahead past a failure.
                continue;
            }

            if let Some(last_attempt) = row.last_attempt_at {
                let due_at = last_attempt
                    + chrono::Duration::from_std(self.backoff_for_attempt(row.attempts))
                        .unwrap_or(chrono::Duration::seconds(60));
                if chrono::Utc::now() < due_at {
                    debug!(event_id = %row.event_id, attempts = row.attempts, "outbox row not yet due for retry");
                    continue;
                }
            }

            let event: CloudEvent = match serde_json::from_value(row.cloud_event_json.clone()) {
                Ok(e) => e,
                Err(e) => {
                    error!(event_id = %row.event_id, %e, "outbox row holds malformed CloudEvent json");
                    blocked_aggregates.insert(row.aggregate_id.clone());
                    continue;
                }
            };

            match self.publisher.publish(&row.topic, &event).await {
                Ok(()) => {
                    self.store.mark_published(row.event_id).await?;
                    published += 1;
                    debug!(event_id = %row.event_id, topic = %row.topic, "relayed outbox row");
                }
                Err(err) => {
                    warn!(event_id = %row.event_id, %err, attempts = row.attempts, "bus publish failed, will retry");
                    self.store.bump_attempts(row.event_id).await?;
                    blocked_aggregates.insert(row.aggregate_id.clone());
                }
            }
        }

        Ok(published)
    }

    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self.config.initial_backoff.as_millis() as f64
            * self.config.backoff_coefficient.powi(attempt as i32);
        Duration::from_millis(millis.min(self.config.max_backoff.as_millis() as f64) as u64)
    }

    /// Spawn the background poll loop. Returns a handle the caller can await
    /// on shutdown; call [`Self::shutdown`] first to stop the loop cleanly.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let poll_interval = self.config.poll_interval;
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::spawn(async move {
            info!("outbox relayer starting");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {
                        if let Err(e) = self.run_once().await {
                            error!(%e, "relayer poll cycle failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("outbox relayer shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::InMemoryBusPublisher;
    use crate::store::InMemoryOutboxStore;
    use fulfillment_domain::{topics, CloudEvent, OutboxEvent};

    fn outbox_row(aggregate_id: &str) -> OutboxEvent {
        let event = CloudEvent::new(
            "wms/orders",
            "wms.order.received",
            aggregate_id,
            serde_json::json!({"orderId": aggregate_id}),
        );
        OutboxEvent::new(
            aggregate_id,
            "order",
            topics::ORDERS,
            serde_json::to_value(&event).unwrap(),
        )
    }

    #[tokio::test]
    async fn run_once_publishes_and_marks() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let publisher = Arc::new(InMemoryBusPublisher::new());
        store.insert(outbox_row("ORD-1")).await.unwrap();

        let relayer = Relayer::new(store.clone(), publisher.clone(), RelayerConfig::default());
        let n = relayer.run_once().await.unwrap();

        assert_eq!(n, 1);
        assert_eq!(store.backlog_depth().await.unwrap(), 0);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn failure_blocks_only_that_aggregate_preserving_order() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let publisher = Arc::new(InMemoryBusPublisher::new());

        let mut first = outbox_row("ORD-1");
        let mut second = first.clone();
        second.event_id = uuid::Uuid::now_v7();
        second.created_at = first.created_at + chrono::Duration::milliseconds(1);
        let other = outbox_row("ORD-2");
        first.event_id = uuid::Uuid::now_v7();

        store.insert(first.clone()).await.unwrap();
        store.insert(second.clone()).await.unwrap();
        store.insert(other.clone()).await.unwrap();

        publisher.fail_next(1); // only the first publish call fails

        let relayer = Relayer::new(store.clone(), publisher.clone(), RelayerConfig::default());
        relayer.run_once().await.unwrap();

        // ORD-1's second event must not have been relayed ahead of its failed first.
        let remaining = store.unpublished(10).await.unwrap();
        let remaining_ids: Vec<_> = remaining.iter().map(|r| r.event_id).collect();
        assert!(remaining_ids.contains(&first.event_id));
        assert!(remaining_ids.contains(&second.event_id));
        assert!(!remaining_ids.contains(&other.event_id));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let publisher = Arc::new(InMemoryBusPublisher::new());
        let relayer = Relayer::new(
            store,
            publisher,
            RelayerConfig {
                initial_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(10),
                backoff_coefficient: 2.0,
                ..RelayerConfig::default()
            },
        );

        assert_eq!(relayer.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(relayer.backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(relayer.backoff_for_attempt(10), Duration::from_secs(10));
    }
}
