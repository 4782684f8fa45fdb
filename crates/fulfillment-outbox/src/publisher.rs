//! `BusPublisher`: the relayer's bus-agnostic publish seam.

use async_trait::async_trait;
use fulfillment_domain::CloudEvent;
use parking_lot::Mutex;
use std::sync::Arc;

/// Error publishing to the bus. Always treated as retryable by the relayer
/// (spec §4.3: "bus unreachable -> rows accumulate; relayer retries forever").
#[derive(Debug, thiserror::Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Publishes a CloudEvent to a topic. Concrete bus adapters (Kafka, SQS,
/// NATS, ...) implement this; the relayer only needs the trait, matching
/// spec §5's requirement that the core stay bus-agnostic, only asserting an
/// idempotent-producer-shaped interface (`acks=all` is the adapter's job).
#[async_trait]
pub trait BusPublisher: Send + Sync + 'static {
    async fn publish(&self, topic: &str, event: &CloudEvent) -> Result<(), PublishError>;
}

/// In-memory fake publisher, grounded in the runtime's own
/// in-memory-store-as-test-double convention. Records every publish for
/// assertions; never fails unless configured to via [`Self::fail_next`].
#[derive(Clone, Default)]
pub struct InMemoryBusPublisher {
    published: Arc<Mutex<Vec<(String, CloudEvent)>>>,
    fail_next: Arc<Mutex<u32>>,
}

impl InMemoryBusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` publish calls fail, to exercise the relayer's retry path.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock() = n;
    }

    pub fn published(&self) -> Vec<(String, CloudEvent)> {
        self.published.lock().clone()
    }

    pub fn published_ids(&self) -> Vec<String> {
        self.published.lock().iter().map(|(_, e)| e.id.clone()).collect()
    }
}

#[async_trait]
impl BusPublisher for InMemoryBusPublisher {
    async fn publish(&self, topic: &str, event: &CloudEvent) -> Result<(), PublishError> {
        {
            let mut remaining = self.fail_next.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PublishError("simulated bus outage".to_string()));
            }
        }
        self.published.lock().push((topic.to_string(), event.clone()));
        Ok(())
    }
}
