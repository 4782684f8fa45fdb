//! `ConsumedMessageStore`: atomic bus-message dedup (spec §4.4, §3.1).

use async_trait::async_trait;
use chrono::{Duration, Utc};
use fulfillment_domain::ConsumedMessage;
use parking_lot::Mutex;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default retention for a `ConsumedMessage` row (spec §6.4
/// `idempotency.retention`, shared with request idempotency).
pub const DEFAULT_TTL: Duration = Duration::hours(24);

#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error("database error: {0}")]
    Database(String),
}

#[async_trait]
pub trait ConsumedMessageStore: Send + Sync + 'static {
    /// Atomically insert `(consumer_group, topic, cloud_event_id)` if absent.
    /// Returns `true` if this call inserted the row (message is new and
    /// should be processed), `false` if a row already existed (duplicate
    /// delivery, skip processing).
    async fn try_mark_processed(
        &self,
        consumer_group: &str,
        topic: &str,
        cloud_event_id: &str,
    ) -> Result<bool, DedupError>;
}

/// Postgres-backed dedup store. Relies on a unique constraint over
/// `(consumer_group, topic, cloud_event_id)` to make the insert atomic
/// under concurrent consumers of the same group.
#[derive(Clone)]
pub struct PostgresConsumedMessageStore {
    pool: PgPool,
    ttl: Duration,
}

impl PostgresConsumedMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait]
impl ConsumedMessageStore for PostgresConsumedMessageStore {
    #[instrument(skip(self))]
    async fn try_mark_processed(
        &self,
        consumer_group: &str,
        topic: &str,
        cloud_event_id: &str,
    ) -> Result<bool, DedupError> {
        let row = ConsumedMessage::new(consumer_group, topic, cloud_event_id, self.ttl);
        let result = sqlx::query(
            r#"
            INSERT INTO consumed_messages
                (consumer_group, topic, cloud_event_id, processed_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (consumer_group, topic, cloud_event_id) DO NOTHING
            "#,
        )
        .bind(&row.consumer_group)
        .bind(&row.topic)
        .bind(&row.cloud_event_id)
        .bind(row.processed_at)
        .bind(row.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DedupError::Database(e.to_string()))?;

        let inserted = result.rows_affected() == 1;
        debug!(%consumer_group, %topic, %cloud_event_id, inserted, "dedup insert attempted");
        Ok(inserted)
    }
}

/// In-memory dedup store: a legitimate single-process deployment target and
/// a test double.
#[derive(Clone, Default)]
pub struct InMemoryConsumedMessageStore {
    seen: Arc<Mutex<HashSet<(String, String, String)>>>,
}

impl InMemoryConsumedMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsumedMessageStore for InMemoryConsumedMessageStore {
    async fn try_mark_processed(
        &self,
        consumer_group: &str,
        topic: &str,
        cloud_event_id: &str,
    ) -> Result<bool, DedupError> {
        let mut seen = self.seen.lock();
        let key = (
            consumer_group.to_string(),
            topic.to_string(),
            cloud_event_id.to_string(),
        );
        Ok(seen.insert(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_delivery_marks_processed() {
        let store = InMemoryConsumedMessageStore::new();
        let first = store
            .try_mark_processed("picking-service", "wms.orders.events", "evt-1")
            .await
            .unwrap();
        assert!(first);
    }

    #[tokio::test]
    async fn redelivery_is_detected() {
        let store = InMemoryConsumedMessageStore::new();
        store
            .try_mark_processed("picking-service", "wms.orders.events", "evt-1")
            .await
            .unwrap();
        let second = store
            .try_mark_processed("picking-service", "wms.orders.events", "evt-1")
            .await
            .unwrap();
        assert!(!second);
    }

    #[tokio::test]
    async fn distinct_consumer_groups_see_same_event_independently() {
        let store = InMemoryConsumedMessageStore::new();
        let picking = store
            .try_mark_processed("picking-service", "wms.orders.events", "evt-1")
            .await
            .unwrap();
        let packing = store
            .try_mark_processed("packing-service", "wms.orders.events", "evt-1")
            .await
            .unwrap();
        assert!(picking);
        assert!(packing);
    }
}
