//! `OutboxStore`: same-transaction aggregate + event write.

use async_trait::async_trait;
use chrono::Utc;
use fulfillment_domain::OutboxEvent;
use parking_lot::Mutex;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Errors from outbox store operations.
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("row not found: {0}")]
    NotFound(Uuid),
}

/// Store for outbox rows and the relayer's scan over them.
///
/// Implementations must persist the outbox row atomically with whatever
/// aggregate write produced it — this trait only models the outbox side;
/// callers are expected to run `insert_with_aggregate` inside the same
/// database transaction as their aggregate `upsert` (spec §4.3 step 1).
#[async_trait]
pub trait OutboxStore: Send + Sync + 'static {
    /// Insert one outbox row. Implementations backed by a real database
    /// should expose a transactional variant (see
    /// [`PostgresOutboxStore::insert_with_aggregate_tx`]) for combining this
    /// with the aggregate write; this method alone only guarantees the
    /// outbox row itself is durable.
    async fn insert(&self, event: OutboxEvent) -> Result<(), OutboxError>;

    /// Unpublished rows ordered `(published_at IS NULL, created_at ASC)`
    /// (spec §6.5 index), oldest first, per the relayer's scan window.
    async fn unpublished(&self, limit: usize) -> Result<Vec<OutboxEvent>, OutboxError>;

    /// Mark a row published.
    async fn mark_published(&self, event_id: Uuid) -> Result<(), OutboxError>;

    /// Bump the attempt counter after a failed publish (exponential backoff
    /// is computed by the [`crate::Relayer`], not stored here).
    async fn bump_attempts(&self, event_id: Uuid) -> Result<(), OutboxError>;

    /// Count of unpublished rows, exposed for the `backlog_depth` gauge
    /// named in spec §4.3 failure modes.
    async fn backlog_depth(&self) -> Result<u64, OutboxError>;
}

/// Postgres-backed outbox store.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the outbox row as part of an already-open transaction that
    /// also writes the aggregate mutation — the combination this whole
    /// pattern exists to make atomic (spec §4.3 step 1, invariant 1).
    #[instrument(skip(self, tx, event))]
    pub async fn insert_with_aggregate_tx<'a>(
        &self,
        tx: &mut sqlx::Transaction<'a, sqlx::Postgres>,
        event: &OutboxEvent,
    ) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            INSERT INTO outbox
                (event_id, aggregate_id, aggregate_type, topic, cloud_event_json,
                 created_at, published_at, attempts, last_attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.event_id)
        .bind(&event.aggregate_id)
        .bind(&event.aggregate_type)
        .bind(&event.topic)
        .bind(&event.cloud_event_json)
        .bind(event.created_at)
        .bind(event.published_at)
        .bind(event.attempts as i32)
        .bind(event.last_attempt_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            error!("failed to insert outbox row: {}", e);
            OutboxError::Database(e.to_string())
        })?;

        debug!(event_id = %event.event_id, "outbox row inserted in aggregate transaction");
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn insert(&self, event: OutboxEvent) -> Result<(), OutboxError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| OutboxError::Database(e.to_string()))?;
        self.insert_with_aggregate_tx(&mut tx, &event).await?;
        tx.commit()
            .await
            .map_err(|e| OutboxError::Database(e.to_string()))?;
        Ok(())
    }

    async fn unpublished(&self, limit: usize) -> Result<Vec<OutboxEvent>, OutboxError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_id, aggregate_type, topic, cloud_event_json,
                   created_at, published_at, attempts, last_attempt_at
            FROM outbox
            WHERE published_at IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OutboxError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(OutboxEvent {
                    event_id: row.try_get("event_id").map_err(db_err)?,
                    aggregate_id: row.try_get("aggregate_id").map_err(db_err)?,
                    aggregate_type: row.try_get("aggregate_type").map_err(db_err)?,
                    topic: row.try_get("topic").map_err(db_err)?,
                    cloud_event_json: row.try_get("cloud_event_json").map_err(db_err)?,
                    created_at: row.try_get("created_at").map_err(db_err)?,
                    published_at: row.try_get("published_at").map_err(db_err)?,
                    attempts: row.try_get::<i32, _>("attempts").map_err(db_err)? as u32,
                    last_attempt_at: row.try_get("last_attempt_at").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn mark_published(&self, event_id: Uuid) -> Result<(), OutboxError> {
        sqlx::query("UPDATE outbox SET published_at = $1 WHERE event_id = $2")
            .bind(Utc::now())
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| OutboxError::Database(e.to_string()))?;
        Ok(())
    }

    async fn bump_attempts(&self, event_id: Uuid) -> Result<(), OutboxError> {
        sqlx::query(
            "UPDATE outbox SET attempts = attempts + 1, last_attempt_at = $1 WHERE event_id = $2",
        )
        .bind(Utc::now())
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxError::Database(e.to_string()))?;
        Ok(())
    }

    async fn backlog_depth(&self) -> Result<u64, OutboxError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM outbox WHERE published_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| OutboxError::Database(e.to_string()))?;
        Ok(row.try_get::<i64, _>("n").map_err(db_err)? as u64)
    }
}

fn db_err(e: sqlx::Error) -> OutboxError {
    OutboxError::Database(e.to_string())
}

/// In-memory outbox store: a legitimate single-process deployment target and
/// a test double, mirroring the runtime's own `InMemoryWorkflowEventStore`
/// convention.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    rows: Arc<Mutex<BTreeMap<Uuid, OutboxEvent>>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn insert(&self, event: OutboxEvent) -> Result<(), OutboxError> {
        self.rows.lock().insert(event.event_id, event);
        Ok(())
    }

    async fn unpublished(&self, limit: usize) -> Result<Vec<OutboxEvent>, OutboxError> {
        let rows = self.rows.lock();
        let mut unpublished: Vec<OutboxEvent> = rows
            .values()
            .filter(|e| !e.is_published())
            .cloned()
            .collect();
        unpublished.sort_by_key(|e| e.created_at);
        unpublished.truncate(limit);
        Ok(unpublished)
    }

    async fn mark_published(&self, event_id: Uuid) -> Result<(), OutboxError> {
        let mut rows = self.rows.lock();
        let row = rows
            .get_mut(&event_id)
            .ok_or(OutboxError::NotFound(event_id))?;
        row.published_at = Some(Utc::now());
        Ok(())
    }

    async fn bump_attempts(&self, event_id: Uuid) -> Result<(), OutboxError> {
        let mut rows = self.rows.lock();
        let row = rows
            .get_mut(&event_id)
            .ok_or(OutboxError::NotFound(event_id))?;
        row.attempts += 1;
        row.last_attempt_at = Some(Utc::now());
        Ok(())
    }

    async fn backlog_depth(&self) -> Result<u64, OutboxError> {
        Ok(self.rows.lock().values().filter(|e| !e.is_published()).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unpublished_rows_ordered_by_created_at() {
        let store = InMemoryOutboxStore::new();
        let older = OutboxEvent::new("ORD-1", "order", "wms.orders.events", serde_json::json!({}));
        let mut newer =
            OutboxEvent::new("ORD-1", "order", "wms.orders.events", serde_json::json!({}));
        newer.created_at = older.created_at + chrono::Duration::seconds(1);

        store.insert(newer.clone()).await.unwrap();
        store.insert(older.clone()).await.unwrap();

        let rows = store.unpublished(10).await.unwrap();
        assert_eq!(rows[0].event_id, older.event_id);
        assert_eq!(rows[1].event_id, newer.event_id);
    }

    #[tokio::test]
    async fn mark_published_removes_from_backlog() {
        let store = InMemoryOutboxStore::new();
        let event = OutboxEvent::new("ORD-1", "order", "wms.orders.events", serde_json::json!({}));
        store.insert(event.clone()).await.unwrap();
        assert_eq!(store.backlog_depth().await.unwrap(), 1);

        store.mark_published(event.event_id).await.unwrap();
        assert_eq!(store.backlog_depth().await.unwrap(), 0);
    }
}
