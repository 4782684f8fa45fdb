//! `IdempotencyStore`: the request-idempotency state table (spec §4.4).
//!
//! ```text
//! no row               -> begin (in_flight), caller executes
//! in_flight            -> 409 Conflict
//! completed, hash match    -> replay cached response
//! completed, hash mismatch -> 422 idempotency_parameter_mismatch
//! ```

use async_trait::async_trait;
use chrono::{Duration, Utc};
use fulfillment_domain::{IdempotencyKey, IdempotencyState};
use parking_lot::Mutex;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default retention for an `IdempotencyKey` row (spec §6.4 `idempotency.retention`).
pub const DEFAULT_RETENTION: Duration = Duration::hours(24);

#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    #[error("database error: {0}")]
    Database(String),
}

/// Outcome of attempting to begin a request under a given idempotency key.
#[derive(Debug, Clone)]
pub enum BeginOutcome {
    /// No prior row, or the prior row expired: caller should execute the
    /// request and call [`IdempotencyStore::complete`] once it finishes.
    Begin,
    /// A row for this key is mid-execution. Caller returns `409 Conflict`.
    InFlight,
    /// A completed row exists with a matching request hash. Caller replays
    /// the cached status/body without re-executing.
    Replay { status: u16, body: serde_json::Value },
    /// A completed row exists but the request hash differs. Caller returns
    /// `422` with `code: "idempotency_parameter_mismatch"`.
    Mismatch,
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync + 'static {
    /// Look up `(service_name, key)`. If absent or expired, atomically
    /// inserts an `in_flight` row with `request_hash` and returns
    /// [`BeginOutcome::Begin`]. Otherwise returns the state-table verdict.
    async fn begin(
        &self,
        service_name: &str,
        key: &str,
        method: &str,
        path: &str,
        request_hash: &str,
    ) -> Result<BeginOutcome, IdempotencyError>;

    /// Transition an `in_flight` row to `completed`, recording the response
    /// to serve on replay.
    async fn complete(
        &self,
        service_name: &str,
        key: &str,
        status: u16,
        body: serde_json::Value,
    ) -> Result<(), IdempotencyError>;

    /// Remove an `in_flight` row so a later retry can start fresh — used
    /// when request execution itself fails before producing a response
    /// (spec §4.4 does not mandate this, but leaving a dangling in_flight
    /// row would wedge every retry behind a 409 until expiry).
    async fn abandon(&self, service_name: &str, key: &str) -> Result<(), IdempotencyError>;
}

/// Postgres-backed idempotency store.
#[derive(Clone)]
pub struct PostgresIdempotencyStore {
    pool: PgPool,
    retention: Duration,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    #[instrument(skip(self))]
    async fn begin(
        &self,
        service_name: &str,
        key: &str,
        method: &str,
        path: &str,
        request_hash: &str,
    ) -> Result<BeginOutcome, IdempotencyError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IdempotencyError::Database(e.to_string()))?;

        let existing = sqlx::query(
            r#"
            SELECT state, request_hash, response_status, response_body, expires_at
            FROM idempotency_keys
            WHERE service_name = $1 AND key = $2
            FOR UPDATE
            "#,
        )
        .bind(service_name)
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| IdempotencyError::Database(e.to_string()))?;

        if let Some(row) = existing {
            let expires_at: chrono::DateTime<Utc> = row
                .try_get("expires_at")
                .map_err(|e| IdempotencyError::Database(e.to_string()))?;
            if expires_at > Utc::now() {
                let state: String = row
                    .try_get("state")
                    .map_err(|e| IdempotencyError::Database(e.to_string()))?;
                if state == "in_flight" {
                    return Ok(BeginOutcome::InFlight);
                }

                let stored_hash: String = row
                    .try_get("request_hash")
                    .map_err(|e| IdempotencyError::Database(e.to_string()))?;
                if stored_hash != request_hash {
                    return Ok(BeginOutcome::Mismatch);
                }

                let status: i32 = row
                    .try_get("response_status")
                    .map_err(|e| IdempotencyError::Database(e.to_string()))?;
                let body: serde_json::Value = row
                    .try_get("response_body")
                    .map_err(|e| IdempotencyError::Database(e.to_string()))?;
                return Ok(BeginOutcome::Replay {
                    status: status as u16,
                    body,
                });
            }
        }

        let fresh = IdempotencyKey::new_in_flight(
            key,
            service_name,
            method,
            path,
            request_hash,
            self.retention,
        );
        sqlx::query(
            r#"
            INSERT INTO idempotency_keys
                (key, service_name, method, path, request_hash, state,
                 response_status, response_body, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, 'in_flight', NULL, NULL, $6, $7)
            ON CONFLICT (service_name, key) DO UPDATE SET
                method = EXCLUDED.method,
                path = EXCLUDED.path,
                request_hash = EXCLUDED.request_hash,
                state = 'in_flight',
                response_status = NULL,
                response_body = NULL,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&fresh.key)
        .bind(&fresh.service_name)
        .bind(&fresh.method)
        .bind(&fresh.path)
        .bind(&fresh.request_hash)
        .bind(fresh.created_at)
        .bind(fresh.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| IdempotencyError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| IdempotencyError::Database(e.to_string()))?;

        debug!(%service_name, %key, "idempotency key begun");
        Ok(BeginOutcome::Begin)
    }

    async fn complete(
        &self,
        service_name: &str,
        key: &str,
        status: u16,
        body: serde_json::Value,
    ) -> Result<(), IdempotencyError> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET state = 'completed', response_status = $1, response_body = $2
            WHERE service_name = $3 AND key = $4
            "#,
        )
        .bind(status as i32)
        .bind(body)
        .bind(service_name)
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(|e| IdempotencyError::Database(e.to_string()))?;
        Ok(())
    }

    async fn abandon(&self, service_name: &str, key: &str) -> Result<(), IdempotencyError> {
        sqlx::query("DELETE FROM idempotency_keys WHERE service_name = $1 AND key = $2 AND state = 'in_flight'")
            .bind(service_name)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| IdempotencyError::Database(e.to_string()))?;
        Ok(())
    }
}

#[derive(Clone)]
struct InMemoryRow {
    method: String,
    path: String,
    request_hash: String,
    state: IdempotencyState,
    response_status: Option<u16>,
    response_body: Option<serde_json::Value>,
    expires_at: chrono::DateTime<Utc>,
}

/// In-memory idempotency store: a legitimate single-process deployment
/// target and a test double.
#[derive(Clone, Default)]
pub struct InMemoryIdempotencyStore {
    rows: Arc<Mutex<HashMap<(String, String), InMemoryRow>>>,
    retention: Duration,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(
        &self,
        service_name: &str,
        key: &str,
        method: &str,
        path: &str,
        request_hash: &str,
    ) -> Result<BeginOutcome, IdempotencyError> {
        let mut rows = self.rows.lock();
        let map_key = (service_name.to_string(), key.to_string());

        if let Some(row) = rows.get(&map_key) {
            if row.expires_at > Utc::now() {
                if row.state == IdempotencyState::InFlight {
                    return Ok(BeginOutcome::InFlight);
                }
                if row.request_hash != request_hash {
                    return Ok(BeginOutcome::Mismatch);
                }
                return Ok(BeginOutcome::Replay {
                    status: row.response_status.unwrap_or(200),
                    body: row.response_body.clone().unwrap_or(serde_json::Value::Null),
                });
            }
        }

        rows.insert(
            map_key,
            InMemoryRow {
                method: method.to_string(),
                path: path.to_string(),
                request_hash: request_hash.to_string(),
                state: IdempotencyState::InFlight,
                response_status: None,
                response_body: None,
                expires_at: Utc::now() + self.retention,
            },
        );
        Ok(BeginOutcome::Begin)
    }

    async fn complete(
        &self,
        service_name: &str,
        key: &str,
        status: u16,
        body: serde_json::Value,
    ) -> Result<(), IdempotencyError> {
        let mut rows = self.rows.lock();
        if let Some(row) = rows.get_mut(&(service_name.to_string(), key.to_string())) {
            row.state = IdempotencyState::Completed;
            row.response_status = Some(status);
            row.response_body = Some(body);
        }
        Ok(())
    }

    async fn abandon(&self, service_name: &str, key: &str) -> Result<(), IdempotencyError> {
        let mut rows = self.rows.lock();
        let map_key = (service_name.to_string(), key.to_string());
        if matches!(rows.get(&map_key), Some(r) if r.state == IdempotencyState::InFlight) {
            rows.remove(&map_key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_key_begins_then_in_flight_on_retry() {
        let store = InMemoryIdempotencyStore::new();
        let outcome = store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();
        assert!(matches!(outcome, BeginOutcome::Begin));

        let retry = store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();
        assert!(matches!(retry, BeginOutcome::InFlight));
    }

    #[tokio::test]
    async fn completed_matching_hash_replays() {
        let store = InMemoryIdempotencyStore::new();
        store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();
        store
            .complete("orders-api", "key-1", 201, serde_json::json!({"orderId": "ORD-1"}))
            .await
            .unwrap();

        let outcome = store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();
        match outcome {
            BeginOutcome::Replay { status, body } => {
                assert_eq!(status, 201);
                assert_eq!(body, serde_json::json!({"orderId": "ORD-1"}));
            }
            other => panic!("expected replay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_mismatched_hash_rejected() {
        let store = InMemoryIdempotencyStore::new();
        store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();
        store
            .complete("orders-api", "key-1", 201, serde_json::json!({}))
            .await
            .unwrap();

        let outcome = store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-b")
            .await
            .unwrap();
        assert!(matches!(outcome, BeginOutcome::Mismatch));
    }

    #[tokio::test]
    async fn abandon_clears_in_flight_row() {
        let store = InMemoryIdempotencyStore::new();
        store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();
        store.abandon("orders-api", "key-1").await.unwrap();

        let outcome = store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();
        assert!(matches!(outcome, BeginOutcome::Begin));
    }

    #[tokio::test]
    async fn expired_row_allows_fresh_begin() {
        let store = InMemoryIdempotencyStore::new().with_retention(Duration::milliseconds(-1));
        store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();

        let outcome = store
            .begin("orders-api", "key-1", "POST", "/v1/orders", "hash-a")
            .await
            .unwrap();
        assert!(matches!(outcome, BeginOutcome::Begin));
    }
}
