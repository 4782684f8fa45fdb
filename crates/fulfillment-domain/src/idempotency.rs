//! Request-idempotency and message-dedup row shapes (spec §3.1, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of an `IdempotencyKey` row (spec §4.4 state table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyState {
    InFlight,
    Completed,
}

/// Request-side idempotency row, keyed on `(serviceName, key)`.
///
/// `request_hash` and the stored response are immutable after first
/// completion (invariant 6, spec §3.2): a repeat with the same key and hash
/// replays the cached response; a different hash is rejected with `422`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub key: String,
    pub service_name: String,
    pub method: String,
    pub path: String,
    pub request_hash: String,
    pub state: IdempotencyState,
    pub response_status: Option<u16>,
    pub response_body: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyKey {
    /// Start a new `in_flight` row with the default 24h retention (spec §6.4
    /// `idempotency.retention`).
    pub fn new_in_flight(
        key: impl Into<String>,
        service_name: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        request_hash: impl Into<String>,
        retention: chrono::Duration,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            key: key.into(),
            service_name: service_name.into(),
            method: method.into(),
            path: path.into(),
            request_hash: request_hash.into(),
            state: IdempotencyState::InFlight,
            response_status: None,
            response_body: None,
            created_at,
            expires_at: created_at + retention,
        }
    }
}

/// Consumer-side dedup row, primary key `(consumer_group, topic, cloud_event_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumedMessage {
    pub consumer_group: String,
    pub topic: String,
    pub cloud_event_id: String,
    pub processed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConsumedMessage {
    pub fn new(
        consumer_group: impl Into<String>,
        topic: impl Into<String>,
        cloud_event_id: impl Into<String>,
        ttl: chrono::Duration,
    ) -> Self {
        let processed_at = Utc::now();
        Self {
            consumer_group: consumer_group.into(),
            topic: topic.into(),
            cloud_event_id: cloud_event_id.into(),
            processed_at,
            expires_at: processed_at + ttl,
        }
    }
}
