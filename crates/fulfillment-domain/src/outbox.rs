//! Transactional outbox row shape (spec §3.1, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row in the sending service's database, written in the same transaction
/// as the aggregate mutation that produced it (invariant 1, spec §3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub event_id: Uuid,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub topic: String,
    pub cloud_event_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Construct an unpublished row for `aggregate_id`/`aggregate_type`, carrying
    /// `event` (already serialized as its CloudEvent JSON) to `topic`.
    pub fn new(
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        topic: impl Into<String>,
        cloud_event_json: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            topic: topic.into(),
            cloud_event_json,
            created_at: Utc::now(),
            published_at: None,
            attempts: 0,
            last_attempt_at: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }
}
