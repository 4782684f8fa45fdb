//! Transactional outbox pattern (spec §4.3).
//!
//! `OutboxStore::insert_with_aggregate` writes the outbox row in the same
//! transaction as the aggregate mutation that produced it (invariant 1,
//! spec §3.2). A [`Relayer`] background task reads unpublished rows in
//! insertion order per `aggregate_id`, publishes them via a [`BusPublisher`],
//! and marks `published_at` — retrying forever on failure (spec §4.3 failure
//! modes) since the bus is assumed to deliver at-least-once, never exactly-once.

pub mod publisher;
pub mod relayer;
pub mod store;

pub use publisher::{BusPublisher, InMemoryBusPublisher, PublishError};
pub use relayer::{Relayer, RelayerConfig};
pub use store::{InMemoryOutboxStore, OutboxError, OutboxStore, PostgresOutboxStore};
