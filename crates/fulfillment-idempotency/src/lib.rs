//! Consumer idempotency layer (spec §4.4).
//!
//! Two facets share a storage model:
//!
//! - **Request idempotency** (HTTP): [`IdempotencyStore`] implements the
//!   state table in spec §4.4, exposed to any `axum` router as a
//!   [`layer::IdempotencyLayer`].
//! - **Message dedup** (bus): [`ConsumedMessageStore::try_mark_processed`]
//!   is an atomic insert-or-skip over `(consumer_group, topic, cloud_event_id)`.

pub mod dedup;
pub mod hash;
pub mod layer;
pub mod store;

pub use dedup::{ConsumedMessageStore, InMemoryConsumedMessageStore};
pub use hash::request_hash;
pub use layer::{IdempotencyLayer, IdempotencyOutcome};
pub use store::{IdempotencyError, IdempotencyStore, InMemoryIdempotencyStore};
