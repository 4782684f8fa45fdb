//! Shared domain types for the order-fulfillment orchestration core.
//!
//! This crate has no behavior of its own: it is the vocabulary every other
//! crate in the workspace shares — the CloudEvent wire envelope, the error
//! taxonomy activities and workflows propagate, the outbox/idempotency row
//! shapes, and the request/response DTOs activities exchange with domain
//! services.

pub mod cloudevents;
pub mod dto;
pub mod error;
pub mod idempotency;
pub mod outbox;

pub use cloudevents::{topics, CloudEvent};
pub use error::ErrorKind;
pub use idempotency::{ConsumedMessage, IdempotencyKey, IdempotencyState};
pub use outbox::OutboxEvent;
