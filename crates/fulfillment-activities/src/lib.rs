//! Concrete activity bodies (C2) for the order-fulfillment orchestration core.
//!
//! Each activity here is a thin idempotent wrapper over a domain-service
//! HTTP endpoint (spec §4.2), registered onto a
//! [`fulfillment_runtime::WorkerPool`] via [`register::register_all`].

pub mod cancellation;
pub mod client;
pub mod consolidation;
pub mod key;
pub mod options;
pub mod packing;
pub mod picking;
pub mod register;
pub mod routing;
pub mod shipping;
pub mod validation;

pub use client::DomainClient;
pub use key::IdempotencyKeyBuilder;
pub use register::register_all;
