//! Signal Bus (spec §4.5).
//!
//! Correlates operator- and domain-service-originated signals to running
//! workflow instances by derived id (`order-fulfillment-<orderId>`,
//! `picking-<orderId>`, ...) rather than the runtime's own `Uuid`:
//!
//! - [`router`] — the operator-facing `axum` router,
//!   `POST /v1/workflows/{workflow_id}/signals/{signal_name}`. Callers layer
//!   `fulfillment_idempotency::IdempotencyLayer` on top the same way any
//!   other mutating route in this core does.
//! - [`bridge`] — [`bridge::CloudEventSignalBridge`], which maps a subset of
//!   inbound CloudEvents (e.g. `wms.wave.assigned`) onto the same
//!   `send_signal` path, deduplicated via
//!   `fulfillment_idempotency::ConsumedMessageStore`.
//! - [`derive`] — the shared derivation rules both front ends resolve
//!   derived ids through.

pub mod bridge;
pub mod derive;
pub mod router;

pub use bridge::{BridgeError, BridgeRule, CloudEventSignalBridge};
pub use derive::derive_workflow_id;
pub use router::{signal_router, SignalBusState};
