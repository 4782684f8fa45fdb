//! Workflow layer for the order-fulfillment orchestration core: the four
//! child workflows (C6), the top-level orchestrator (C7), and the
//! cancellation saga (C8) — spec §4.6-§4.8.

pub mod cancellation;
pub mod capabilities;
pub mod children;
pub mod orchestrator;
pub mod signals;

pub use cancellation::{CancellationOrchestrator, CancellationOrchestratorInput, CancellationOrchestratorOutput, TerminalState};
pub use capabilities::{PickingPolicy, WorkflowCapabilities};
pub use orchestrator::{OrderFulfillmentInput, OrderFulfillmentOutput, OrderFulfillmentWorkflow, OrderTerminalState};
