//! Child workflows for the four stages the order-fulfillment orchestrator
//! (spec §4.7) drives via `ScheduleChildWorkflow` (spec §4.6).

pub mod consolidation;
pub mod packing;
pub mod picking;
pub mod shipping;

pub use consolidation::{ConsolidationWorkflow, ConsolidationWorkflowInput, ConsolidationWorkflowOutput};
pub use packing::{PackingWorkflow, PackingWorkflowInput, PackingWorkflowOutput};
pub use picking::{PickingWorkflow, PickingWorkflowInput, PickingWorkflowOutput};
pub use shipping::{ShippingWorkflow, ShippingWorkflowInput, ShippingWorkflowOutput};
