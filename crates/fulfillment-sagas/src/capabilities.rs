//! Orchestrator-input supplements resolving spec.md §9's open questions
//! (see DESIGN.md for the rationale behind each).

use serde::{Deserialize, Serialize};

/// Resolves Open Question 1: what the order-fulfillment orchestrator does
/// with a `pickingComplete{success: false}` result. Picking itself never
/// compensates on a partial result — it always returns its typed output to
/// the parent, which consults this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickingPolicy {
    /// A partial pick (`success: false`) is treated as compensatable:
    /// the orchestrator routes to the cancellation saga.
    FailOnPartial,
    /// A partial pick proceeds to consolidation/packing with whatever items
    /// were actually picked.
    PackPartial,
}

impl Default for PickingPolicy {
    fn default() -> Self {
        Self::FailOnPartial
    }
}

/// Resolves Open Question 3: gift-wrap, sortation, and reprocessing are
/// optional stage extensions, each gated behind its own flag. Disabled by
/// default. The orchestrator forwards each flag into the corresponding
/// child's input (`PackingWorkflowInput::gift_wrap`,
/// `ConsolidationWorkflowInput::sortation`, `PickingWorkflowInput::reprocessing`);
/// the child schedules the real activity only when its flag is set, and
/// skips the step entirely otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkflowCapabilities {
    #[serde(default)]
    pub gift_wrap: bool,
    #[serde(default)]
    pub sortation: bool,
    #[serde(default)]
    pub reprocessing: bool,
}

impl WorkflowCapabilities {
    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_fail_on_partial() {
        assert_eq!(PickingPolicy::default(), PickingPolicy::FailOnPartial);
    }

    #[test]
    fn default_capabilities_are_all_disabled() {
        let caps = WorkflowCapabilities::default();
        assert!(!caps.gift_wrap);
        assert!(!caps.sortation);
        assert!(!caps.reprocessing);
    }

    #[test]
    fn capabilities_deserialize_with_defaults_when_absent() {
        let caps: WorkflowCapabilities = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(caps, WorkflowCapabilities::none());
    }
}
