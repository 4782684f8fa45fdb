//! Order-Fulfillment Orchestrator (C7, spec §4.7) — the top-level saga.
//!
//! `ValidateOrder → wait(waveAssigned | cancel | timeout_by_priority) →
//! CalculateRoute → PickingWorkflow → [ConsolidationWorkflow if multi-tote]
//! → PackingWorkflow → ShippingWorkflow → completed`. Any required-step
//! failure or a `cancel` signal routes to `CancellationOrchestrator` instead,
//! whose own terminal state becomes this workflow's `terminal_state`.

use std::collections::HashSet;

use fulfillment_domain::dto::{CalculateRouteRequest, OrderLineItem, OrderPriority, ValidateOrderRequest};
use fulfillment_runtime::activity::ActivityError;
use fulfillment_runtime::workflow::signal_types;
use fulfillment_runtime::{ActivityOptions, Workflow, WorkflowAction, WorkflowError, WorkflowSignal};
use serde::{Deserialize, Serialize};

use crate::capabilities::{PickingPolicy, WorkflowCapabilities};
use crate::cancellation::TerminalState;
use crate::children::{
    ConsolidationWorkflowInput, ConsolidationWorkflowOutput, PackingWorkflowInput,
    PackingWorkflowOutput, PickingWorkflowInput, PickingWorkflowOutput, ShippingWorkflowInput,
    ShippingWorkflowOutput,
};
use crate::signals::orchestrator as sig;

const WAVE_TIMER: &str = "wave_assignment_timeout";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFulfillmentInput {
    pub order_id: String,
    pub priority: OrderPriority,
    pub tenant_id: String,
    pub facility_id: String,
    pub warehouse_id: String,
    pub carrier: String,
    #[serde(default)]
    pub picking_policy: PickingPolicy,
    #[serde(default)]
    pub capabilities: WorkflowCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderTerminalState {
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFulfillmentOutput {
    pub order_id: String,
    pub terminal_state: OrderTerminalState,
    pub tracking_number: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Validating,
    AwaitingWave,
    CalculatingRoute,
    Picking,
    Consolidating,
    Packing,
    Shipping,
    Cancelling,
    Done,
}

const PICKING_CHILD: &str = "picking";
const CONSOLIDATION_CHILD: &str = "consolidation";
const PACKING_CHILD: &str = "packing";
const SHIPPING_CHILD: &str = "shipping";
const CANCELLATION_CHILD: &str = "cancellation";

pub struct OrderFulfillmentWorkflow {
    input: OrderFulfillmentInput,
    phase: Phase,
    wave_id: Option<String>,
    route_id: Option<String>,
    order_items: Vec<OrderLineItem>,
    picked_items_allocation_ids: Option<Vec<String>>,
    tracking_number: Option<String>,
    result: Option<OrderFulfillmentOutput>,
    error: Option<WorkflowError>,
}

impl OrderFulfillmentWorkflow {
    fn complete(&mut self) -> Vec<WorkflowAction> {
        self.phase = Phase::Done;
        let output = OrderFulfillmentOutput {
            order_id: self.input.order_id.clone(),
            terminal_state: OrderTerminalState::Completed,
            tracking_number: self.tracking_number.clone(),
            error_code: None,
            error_message: None,
        };
        self.result = Some(output.clone());
        vec![WorkflowAction::complete(
            serde_json::to_value(output).unwrap_or_default(),
        )]
    }

    /// The stage child currently outstanding, if any — the one `cancel` must
    /// tell the engine to stop alongside starting the cancellation saga.
    fn outstanding_stage_child(&self) -> Option<&'static str> {
        match self.phase {
            Phase::Picking => Some(PICKING_CHILD),
            Phase::Consolidating => Some(CONSOLIDATION_CHILD),
            Phase::Packing => Some(PACKING_CHILD),
            Phase::Shipping => Some(SHIPPING_CHILD),
            Phase::Validating | Phase::AwaitingWave | Phase::CalculatingRoute | Phase::Cancelling | Phase::Done => {
                None
            }
        }
    }

    /// Routes to the cancellation saga instead of failing outright. `state`
    /// decides whether the orchestrator's own eventual terminal state is
    /// `cancelled` (operator-initiated) or `failed` (a required step errored).
    /// Monotonic once called: whichever stage child is outstanding is told to
    /// stop, and nothing past this point schedules a happy-path child again
    /// (enforced by the `self.phase` guard in `on_child_workflow_completed`/
    /// `on_child_workflow_failed`).
    fn cancel(&mut self, state: TerminalState, code: &str, message: impl Into<String>) -> Vec<WorkflowAction> {
        let outstanding_child = self.outstanding_stage_child();
        self.phase = Phase::Cancelling;
        let message = message.into();
        self.error = Some(WorkflowError::new(message.clone()).with_code(code));

        let mut actions = Vec::with_capacity(2);
        if let Some(child_id) = outstanding_child {
            actions.push(WorkflowAction::CancelChildWorkflow {
                child_id: child_id.into(),
            });
        }
        actions.push(WorkflowAction::ScheduleChildWorkflow {
            workflow_id: CANCELLATION_CHILD.into(),
            workflow_type: "cancellation_orchestrator".into(),
            input: serde_json::json!({
                "order_id": self.input.order_id.clone(),
                "reason": message,
                "terminal_state": state,
            }),
        });
        actions
    }
}

impl Workflow for OrderFulfillmentWorkflow {
    const TYPE: &'static str = "order_fulfillment";
    type Input = OrderFulfillmentInput;
    type Output = OrderFulfillmentOutput;

    fn new(input: Self::Input) -> Self {
        Self {
            input,
            phase: Phase::Validating,
            wave_id: None,
            route_id: None,
            order_items: Vec::new(),
            picked_items_allocation_ids: None,
            tracking_number: None,
            result: None,
            error: None,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        vec![WorkflowAction::ScheduleActivity {
            activity_id: "validate_order".into(),
            activity_type: "validate_order".into(),
            input: serde_json::to_value(ValidateOrderRequest {
                order_id: self.input.order_id.clone(),
                tenant_id: self.input.tenant_id.clone(),
            })
            .unwrap_or_default(),
            options: ActivityOptions::default(),
        }]
    }

    fn on_activity_completed(
        &mut self,
        activity_id: &str,
        result: serde_json::Value,
    ) -> Vec<WorkflowAction> {
        match activity_id {
            "validate_order" => {
                let valid = result.get("valid").and_then(|v| v.as_bool()).unwrap_or(false);
                if !valid {
                    return self.cancel(
                        TerminalState::Failed,
                        "validation_failed",
                        "order failed validation",
                    );
                }
                self.order_items = result
                    .get("items")
                    .and_then(|v| serde_json::from_value::<Vec<OrderLineItem>>(v.clone()).ok())
                    .unwrap_or_default();
                self.phase = Phase::AwaitingWave;
                vec![WorkflowAction::timer(WAVE_TIMER, self.input.priority.wave_timeout())]
            }
            "calculate_route" => {
                self.route_id = result.get("route_id").and_then(|v| v.as_str()).map(str::to_string);
                self.phase = Phase::Picking;
                vec![WorkflowAction::ScheduleChildWorkflow {
                    workflow_id: PICKING_CHILD.into(),
                    workflow_type: "picking".into(),
                    input: serde_json::to_value(PickingWorkflowInput {
                        order_id: self.input.order_id.clone(),
                        wave_id: self.wave_id.clone().unwrap_or_default(),
                        items: self.order_items.clone(),
                        reprocessing: self.input.capabilities.reprocessing,
                    })
                    .unwrap_or_default(),
                }]
            }
            _ => vec![],
        }
    }

    fn on_activity_failed(
        &mut self,
        activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction> {
        self.cancel(
            TerminalState::Failed,
            &format!("{activity_id}_failed"),
            error.message.clone(),
        )
    }

    fn on_timer_fired(&mut self, timer_id: &str) -> Vec<WorkflowAction> {
        if timer_id == WAVE_TIMER && self.phase == Phase::AwaitingWave {
            return self.cancel(
                TerminalState::Failed,
                "wave_timeout",
                "no wave assigned within priority timeout",
            );
        }
        vec![]
    }

    fn on_signal(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        if signal.signal_type == signal_types::CANCEL {
            if matches!(self.phase, Phase::Cancelling | Phase::Done) {
                return vec![];
            }
            return self.cancel(TerminalState::Cancelled, "cancelled", "cancel signal received");
        }

        if signal.signal_type == sig::WAVE_ASSIGNED && self.phase == Phase::AwaitingWave {
            self.wave_id = signal
                .payload
                .get("wave_id")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            self.phase = Phase::CalculatingRoute;
            return vec![WorkflowAction::ScheduleActivity {
                activity_id: "calculate_route".into(),
                activity_type: "calculate_route".into(),
                input: serde_json::to_value(CalculateRouteRequest {
                    order_id: self.input.order_id.clone(),
                    facility_id: self.input.facility_id.clone(),
                    warehouse_id: self.input.warehouse_id.clone(),
                })
                .unwrap_or_default(),
                options: ActivityOptions::default(),
            }];
        }

        vec![]
    }

    fn on_child_workflow_completed(
        &mut self,
        child_id: &str,
        result: serde_json::Value,
    ) -> Vec<WorkflowAction> {
        // Cancellation is monotonic: once accepted, a stale completion from the
        // stage child that was already in flight must never resume the happy
        // path. Only the cancellation saga itself is still allowed to act.
        if self.phase == Phase::Done {
            return vec![];
        }
        if self.phase == Phase::Cancelling && child_id != CANCELLATION_CHILD {
            return vec![];
        }

        match child_id {
            PICKING_CHILD => {
                let Ok(picking) = serde_json::from_value::<PickingWorkflowOutput>(result) else {
                    return self.cancel(TerminalState::Failed, "picking_failed", "malformed picking result");
                };
                if !picking.success && self.input.picking_policy == PickingPolicy::FailOnPartial {
                    return self.cancel(TerminalState::Failed, "partial_pick", "picking reported a partial result");
                }

                let tote_ids: HashSet<&str> =
                    picking.picked_items.iter().map(|item| item.tote_id.as_str()).collect();
                self.picked_items_allocation_ids = Some(
                    picking
                        .picked_items
                        .iter()
                        .map(|item| item.sku.clone())
                        .collect(),
                );

                if tote_ids.len() > 1 {
                    self.phase = Phase::Consolidating;
                    vec![WorkflowAction::ScheduleChildWorkflow {
                        workflow_id: CONSOLIDATION_CHILD.into(),
                        workflow_type: "consolidation".into(),
                        input: serde_json::to_value(ConsolidationWorkflowInput {
                            order_id: self.input.order_id.clone(),
                            tote_ids: tote_ids.into_iter().map(str::to_string).collect(),
                            sortation: self.input.capabilities.sortation,
                        })
                        .unwrap_or_default(),
                    }]
                } else {
                    self.schedule_packing()
                }
            }
            CONSOLIDATION_CHILD => {
                if serde_json::from_value::<ConsolidationWorkflowOutput>(result).is_err() {
                    return self.cancel(
                        TerminalState::Failed,
                        "consolidation_failed",
                        "malformed consolidation result",
                    );
                }
                self.schedule_packing()
            }
            PACKING_CHILD => {
                let Ok(packing) = serde_json::from_value::<PackingWorkflowOutput>(result) else {
                    return self.cancel(TerminalState::Failed, "packing_failed", "malformed packing result");
                };
                self.tracking_number = Some(packing.tracking_number.clone());
                self.phase = Phase::Shipping;
                vec![WorkflowAction::ScheduleChildWorkflow {
                    workflow_id: SHIPPING_CHILD.into(),
                    workflow_type: "shipping".into(),
                    input: serde_json::to_value(ShippingWorkflowInput {
                        order_id: self.input.order_id.clone(),
                        package_id: packing.package_id,
                        tracking_number: packing.tracking_number,
                        carrier: packing.carrier,
                    })
                    .unwrap_or_default(),
                }]
            }
            SHIPPING_CHILD => {
                let Ok(shipping) = serde_json::from_value::<ShippingWorkflowOutput>(result) else {
                    return self.cancel(TerminalState::Failed, "shipping_failed", "malformed shipping result");
                };
                self.tracking_number = Some(shipping.tracking_number);
                self.complete()
            }
            CANCELLATION_CHILD => {
                self.phase = Phase::Done;
                let terminal_state = if self
                    .error
                    .as_ref()
                    .and_then(|e| e.code.as_deref())
                    == Some("cancelled")
                {
                    OrderTerminalState::Cancelled
                } else {
                    OrderTerminalState::Failed
                };
                let output = OrderFulfillmentOutput {
                    order_id: self.input.order_id.clone(),
                    terminal_state,
                    tracking_number: None,
                    error_code: self.error.as_ref().and_then(|e| e.code.clone()),
                    error_message: self.error.as_ref().map(|e| e.message.clone()),
                };
                self.result = Some(output.clone());
                vec![WorkflowAction::complete(
                    serde_json::to_value(output).unwrap_or_default(),
                )]
            }
            _ => vec![],
        }
    }

    fn on_child_workflow_failed(
        &mut self,
        child_id: &str,
        error: &WorkflowError,
    ) -> Vec<WorkflowAction> {
        if self.phase == Phase::Done {
            return vec![];
        }
        if self.phase == Phase::Cancelling && child_id != CANCELLATION_CHILD {
            return vec![];
        }
        if child_id == CANCELLATION_CHILD {
            self.phase = Phase::Done;
            let err = WorkflowError::new(error.message.clone()).with_code("cancellation_failed");
            self.error = Some(err.clone());
            return vec![WorkflowAction::fail(err)];
        }
        self.cancel(
            TerminalState::Failed,
            error.code.as_deref().unwrap_or("child_workflow_failed"),
            error.message.clone(),
        )
    }

    fn is_completed(&self) -> bool {
        self.result.is_some() || (self.error.is_some() && self.phase == Phase::Done)
    }

    fn result(&self) -> Option<Self::Output> {
        self.result.clone()
    }

    fn error(&self) -> Option<WorkflowError> {
        if self.result.is_some() {
            None
        } else {
            self.error.clone()
        }
    }
}

impl OrderFulfillmentWorkflow {
    fn schedule_packing(&mut self) -> Vec<WorkflowAction> {
        self.phase = Phase::Packing;
        vec![WorkflowAction::ScheduleChildWorkflow {
            workflow_id: PACKING_CHILD.into(),
            workflow_type: "packing".into(),
            input: serde_json::to_value(PackingWorkflowInput {
                order_id: self.input.order_id.clone(),
                allocation_ids: self.picked_items_allocation_ids.clone(),
                carrier: self.input.carrier.clone(),
                gift_wrap: self.input.capabilities.gift_wrap,
            })
            .unwrap_or_default(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulfillment_domain::dto::PickedItem;

    fn input() -> OrderFulfillmentInput {
        OrderFulfillmentInput {
            order_id: "ORD-001".into(),
            priority: OrderPriority::Standard,
            tenant_id: "TEN-1".into(),
            facility_id: "FAC-1".into(),
            warehouse_id: "WH-1".into(),
            carrier: "UPS".into(),
            picking_policy: PickingPolicy::default(),
            capabilities: WorkflowCapabilities::none(),
        }
    }

    fn picked(items: Vec<(&str, &str)>) -> serde_json::Value {
        let picked_items: Vec<PickedItem> = items
            .into_iter()
            .map(|(sku, tote)| PickedItem {
                sku: sku.into(),
                qty: 1,
                location_id: "LOC-1".into(),
                tote_id: tote.into(),
            })
            .collect();
        serde_json::to_value(PickingWorkflowOutput {
            task_id: "TASK-1".into(),
            picked_items,
            success: true,
        })
        .unwrap()
    }

    #[test]
    fn single_tote_skips_consolidation() {
        let mut wf = OrderFulfillmentWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("validate_order", serde_json::json!({"valid": true}));
        wf.on_signal(&WorkflowSignal::custom(sig::WAVE_ASSIGNED, serde_json::json!({"wave_id": "W-1"})));
        wf.on_activity_completed("calculate_route", serde_json::json!({"route_id": "R-1"}));

        let actions = wf.on_child_workflow_completed(PICKING_CHILD, picked(vec![("SKU-1", "T-1")]));
        match &actions[0] {
            WorkflowAction::ScheduleChildWorkflow { workflow_type, .. } => {
                assert_eq!(workflow_type, "packing");
            }
            other => panic!("expected packing child, got {other:?}"),
        }
    }

    #[test]
    fn multi_tote_routes_to_consolidation() {
        let mut wf = OrderFulfillmentWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("validate_order", serde_json::json!({"valid": true}));
        wf.on_signal(&WorkflowSignal::custom(sig::WAVE_ASSIGNED, serde_json::json!({"wave_id": "W-1"})));
        wf.on_activity_completed("calculate_route", serde_json::json!({"route_id": "R-1"}));

        let actions =
            wf.on_child_workflow_completed(PICKING_CHILD, picked(vec![("SKU-1", "T-1"), ("SKU-2", "T-2")]));
        match &actions[0] {
            WorkflowAction::ScheduleChildWorkflow { workflow_type, .. } => {
                assert_eq!(workflow_type, "consolidation");
            }
            other => panic!("expected consolidation child, got {other:?}"),
        }
    }

    #[test]
    fn full_happy_path_completes_with_tracking_number() {
        let mut wf = OrderFulfillmentWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("validate_order", serde_json::json!({"valid": true}));
        wf.on_signal(&WorkflowSignal::custom(sig::WAVE_ASSIGNED, serde_json::json!({"wave_id": "W-1"})));
        wf.on_activity_completed("calculate_route", serde_json::json!({"route_id": "R-1"}));
        wf.on_child_workflow_completed(PICKING_CHILD, picked(vec![("SKU-1", "T-1")]));
        wf.on_child_workflow_completed(
            PACKING_CHILD,
            serde_json::to_value(PackingWorkflowOutput {
                package_id: "PKG-1".into(),
                tracking_number: "1Z999".into(),
                carrier: "UPS".into(),
                weight_kg: 2.0,
            })
            .unwrap(),
        );
        wf.on_child_workflow_completed(
            SHIPPING_CHILD,
            serde_json::to_value(ShippingWorkflowOutput {
                shipment_id: "SHIP-1".into(),
                tracking_number: "1Z999".into(),
            })
            .unwrap(),
        );

        let output = wf.result().expect("should complete");
        assert_eq!(output.terminal_state, OrderTerminalState::Completed);
        assert_eq!(output.tracking_number.as_deref(), Some("1Z999"));
    }

    #[test]
    fn cancel_signal_routes_to_cancellation_child() {
        let mut wf = OrderFulfillmentWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("validate_order", serde_json::json!({"valid": true}));

        let actions = wf.on_signal(&WorkflowSignal::cancel("operator abort"));
        match &actions[0] {
            WorkflowAction::ScheduleChildWorkflow { workflow_type, .. } => {
                assert_eq!(workflow_type, "cancellation_orchestrator");
            }
            other => panic!("expected cancellation child, got {other:?}"),
        }

        let actions = wf.on_child_workflow_completed(
            CANCELLATION_CHILD,
            serde_json::json!({"order_id": "ORD-001", "terminal_state": "cancelled", "inventory_released": true}),
        );
        assert!(matches!(actions[0], WorkflowAction::CompleteWorkflow { .. }));
        assert_eq!(wf.result().unwrap().terminal_state, OrderTerminalState::Cancelled);
    }

    #[test]
    fn wave_timeout_routes_to_cancellation_as_failed() {
        let mut wf = OrderFulfillmentWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("validate_order", serde_json::json!({"valid": true}));

        let actions = wf.on_timer_fired(WAVE_TIMER);
        assert!(matches!(actions[0], WorkflowAction::ScheduleChildWorkflow { .. }));

        wf.on_child_workflow_completed(
            CANCELLATION_CHILD,
            serde_json::json!({"order_id": "ORD-001", "terminal_state": "failed", "inventory_released": false}),
        );
        let output = wf.result().expect("should complete");
        assert_eq!(output.terminal_state, OrderTerminalState::Failed);
        assert_eq!(output.error_code.as_deref(), Some("wave_timeout"));
    }

    #[test]
    fn partial_pick_with_fail_on_partial_policy_cancels() {
        let mut wf = OrderFulfillmentWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("validate_order", serde_json::json!({"valid": true}));
        wf.on_signal(&WorkflowSignal::custom(sig::WAVE_ASSIGNED, serde_json::json!({"wave_id": "W-1"})));
        wf.on_activity_completed("calculate_route", serde_json::json!({"route_id": "R-1"}));

        let partial = serde_json::to_value(PickingWorkflowOutput {
            task_id: "TASK-1".into(),
            picked_items: vec![],
            success: false,
        })
        .unwrap();
        let actions = wf.on_child_workflow_completed(PICKING_CHILD, partial);
        assert!(actions
            .iter()
            .any(|a| matches!(a, WorkflowAction::ScheduleChildWorkflow { workflow_type, .. } if workflow_type == "cancellation_orchestrator")));
    }

    #[test]
    fn cancel_mid_picking_issues_child_cancellation_alongside_cancellation_saga() {
        let mut wf = OrderFulfillmentWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("validate_order", serde_json::json!({"valid": true}));
        wf.on_signal(&WorkflowSignal::custom(sig::WAVE_ASSIGNED, serde_json::json!({"wave_id": "W-1"})));
        wf.on_activity_completed("calculate_route", serde_json::json!({"route_id": "R-1"}));

        let actions = wf.on_signal(&WorkflowSignal::cancel("operator abort"));
        assert!(actions.iter().any(
            |a| matches!(a, WorkflowAction::CancelChildWorkflow { child_id } if child_id == PICKING_CHILD)
        ));
        assert!(actions.iter().any(|a| matches!(
            a,
            WorkflowAction::ScheduleChildWorkflow { workflow_type, .. } if workflow_type == "cancellation_orchestrator"
        )));
    }

    #[test]
    fn stale_picking_completion_after_cancel_accepted_is_a_no_op() {
        let mut wf = OrderFulfillmentWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("validate_order", serde_json::json!({"valid": true}));
        wf.on_signal(&WorkflowSignal::custom(sig::WAVE_ASSIGNED, serde_json::json!({"wave_id": "W-1"})));
        wf.on_activity_completed("calculate_route", serde_json::json!({"route_id": "R-1"}));
        wf.on_signal(&WorkflowSignal::cancel("operator abort"));

        // The orphaned picking child finishes on its own after cancellation
        // was already accepted; it must not resume the happy path.
        let actions = wf.on_child_workflow_completed(PICKING_CHILD, picked(vec![("SKU-1", "T-1")]));
        assert!(actions.is_empty());
        assert!(!wf.is_completed());

        // The cancellation saga itself still completes the workflow.
        let actions = wf.on_child_workflow_completed(
            CANCELLATION_CHILD,
            serde_json::json!({"order_id": "ORD-001", "terminal_state": "cancelled", "inventory_released": true}),
        );
        assert!(matches!(actions[0], WorkflowAction::CompleteWorkflow { .. }));
        assert_eq!(wf.result().unwrap().terminal_state, OrderTerminalState::Cancelled);

        // And once truly done, even a late cancellation-child duplicate is a no-op.
        let actions = wf.on_child_workflow_completed(
            CANCELLATION_CHILD,
            serde_json::json!({"order_id": "ORD-001", "terminal_state": "cancelled", "inventory_released": true}),
        );
        assert!(actions.is_empty());
    }
}
