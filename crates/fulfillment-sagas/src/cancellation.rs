//! Cancellation Orchestrator (C8, spec §4.8). Compensates whatever stage the
//! order-fulfillment workflow reached: `CancelOrder → ReleaseInventoryReservation
//! → NotifyCustomerCancellation`, then completes with the caller-supplied
//! terminal state (`cancelled` or `failed`).

use fulfillment_domain::dto::{
    CancelOrderRequest, NotifyCustomerCancellationRequest, ReleaseInventoryReservationRequest,
};
use fulfillment_runtime::activity::ActivityError;
use fulfillment_runtime::{Workflow, WorkflowAction, WorkflowError};
use serde::{Deserialize, Serialize};

use fulfillment_activities::options::cancellation_options;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOrchestratorInput {
    pub order_id: String,
    pub reason: String,
    pub terminal_state: TerminalState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOrchestratorOutput {
    pub order_id: String,
    pub terminal_state: TerminalState,
    pub inventory_released: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Cancelling,
    ReleasingInventory,
    Notifying,
    Done,
}

pub struct CancellationOrchestrator {
    input: CancellationOrchestratorInput,
    phase: Phase,
    inventory_released: bool,
    result: Option<CancellationOrchestratorOutput>,
    error: Option<WorkflowError>,
}

impl CancellationOrchestrator {
    fn complete(&mut self) -> Vec<WorkflowAction> {
        self.phase = Phase::Done;
        let output = CancellationOrchestratorOutput {
            order_id: self.input.order_id.clone(),
            terminal_state: self.input.terminal_state,
            inventory_released: self.inventory_released,
        };
        self.result = Some(output.clone());
        vec![WorkflowAction::complete(
            serde_json::to_value(output).unwrap_or_default(),
        )]
    }
}

impl Workflow for CancellationOrchestrator {
    const TYPE: &'static str = "cancellation_orchestrator";
    type Input = CancellationOrchestratorInput;
    type Output = CancellationOrchestratorOutput;

    fn new(input: Self::Input) -> Self {
        Self {
            input,
            phase: Phase::Cancelling,
            inventory_released: false,
            result: None,
            error: None,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        vec![WorkflowAction::ScheduleActivity {
            activity_id: "cancel_order".into(),
            activity_type: "cancel_order".into(),
            input: serde_json::to_value(CancelOrderRequest {
                order_id: self.input.order_id.clone(),
                reason: self.input.reason.clone(),
            })
            .unwrap_or_default(),
            options: cancellation_options(3),
        }]
    }

    fn on_activity_completed(
        &mut self,
        activity_id: &str,
        result: serde_json::Value,
    ) -> Vec<WorkflowAction> {
        match activity_id {
            "cancel_order" => {
                self.phase = Phase::ReleasingInventory;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "release_inventory_reservation".into(),
                    activity_type: "release_inventory_reservation".into(),
                    input: serde_json::to_value(ReleaseInventoryReservationRequest {
                        order_id: self.input.order_id.clone(),
                    })
                    .unwrap_or_default(),
                    options: cancellation_options(3),
                }]
            }
            "release_inventory_reservation" => {
                self.inventory_released = result
                    .get("released")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                self.phase = Phase::Notifying;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "notify_customer_cancellation".into(),
                    activity_type: "notify_customer_cancellation".into(),
                    input: serde_json::to_value(NotifyCustomerCancellationRequest {
                        order_id: self.input.order_id.clone(),
                        reason: self.input.reason.clone(),
                    })
                    .unwrap_or_default(),
                    options: cancellation_options(1),
                }]
            }
            "notify_customer_cancellation" => self.complete(),
            _ => vec![],
        }
    }

    fn on_activity_failed(
        &mut self,
        activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction> {
        match activity_id {
            "cancel_order" => {
                self.phase = Phase::Done;
                let err = WorkflowError::new(error.message.clone()).with_code("cancel_order_failed");
                self.error = Some(err.clone());
                vec![WorkflowAction::fail(err)]
            }
            "release_inventory_reservation" => {
                tracing::warn!(
                    order_id = %self.input.order_id,
                    %error,
                    "inventory release failed after retries, proceeding to notification"
                );
                self.inventory_released = false;
                self.phase = Phase::Notifying;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "notify_customer_cancellation".into(),
                    activity_type: "notify_customer_cancellation".into(),
                    input: serde_json::to_value(NotifyCustomerCancellationRequest {
                        order_id: self.input.order_id.clone(),
                        reason: self.input.reason.clone(),
                    })
                    .unwrap_or_default(),
                    options: cancellation_options(1),
                }]
            }
            "notify_customer_cancellation" => self.complete(),
            _ => vec![],
        }
    }

    fn is_completed(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    fn result(&self) -> Option<Self::Output> {
        self.result.clone()
    }

    fn error(&self) -> Option<WorkflowError> {
        self.error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CancellationOrchestratorInput {
        CancellationOrchestratorInput {
            order_id: "ORD-001".into(),
            reason: "customer requested".into(),
            terminal_state: TerminalState::Cancelled,
        }
    }

    #[test]
    fn happy_path_completes_cancelled() {
        let mut wf = CancellationOrchestrator::new(input());
        wf.on_start();
        wf.on_activity_completed("cancel_order", serde_json::json!({"cancelled": true}));
        wf.on_activity_completed(
            "release_inventory_reservation",
            serde_json::json!({"released": true}),
        );
        wf.on_activity_completed("notify_customer_cancellation", serde_json::json!({"notified": true}));

        let output = wf.result().expect("should complete");
        assert_eq!(output.terminal_state, TerminalState::Cancelled);
        assert!(output.inventory_released);
    }

    #[test]
    fn cancel_order_failure_is_fatal() {
        let mut wf = CancellationOrchestrator::new(input());
        wf.on_start();
        let actions = wf.on_activity_failed("cancel_order", &ActivityError::non_retryable("order not found"));
        assert!(matches!(actions[0], WorkflowAction::FailWorkflow { .. }));
    }

    #[test]
    fn inventory_release_failure_is_not_fatal() {
        let mut wf = CancellationOrchestrator::new(input());
        wf.on_start();
        wf.on_activity_completed("cancel_order", serde_json::json!({"cancelled": true}));

        let actions = wf.on_activity_failed(
            "release_inventory_reservation",
            &ActivityError::retryable("inventory service unavailable"),
        );
        assert!(matches!(actions[0], WorkflowAction::ScheduleActivity { .. }));

        wf.on_activity_completed("notify_customer_cancellation", serde_json::json!({"notified": true}));
        let output = wf.result().expect("should complete");
        assert!(!output.inventory_released);
    }
}
