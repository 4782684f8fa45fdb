//! Shipping child workflow (spec §4.6, stage row "Shipping": 5 min per
//! activity, artifacts `shipmentId, trackingNumber`).
//!
//! `CreateShipment → Scan → Verify → PlaceOnDock → AddToManifest →
//! MarkShipped → NotifyCustomer`, honoring `cancel` between every step.
//! Unlike the cancellation saga's own notification activity,
//! `fulfillment-activities::shipping::NotifyCustomerActivity` does not
//! swallow its own errors — this workflow treats a `notify_customer`
//! failure as non-fatal at the call site instead, since the shipment itself
//! has already succeeded by that point (spec §4.7's "customer notification
//! attempted best-effort" applies just as much to the happy path).

use fulfillment_runtime::activity::ActivityError;
use fulfillment_runtime::workflow::signal_types;
use fulfillment_runtime::{ActivityOptions, Workflow, WorkflowAction, WorkflowError, WorkflowSignal};
use serde::{Deserialize, Serialize};

use fulfillment_domain::dto::{
    AddToManifestRequest, CreateShipmentRequest, MarkShippedRequest, NotifyCustomerRequest,
    PlaceOnDockRequest, ShipmentScanRequest, VerifyShipmentRequest,
};

const PER_ACTIVITY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5 * 60);

fn step_options() -> ActivityOptions {
    ActivityOptions::default().with_start_to_close_timeout(PER_ACTIVITY_TIMEOUT)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingWorkflowInput {
    pub order_id: String,
    pub package_id: String,
    pub tracking_number: String,
    pub carrier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingWorkflowOutput {
    pub shipment_id: String,
    pub tracking_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    CreatingShipment,
    Scanning,
    Verifying,
    PlacingOnDock,
    AddingToManifest,
    MarkingShipped,
    NotifyingCustomer,
    Done,
}

pub struct ShippingWorkflow {
    input: ShippingWorkflowInput,
    phase: Phase,
    shipment_id: Option<String>,
    result: Option<ShippingWorkflowOutput>,
    error: Option<WorkflowError>,
}

impl ShippingWorkflow {
    fn fail(&mut self, code: &str, message: impl Into<String>) -> Vec<WorkflowAction> {
        self.phase = Phase::Done;
        let err = WorkflowError::new(message.into()).with_code(code);
        self.error = Some(err.clone());
        vec![WorkflowAction::fail(err)]
    }

    fn complete(&mut self) -> Vec<WorkflowAction> {
        self.phase = Phase::Done;
        let output = ShippingWorkflowOutput {
            shipment_id: self.shipment_id.clone().unwrap_or_default(),
            tracking_number: self.input.tracking_number.clone(),
        };
        self.result = Some(output.clone());
        vec![WorkflowAction::complete(
            serde_json::to_value(output).unwrap_or_default(),
        )]
    }

    fn shipment_id(&self) -> String {
        self.shipment_id.clone().unwrap_or_default()
    }
}

impl Workflow for ShippingWorkflow {
    const TYPE: &'static str = "shipping";
    type Input = ShippingWorkflowInput;
    type Output = ShippingWorkflowOutput;

    fn new(input: Self::Input) -> Self {
        Self {
            input,
            phase: Phase::CreatingShipment,
            shipment_id: None,
            result: None,
            error: None,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        vec![WorkflowAction::ScheduleActivity {
            activity_id: "create_shipment".into(),
            activity_type: "create_shipment".into(),
            input: serde_json::to_value(CreateShipmentRequest {
                order_id: self.input.order_id.clone(),
                package_id: self.input.package_id.clone(),
                tracking_number: self.input.tracking_number.clone(),
                carrier: self.input.carrier.clone(),
            })
            .unwrap_or_default(),
            options: step_options(),
        }]
    }

    fn on_activity_completed(
        &mut self,
        activity_id: &str,
        result: serde_json::Value,
    ) -> Vec<WorkflowAction> {
        match activity_id {
            "create_shipment" => {
                self.shipment_id = result
                    .get("shipment_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                self.phase = Phase::Scanning;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "shipment_scan".into(),
                    activity_type: "shipment_scan".into(),
                    input: serde_json::to_value(ShipmentScanRequest {
                        shipment_id: self.shipment_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "shipment_scan" => {
                self.phase = Phase::Verifying;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "verify_shipment".into(),
                    activity_type: "verify_shipment".into(),
                    input: serde_json::to_value(VerifyShipmentRequest {
                        shipment_id: self.shipment_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "verify_shipment" => {
                self.phase = Phase::PlacingOnDock;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "place_on_dock".into(),
                    activity_type: "place_on_dock".into(),
                    input: serde_json::to_value(PlaceOnDockRequest {
                        shipment_id: self.shipment_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "place_on_dock" => {
                self.phase = Phase::AddingToManifest;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "add_to_manifest".into(),
                    activity_type: "add_to_manifest".into(),
                    input: serde_json::to_value(AddToManifestRequest {
                        shipment_id: self.shipment_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "add_to_manifest" => {
                self.phase = Phase::MarkingShipped;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "mark_shipped".into(),
                    activity_type: "mark_shipped".into(),
                    input: serde_json::to_value(MarkShippedRequest {
                        order_id: self.input.order_id.clone(),
                        shipment_id: self.shipment_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "mark_shipped" => {
                self.phase = Phase::NotifyingCustomer;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "notify_customer".into(),
                    activity_type: "notify_customer".into(),
                    input: serde_json::to_value(NotifyCustomerRequest {
                        order_id: self.input.order_id.clone(),
                        message: format!(
                            "Your order has shipped via {} (tracking {})",
                            self.input.carrier, self.input.tracking_number
                        ),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "notify_customer" => self.complete(),
            _ => vec![],
        }
    }

    fn on_activity_failed(
        &mut self,
        activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction> {
        if activity_id == "notify_customer" {
            tracing::warn!(order_id = %self.input.order_id, %error, "customer notification failed, shipment already completed");
            return self.complete();
        }
        self.fail("shipping_failed", format!("{activity_id}: {}", error.message))
    }

    fn on_signal(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        if signal.signal_type == signal_types::CANCEL {
            return self.fail("cancelled", "cancelled");
        }
        vec![]
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

    fn input() -> ShippingWorkflowInput {
        ShippingWorkflowInput {
            order_id: "ORD-001".into(),
            package_id: "PKG-1".into(),
            tracking_number: "1Z999".into(),
            carrier: "UPS".into(),
        }
    }

    #[test]
    fn full_chain_completes() {
        let mut wf = ShippingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_shipment", serde_json::json!({"shipment_id": "SHIP-1"}));
        wf.on_activity_completed("shipment_scan", serde_json::json!({"scanned": true}));
        wf.on_activity_completed("verify_shipment", serde_json::json!({"verified": true}));
        wf.on_activity_completed("place_on_dock", serde_json::json!({"placed": true}));
        wf.on_activity_completed("add_to_manifest", serde_json::json!({"manifested": true}));
        wf.on_activity_completed("mark_shipped", serde_json::json!({"marked": true}));
        wf.on_activity_completed("notify_customer", serde_json::json!({"notified": true}));

        let output = wf.result().expect("should complete");
        assert_eq!(output.shipment_id, "SHIP-1");
        assert_eq!(output.tracking_number, "1Z999");
    }

    #[test]
    fn notify_customer_failure_is_non_fatal() {
        let mut wf = ShippingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_shipment", serde_json::json!({"shipment_id": "SHIP-1"}));
        wf.on_activity_completed("shipment_scan", serde_json::json!({"scanned": true}));
        wf.on_activity_completed("verify_shipment", serde_json::json!({"verified": true}));
        wf.on_activity_completed("place_on_dock", serde_json::json!({"placed": true}));
        wf.on_activity_completed("add_to_manifest", serde_json::json!({"manifested": true}));
        wf.on_activity_completed("mark_shipped", serde_json::json!({"marked": true}));

        let actions = wf.on_activity_failed("notify_customer", &ActivityError::retryable("smtp down"));
        assert!(matches!(actions[0], WorkflowAction::CompleteWorkflow { .. }));
        assert!(wf.is_completed());
        assert!(wf.error().is_none());
    }

    #[test]
    fn cancel_before_mark_shipped_fails_workflow() {
        let mut wf = ShippingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_shipment", serde_json::json!({"shipment_id": "SHIP-1"}));

        let actions = wf.on_signal(&WorkflowSignal::cancel("operator abort"));
        assert!(matches!(actions[0], WorkflowAction::FailWorkflow { .. }));
    }
}
