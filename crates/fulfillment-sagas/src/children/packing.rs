//! Packing child workflow (spec §4.6, stage row "Packing": 15 min per
//! activity, artifacts `packageId, trackingNumber, carrier, weight`).
//!
//! `CreatePackTask → SelectPackaging → PackItems → WeighPackage →
//! GenerateShippingLabel → ApplyLabel → SealPackage`, honoring `cancel`
//! between every step. Spec §3.1 additionally names `labelGenerated` as
//! Packing's one recognized signal — carrier label generation is treated as
//! asynchronous: `GenerateShippingLabel` submits the request, and the
//! `trackingNumber` artifact is populated from the `labelGenerated` signal
//! rather than the activity's own (synchronous, best-effort) response, so
//! that signal has real work to do rather than sitting unused.

use fulfillment_domain::dto::{
    ApplyLabelRequest, CreatePackTaskRequest, GenerateShippingLabelRequest, GiftWrapPackageRequest,
    PackItemsRequest, SealPackageRequest, SelectPackagingRequest, WeighPackageRequest,
};
use fulfillment_runtime::activity::ActivityError;
use fulfillment_runtime::workflow::signal_types;
use fulfillment_runtime::{ActivityOptions, Workflow, WorkflowAction, WorkflowError, WorkflowSignal};
use serde::{Deserialize, Serialize};

use crate::signals::packing as sig;

const PER_ACTIVITY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15 * 60);
const LABEL_TIMER: &str = "label_timeout";

fn step_options() -> ActivityOptions {
    ActivityOptions::default().with_start_to_close_timeout(PER_ACTIVITY_TIMEOUT)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingWorkflowInput {
    pub order_id: String,
    /// Open Question 2: optional, any cardinality, ignored when absent.
    pub allocation_ids: Option<Vec<String>>,
    pub carrier: String,
    /// §9 Open Question 3: when set, a `gift_wrap_package` activity runs
    /// between `pack_items` and `weigh_package`.
    #[serde(default)]
    pub gift_wrap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingWorkflowOutput {
    pub package_id: String,
    pub tracking_number: String,
    pub carrier: String,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    CreatingTask,
    SelectingPackaging,
    PackingItems,
    GiftWrapping,
    Weighing,
    GeneratingLabel,
    AwaitingLabel,
    ApplyingLabel,
    Sealing,
    Done,
}

pub struct PackingWorkflow {
    input: PackingWorkflowInput,
    phase: Phase,
    task_id: Option<String>,
    package_id: Option<String>,
    weight_kg: f64,
    tracking_number: Option<String>,
    result: Option<PackingWorkflowOutput>,
    error: Option<WorkflowError>,
}

impl PackingWorkflow {
    fn fail(&mut self, code: &str, message: impl Into<String>) -> Vec<WorkflowAction> {
        self.phase = Phase::Done;
        let err = WorkflowError::new(message.into()).with_code(code);
        self.error = Some(err.clone());
        vec![WorkflowAction::fail(err)]
    }

    fn package_id(&self) -> String {
        self.package_id.clone().unwrap_or_default()
    }
}

impl Workflow for PackingWorkflow {
    const TYPE: &'static str = "packing";
    type Input = PackingWorkflowInput;
    type Output = PackingWorkflowOutput;

    fn new(input: Self::Input) -> Self {
        Self {
            input,
            phase: Phase::CreatingTask,
            task_id: None,
            package_id: None,
            weight_kg: 0.0,
            tracking_number: None,
            result: None,
            error: None,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        vec![WorkflowAction::ScheduleActivity {
            activity_id: "create_pack_task".into(),
            activity_type: "create_pack_task".into(),
            input: serde_json::to_value(CreatePackTaskRequest {
                order_id: self.input.order_id.clone(),
                allocation_ids: self.input.allocation_ids.clone(),
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
            "create_pack_task" => {
                self.task_id = result.get("task_id").and_then(|v| v.as_str()).map(str::to_string);
                self.phase = Phase::SelectingPackaging;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "select_packaging".into(),
                    activity_type: "select_packaging".into(),
                    input: serde_json::to_value(SelectPackagingRequest {
                        task_id: self.task_id.clone().unwrap_or_default(),
                        allocation_ids: self.input.allocation_ids.clone(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "select_packaging" => {
                self.package_id = result.get("package_id").and_then(|v| v.as_str()).map(str::to_string);
                self.phase = Phase::PackingItems;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "pack_items".into(),
                    activity_type: "pack_items".into(),
                    input: serde_json::to_value(PackItemsRequest {
                        package_id: self.package_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "pack_items" => {
                if self.input.gift_wrap {
                    self.phase = Phase::GiftWrapping;
                    return vec![WorkflowAction::ScheduleActivity {
                        activity_id: "gift_wrap_package".into(),
                        activity_type: "gift_wrap_package".into(),
                        input: serde_json::to_value(GiftWrapPackageRequest {
                            package_id: self.package_id(),
                        })
                        .unwrap_or_default(),
                        options: step_options(),
                    }];
                }
                self.phase = Phase::Weighing;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "weigh_package".into(),
                    activity_type: "weigh_package".into(),
                    input: serde_json::to_value(WeighPackageRequest {
                        package_id: self.package_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "gift_wrap_package" => {
                self.phase = Phase::Weighing;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "weigh_package".into(),
                    activity_type: "weigh_package".into(),
                    input: serde_json::to_value(WeighPackageRequest {
                        package_id: self.package_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "weigh_package" => {
                self.weight_kg = result.get("weight_kg").and_then(|v| v.as_f64()).unwrap_or(0.0);
                self.phase = Phase::GeneratingLabel;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "generate_shipping_label".into(),
                    activity_type: "generate_shipping_label".into(),
                    input: serde_json::to_value(GenerateShippingLabelRequest {
                        package_id: self.package_id(),
                        carrier: self.input.carrier.clone(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "generate_shipping_label" => {
                self.phase = Phase::AwaitingLabel;
                vec![WorkflowAction::timer(LABEL_TIMER, PER_ACTIVITY_TIMEOUT)]
            }
            "apply_label" => {
                self.phase = Phase::Sealing;
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "seal_package".into(),
                    activity_type: "seal_package".into(),
                    input: serde_json::to_value(SealPackageRequest {
                        package_id: self.package_id(),
                    })
                    .unwrap_or_default(),
                    options: step_options(),
                }]
            }
            "seal_package" => {
                self.phase = Phase::Done;
                let output = PackingWorkflowOutput {
                    package_id: self.package_id(),
                    tracking_number: self.tracking_number.clone().unwrap_or_default(),
                    carrier: self.input.carrier.clone(),
                    weight_kg: self.weight_kg,
                };
                self.result = Some(output.clone());
                vec![WorkflowAction::complete(
                    serde_json::to_value(output).unwrap_or_default(),
                )]
            }
            _ => vec![],
        }
    }

    fn on_activity_failed(
        &mut self,
        activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction> {
        self.fail("packing_failed", format!("{activity_id}: {}", error.message))
    }

    fn on_timer_fired(&mut self, timer_id: &str) -> Vec<WorkflowAction> {
        if timer_id == LABEL_TIMER && self.phase == Phase::AwaitingLabel {
            return self.fail("label_timeout", "carrier did not confirm label within timeout");
        }
        vec![]
    }

    fn on_signal(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        if signal.signal_type == signal_types::CANCEL {
            return self.fail("cancelled", "cancelled");
        }

        if signal.signal_type == sig::LABEL_GENERATED && self.phase == Phase::AwaitingLabel {
            self.tracking_number = signal
                .payload
                .get("tracking_number")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            self.phase = Phase::ApplyingLabel;
            return vec![WorkflowAction::ScheduleActivity {
                activity_id: "apply_label".into(),
                activity_type: "apply_label".into(),
                input: serde_json::to_value(ApplyLabelRequest {
                    package_id: self.package_id(),
                    tracking_number: self.tracking_number.clone().unwrap_or_default(),
                })
                .unwrap_or_default(),
                options: step_options(),
            }];
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

    fn input() -> PackingWorkflowInput {
        PackingWorkflowInput {
            order_id: "ORD-001".into(),
            allocation_ids: None,
            carrier: "UPS".into(),
            gift_wrap: false,
        }
    }

    #[test]
    fn full_chain_completes() {
        let mut wf = PackingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_pack_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_activity_completed("select_packaging", serde_json::json!({"package_id": "PKG-1"}));
        wf.on_activity_completed("pack_items", serde_json::json!({"packed": true}));
        wf.on_activity_completed("weigh_package", serde_json::json!({"weight_kg": 2.5}));
        wf.on_activity_completed(
            "generate_shipping_label",
            serde_json::json!({"tracking_number": "unused-ack"}),
        );
        assert!(!wf.is_completed());

        wf.on_signal(&WorkflowSignal::custom(
            sig::LABEL_GENERATED,
            serde_json::json!({"tracking_number": "1Z999"}),
        ));
        wf.on_activity_completed("apply_label", serde_json::json!({"applied": true}));
        wf.on_activity_completed("seal_package", serde_json::json!({"sealed": true}));

        let output = wf.result().expect("should complete");
        assert_eq!(output.package_id, "PKG-1");
        assert_eq!(output.tracking_number, "1Z999");
        assert_eq!(output.weight_kg, 2.5);
    }

    #[test]
    fn gift_wrap_enabled_runs_between_pack_items_and_weigh() {
        let mut input = input();
        input.gift_wrap = true;
        let mut wf = PackingWorkflow::new(input);
        wf.on_start();
        wf.on_activity_completed("create_pack_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_activity_completed("select_packaging", serde_json::json!({"package_id": "PKG-1"}));

        let actions = wf.on_activity_completed("pack_items", serde_json::json!({"packed": true}));
        assert!(matches!(
            &actions[0],
            WorkflowAction::ScheduleActivity { activity_type, .. } if activity_type == "gift_wrap_package"
        ));

        let actions = wf.on_activity_completed("gift_wrap_package", serde_json::json!({"wrapped": true}));
        assert!(matches!(
            &actions[0],
            WorkflowAction::ScheduleActivity { activity_type, .. } if activity_type == "weigh_package"
        ));
    }

    #[test]
    fn cancel_between_activities_fails_workflow() {
        let mut wf = PackingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_pack_task", serde_json::json!({"task_id": "TASK-1"}));

        let actions = wf.on_signal(&WorkflowSignal::cancel("operator abort"));
        assert!(matches!(actions[0], WorkflowAction::FailWorkflow { .. }));
        assert_eq!(wf.error().unwrap().code, Some("cancelled".to_string()));
    }

    #[test]
    fn label_timeout_fails_workflow() {
        let mut wf = PackingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_pack_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_activity_completed("select_packaging", serde_json::json!({"package_id": "PKG-1"}));
        wf.on_activity_completed("pack_items", serde_json::json!({"packed": true}));
        wf.on_activity_completed("weigh_package", serde_json::json!({"weight_kg": 2.5}));
        wf.on_activity_completed("generate_shipping_label", serde_json::json!({}));

        let actions = wf.on_timer_fired(LABEL_TIMER);
        assert!(matches!(actions[0], WorkflowAction::FailWorkflow { .. }));
        assert_eq!(wf.error().unwrap().code, Some("label_timeout".to_string()));
    }
}
