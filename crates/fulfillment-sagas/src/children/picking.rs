//! Picking child workflow (spec §4.6, stage row "Picking": 30 min assign
//! timeout, 2 h loop timeout, artifact `pickedItems[]`).

use std::collections::HashSet;

use fulfillment_domain::dto::{
    AssignResourceRequest, CreatePickTaskRequest, FinalizeTaskRequest, OrderLineItem, PickedItem,
    ReprocessPickExceptionRequest,
};
use fulfillment_runtime::activity::ActivityError;
use fulfillment_runtime::workflow::signal_types;
use fulfillment_runtime::{ActivityOptions, Workflow, WorkflowAction, WorkflowError, WorkflowSignal};
use serde::{Deserialize, Serialize};

use crate::signals::picking as sig;

const ASSIGN_TIMER: &str = "assign_timeout";
const STAGE_TIMER: &str = "stage_timeout";

fn assign_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(30 * 60)
}

fn stage_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(2 * 60 * 60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickingWorkflowInput {
    pub order_id: String,
    pub wave_id: String,
    pub items: Vec<OrderLineItem>,
    /// §9 Open Question 3: when set, a `pickException` signal schedules a
    /// `reprocess_pick_exception` activity instead of being logged and dropped.
    #[serde(default)]
    pub reprocessing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickingWorkflowOutput {
    pub task_id: String,
    pub picked_items: Vec<PickedItem>,
    /// `false` when `pickingComplete` reported `success: false` — resolves
    /// Open Question 1 in combination with `crate::capabilities::PickingPolicy`.
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    CreatingTask,
    AwaitingAssignment,
    Picking,
    Finalizing,
    Done,
}

pub struct PickingWorkflow {
    input: PickingWorkflowInput,
    phase: Phase,
    task_id: Option<String>,
    picked_items: Vec<PickedItem>,
    seen: HashSet<String>,
    pick_success: bool,
    exception_count: u32,
    result: Option<PickingWorkflowOutput>,
    error: Option<WorkflowError>,
}

impl PickingWorkflow {
    fn dedup_key(item: &PickedItem) -> String {
        format!("{}:{}:{}", item.sku, item.qty, item.location_id)
    }

    fn finalize_actions(&mut self) -> Vec<WorkflowAction> {
        self.phase = Phase::Finalizing;
        let task_id = self.task_id.clone().unwrap_or_default();
        vec![WorkflowAction::ScheduleActivity {
            activity_id: "finalize_task".into(),
            activity_type: "finalize_pick_task".into(),
            input: serde_json::to_value(FinalizeTaskRequest { task_id }).unwrap_or_default(),
            options: ActivityOptions::default(),
        }]
    }
}

impl Workflow for PickingWorkflow {
    const TYPE: &'static str = "picking";
    type Input = PickingWorkflowInput;
    type Output = PickingWorkflowOutput;

    fn new(input: Self::Input) -> Self {
        Self {
            input,
            phase: Phase::CreatingTask,
            task_id: None,
            picked_items: Vec::new(),
            seen: HashSet::new(),
            pick_success: true,
            exception_count: 0,
            result: None,
            error: None,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        vec![WorkflowAction::ScheduleActivity {
            activity_id: "create_task".into(),
            activity_type: "create_pick_task".into(),
            input: serde_json::to_value(CreatePickTaskRequest {
                order_id: self.input.order_id.clone(),
                wave_id: self.input.wave_id.clone(),
                items: self.input.items.clone(),
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
            "create_task" => {
                let task_id = result
                    .get("task_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                self.task_id = Some(task_id);
                self.phase = Phase::AwaitingAssignment;
                vec![WorkflowAction::timer(ASSIGN_TIMER, assign_timeout())]
            }
            "assign_resource" => {
                // Best-effort; whether it actually assigned doesn't gate the loop.
                vec![]
            }
            id if id.starts_with("reprocess_pick_exception") => {
                // Best-effort; reprocessing outcome doesn't gate the loop.
                vec![]
            }
            "finalize_task" => {
                self.phase = Phase::Done;
                let output = PickingWorkflowOutput {
                    task_id: self.task_id.clone().unwrap_or_default(),
                    picked_items: self.picked_items.clone(),
                    success: self.pick_success,
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
        match activity_id {
            "assign_resource" => vec![],
            id if id.starts_with("reprocess_pick_exception") => vec![],
            _ => {
                self.phase = Phase::Done;
                let err = WorkflowError::new(error.message.clone()).with_code("picking_failed");
                self.error = Some(err.clone());
                vec![WorkflowAction::fail(err)]
            }
        }
    }

    fn on_timer_fired(&mut self, timer_id: &str) -> Vec<WorkflowAction> {
        match timer_id {
            ASSIGN_TIMER if self.phase == Phase::AwaitingAssignment => {
                self.phase = Phase::Done;
                let err = WorkflowError::new("no worker assigned within timeout")
                    .with_code("assign_timeout");
                self.error = Some(err.clone());
                vec![WorkflowAction::fail(err)]
            }
            STAGE_TIMER if self.phase == Phase::Picking => {
                self.phase = Phase::Done;
                let err =
                    WorkflowError::new("picking did not complete within timeout").with_code("picking_timeout");
                self.error = Some(err.clone());
                vec![WorkflowAction::fail(err)]
            }
            _ => vec![],
        }
    }

    fn on_signal(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        if signal.signal_type == signal_types::CANCEL {
            self.phase = Phase::Done;
            let err = WorkflowError::new("cancelled").with_code("cancelled");
            self.error = Some(err.clone());
            return vec![WorkflowAction::fail(err)];
        }

        match signal.signal_type.as_str() {
            sig::WORKER_ASSIGNED if self.phase == Phase::AwaitingAssignment => {
                self.phase = Phase::Picking;
                let worker_id = signal
                    .payload
                    .get("worker_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let task_id = self.task_id.clone().unwrap_or_default();
                vec![
                    WorkflowAction::ScheduleActivity {
                        activity_id: "assign_resource".into(),
                        activity_type: "assign_pick_resource".into(),
                        input: serde_json::to_value(AssignResourceRequest { task_id, worker_id })
                            .unwrap_or_default(),
                        options: ActivityOptions::default(),
                    },
                    WorkflowAction::timer(STAGE_TIMER, stage_timeout()),
                ]
            }
            sig::ITEM_PICKED if self.phase == Phase::Picking => {
                let Ok(item) = serde_json::from_value::<PickedItem>(signal.payload.clone()) else {
                    return vec![];
                };
                let key = Self::dedup_key(&item);
                if self.seen.insert(key) {
                    self.picked_items.push(item);
                }
                vec![]
            }
            sig::PICKING_COMPLETE if self.phase == Phase::Picking => {
                self.pick_success = signal
                    .payload
                    .get("success")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true);
                self.finalize_actions()
            }
            sig::PICK_EXCEPTION if self.phase == Phase::Picking => {
                tracing::warn!(
                    order_id = %self.input.order_id,
                    payload = %signal.payload,
                    "pick exception signal received, continuing"
                );
                if !self.input.reprocessing {
                    return vec![];
                }
                self.exception_count += 1;
                let task_id = self.task_id.clone().unwrap_or_default();
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: format!("reprocess_pick_exception_{}", self.exception_count),
                    activity_type: "reprocess_pick_exception".into(),
                    input: serde_json::to_value(ReprocessPickExceptionRequest {
                        task_id,
                        exception: signal.payload.clone(),
                    })
                    .unwrap_or_default(),
                    options: ActivityOptions::default(),
                }]
            }
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

    fn input() -> PickingWorkflowInput {
        PickingWorkflowInput {
            order_id: "ORD-001".into(),
            wave_id: "W-1".into(),
            items: vec![OrderLineItem {
                sku: "SKU-1".into(),
                qty: 1,
            }],
            reprocessing: false,
        }
    }

    #[test]
    fn happy_path_single_item() {
        let mut wf = PickingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));
        assert_eq!(wf.phase, Phase::AwaitingAssignment);

        wf.on_signal(&WorkflowSignal::custom(
            sig::WORKER_ASSIGNED,
            serde_json::json!({"worker_id": "WK-1"}),
        ));
        assert_eq!(wf.phase, Phase::Picking);

        wf.on_signal(&WorkflowSignal::custom(
            sig::ITEM_PICKED,
            serde_json::json!({"sku": "SKU-1", "qty": 1, "location_id": "LOC-PICK-001", "tote_id": "T-1"}),
        ));
        assert_eq!(wf.picked_items.len(), 1);

        let actions = wf.on_signal(&WorkflowSignal::custom(
            sig::PICKING_COMPLETE,
            serde_json::json!({"success": true}),
        ));
        assert!(matches!(actions[0], WorkflowAction::ScheduleActivity { .. }));

        wf.on_activity_completed("finalize_task", serde_json::json!({"finalized": true}));
        assert!(wf.is_completed());
        assert!(wf.result().unwrap().success);
    }

    #[test]
    fn duplicate_item_picked_signal_counts_once() {
        let mut wf = PickingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_signal(&WorkflowSignal::custom(
            sig::WORKER_ASSIGNED,
            serde_json::json!({"worker_id": "WK-1"}),
        ));

        let payload = serde_json::json!({"sku": "SKU-1", "qty": 1, "location_id": "LOC-PICK-001", "tote_id": "T-1"});
        wf.on_signal(&WorkflowSignal::custom(sig::ITEM_PICKED, payload.clone()));
        wf.on_signal(&WorkflowSignal::custom(sig::ITEM_PICKED, payload));

        assert_eq!(wf.picked_items.len(), 1);
    }

    #[test]
    fn assign_timeout_fails_workflow() {
        let mut wf = PickingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));

        let actions = wf.on_timer_fired(ASSIGN_TIMER);
        assert!(matches!(actions[0], WorkflowAction::FailWorkflow { .. }));
        assert_eq!(wf.error().unwrap().code, Some("assign_timeout".to_string()));
    }

    #[test]
    fn stage_timer_after_completion_is_ignored() {
        let mut wf = PickingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_signal(&WorkflowSignal::custom(
            sig::WORKER_ASSIGNED,
            serde_json::json!({"worker_id": "WK-1"}),
        ));
        wf.on_signal(&WorkflowSignal::custom(
            sig::PICKING_COMPLETE,
            serde_json::json!({"success": true}),
        ));
        wf.on_activity_completed("finalize_task", serde_json::json!({"finalized": true}));

        let actions = wf.on_timer_fired(STAGE_TIMER);
        assert!(actions.is_empty());
    }

    #[test]
    fn cancel_signal_fails_with_cancelled_code() {
        let mut wf = PickingWorkflow::new(input());
        wf.on_start();
        let actions = wf.on_signal(&WorkflowSignal::cancel("operator abort"));
        assert!(matches!(actions[0], WorkflowAction::FailWorkflow { .. }));
        assert_eq!(wf.error().unwrap().code, Some("cancelled".to_string()));
    }

    #[test]
    fn pick_exception_is_ignored_when_reprocessing_disabled() {
        let mut wf = PickingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_signal(&WorkflowSignal::custom(
            sig::WORKER_ASSIGNED,
            serde_json::json!({"worker_id": "WK-1"}),
        ));

        let actions = wf.on_signal(&WorkflowSignal::custom(
            sig::PICK_EXCEPTION,
            serde_json::json!({"reason": "damaged item"}),
        ));
        assert!(actions.is_empty());
    }

    #[test]
    fn pick_exception_schedules_reprocessing_when_enabled() {
        let mut input = input();
        input.reprocessing = true;
        let mut wf = PickingWorkflow::new(input);
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_signal(&WorkflowSignal::custom(
            sig::WORKER_ASSIGNED,
            serde_json::json!({"worker_id": "WK-1"}),
        ));

        let actions = wf.on_signal(&WorkflowSignal::custom(
            sig::PICK_EXCEPTION,
            serde_json::json!({"reason": "damaged item"}),
        ));
        assert!(matches!(
            &actions[0],
            WorkflowAction::ScheduleActivity { activity_type, .. } if activity_type == "reprocess_pick_exception"
        ));

        // The stage keeps going afterward.
        let actions = wf.on_signal(&WorkflowSignal::custom(
            sig::PICKING_COMPLETE,
            serde_json::json!({"success": true}),
        ));
        assert!(matches!(actions[0], WorkflowAction::ScheduleActivity { .. }));
    }

    #[test]
    fn partial_pick_still_completes_with_success_false() {
        let mut wf = PickingWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_signal(&WorkflowSignal::custom(
            sig::WORKER_ASSIGNED,
            serde_json::json!({"worker_id": "WK-1"}),
        ));
        wf.on_signal(&WorkflowSignal::custom(
            sig::PICKING_COMPLETE,
            serde_json::json!({"success": false}),
        ));
        wf.on_activity_completed("finalize_task", serde_json::json!({"finalized": true}));

        assert!(wf.is_completed());
        assert!(!wf.result().unwrap().success);
        assert!(wf.error().is_none());
    }
}
