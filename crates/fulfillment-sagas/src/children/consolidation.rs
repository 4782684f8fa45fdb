//! Consolidation child workflow (spec §4.6, stage row "Consolidation": 15 min
//! assign timeout, 1 h loop timeout, artifacts `consolidationId,
//! destinationBin, totalConsolidated`).
//!
//! Unlike picking, `fulfillment-activities` has no `AssignResource`/
//! `FinalizeTask` activities for this stage (only `create_consolidation_task`
//! — see `fulfillment-activities::consolidation`): `stationAssigned` and
//! `consolidationComplete` are themselves the assignment and finalization,
//! carrying the station/result data directly in their payloads rather than
//! via a follow-up activity call.

use fulfillment_domain::dto::{CreateConsolidationTaskRequest, SortTotesRequest};
use fulfillment_runtime::activity::ActivityError;
use fulfillment_runtime::workflow::signal_types;
use fulfillment_runtime::{ActivityOptions, Workflow, WorkflowAction, WorkflowError, WorkflowSignal};
use serde::{Deserialize, Serialize};

use crate::signals::consolidation as sig;

const ASSIGN_TIMER: &str = "assign_timeout";
const STAGE_TIMER: &str = "stage_timeout";

fn assign_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(15 * 60)
}

fn stage_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(60 * 60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationWorkflowInput {
    pub order_id: String,
    pub tote_ids: Vec<String>,
    /// §9 Open Question 3: when set, a `sort_totes` activity runs after
    /// `consolidationComplete` and before the stage reports done.
    #[serde(default)]
    pub sortation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationWorkflowOutput {
    pub consolidation_id: String,
    pub destination_bin: String,
    pub total_consolidated: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    CreatingTask,
    AwaitingAssignment,
    Consolidating,
    Sorting,
    Done,
}

pub struct ConsolidationWorkflow {
    input: ConsolidationWorkflowInput,
    phase: Phase,
    task_id: Option<String>,
    destination_bin: Option<String>,
    total_consolidated: u32,
    pending_output: Option<ConsolidationWorkflowOutput>,
    result: Option<ConsolidationWorkflowOutput>,
    error: Option<WorkflowError>,
}

impl Workflow for ConsolidationWorkflow {
    const TYPE: &'static str = "consolidation";
    type Input = ConsolidationWorkflowInput;
    type Output = ConsolidationWorkflowOutput;

    fn new(input: Self::Input) -> Self {
        Self {
            input,
            phase: Phase::CreatingTask,
            task_id: None,
            destination_bin: None,
            total_consolidated: 0,
            pending_output: None,
            result: None,
            error: None,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        vec![WorkflowAction::ScheduleActivity {
            activity_id: "create_task".into(),
            activity_type: "create_consolidation_task".into(),
            input: serde_json::to_value(CreateConsolidationTaskRequest {
                order_id: self.input.order_id.clone(),
                tote_ids: self.input.tote_ids.clone(),
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
                self.task_id = result
                    .get("task_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                self.phase = Phase::AwaitingAssignment;
                vec![WorkflowAction::timer(ASSIGN_TIMER, assign_timeout())]
            }
            "sort_totes" => {
                self.phase = Phase::Done;
                let output = self.pending_output.clone().unwrap_or(ConsolidationWorkflowOutput {
                    consolidation_id: String::new(),
                    destination_bin: self.destination_bin.clone().unwrap_or_default(),
                    total_consolidated: self.total_consolidated,
                });
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
        _activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction> {
        self.phase = Phase::Done;
        let err = WorkflowError::new(error.message.clone()).with_code("consolidation_failed");
        self.error = Some(err.clone());
        vec![WorkflowAction::fail(err)]
    }

    fn on_timer_fired(&mut self, timer_id: &str) -> Vec<WorkflowAction> {
        match timer_id {
            ASSIGN_TIMER if self.phase == Phase::AwaitingAssignment => {
                self.phase = Phase::Done;
                let err = WorkflowError::new("no station assigned within timeout")
                    .with_code("assign_timeout");
                self.error = Some(err.clone());
                vec![WorkflowAction::fail(err)]
            }
            STAGE_TIMER if self.phase == Phase::Consolidating => {
                self.phase = Phase::Done;
                let err = WorkflowError::new("consolidation did not complete within timeout")
                    .with_code("consolidation_timeout");
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
            sig::STATION_ASSIGNED if self.phase == Phase::AwaitingAssignment => {
                self.phase = Phase::Consolidating;
                self.destination_bin = signal
                    .payload
                    .get("destination_bin")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                vec![WorkflowAction::timer(STAGE_TIMER, stage_timeout())]
            }
            sig::ITEM_CONSOLIDATED if self.phase == Phase::Consolidating => {
                self.total_consolidated += 1;
                vec![]
            }
            sig::CONSOLIDATION_COMPLETE if self.phase == Phase::Consolidating => {
                let output = ConsolidationWorkflowOutput {
                    consolidation_id: signal
                        .payload
                        .get("consolidation_id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    destination_bin: self.destination_bin.clone().unwrap_or_default(),
                    total_consolidated: self.total_consolidated,
                };

                if !self.input.sortation {
                    self.phase = Phase::Done;
                    self.result = Some(output.clone());
                    return vec![WorkflowAction::complete(
                        serde_json::to_value(output).unwrap_or_default(),
                    )];
                }

                self.phase = Phase::Sorting;
                self.pending_output = Some(output);
                vec![WorkflowAction::ScheduleActivity {
                    activity_id: "sort_totes".into(),
                    activity_type: "sort_totes".into(),
                    input: serde_json::to_value(SortTotesRequest {
                        consolidation_id: self
                            .pending_output
                            .as_ref()
                            .map(|o| o.consolidation_id.clone())
                            .unwrap_or_default(),
                        tote_ids: self.input.tote_ids.clone(),
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

    fn input() -> ConsolidationWorkflowInput {
        ConsolidationWorkflowInput {
            order_id: "ORD-002".into(),
            tote_ids: vec!["T-1".into(), "T-2".into()],
            sortation: false,
        }
    }

    #[test]
    fn happy_path_two_items() {
        let mut wf = ConsolidationWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));

        wf.on_signal(&WorkflowSignal::custom(
            sig::STATION_ASSIGNED,
            serde_json::json!({"destination_bin": "BIN-1"}),
        ));
        wf.on_signal(&WorkflowSignal::custom(sig::ITEM_CONSOLIDATED, serde_json::json!({})));
        wf.on_signal(&WorkflowSignal::custom(sig::ITEM_CONSOLIDATED, serde_json::json!({})));
        wf.on_signal(&WorkflowSignal::custom(
            sig::CONSOLIDATION_COMPLETE,
            serde_json::json!({"consolidation_id": "CONS-1"}),
        ));

        let output = wf.result().expect("workflow should complete");
        assert_eq!(output.total_consolidated, 2);
        assert_eq!(output.destination_bin, "BIN-1");
    }

    #[test]
    fn sortation_enabled_schedules_sort_totes_before_completing() {
        let mut input = input();
        input.sortation = true;
        let mut wf = ConsolidationWorkflow::new(input);
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));
        wf.on_signal(&WorkflowSignal::custom(
            sig::STATION_ASSIGNED,
            serde_json::json!({"destination_bin": "BIN-1"}),
        ));

        let actions = wf.on_signal(&WorkflowSignal::custom(
            sig::CONSOLIDATION_COMPLETE,
            serde_json::json!({"consolidation_id": "CONS-1"}),
        ));
        assert!(matches!(
            &actions[0],
            WorkflowAction::ScheduleActivity { activity_type, .. } if activity_type == "sort_totes"
        ));
        assert!(!wf.is_completed());

        wf.on_activity_completed("sort_totes", serde_json::json!({"sorted": true}));
        assert!(wf.is_completed());
        assert_eq!(wf.result().unwrap().consolidation_id, "CONS-1");
    }

    #[test]
    fn assign_timeout_fails_before_station_assigned() {
        let mut wf = ConsolidationWorkflow::new(input());
        wf.on_start();
        wf.on_activity_completed("create_task", serde_json::json!({"task_id": "TASK-1"}));

        let actions = wf.on_timer_fired(ASSIGN_TIMER);
        assert!(matches!(actions[0], WorkflowAction::FailWorkflow { .. }));
    }
}
