//! Deterministic replay harness (spec §4.9).
//!
//! A [`HistoryFixture`] freezes a recorded `(workflow_type, input, events)`
//! triple together with the decision stream (`Vec<WorkflowAction>` per turn)
//! that the workflow produced when that history was first recorded.
//! [`ReplayRunner::check`] replays the fixture against the *current* workflow
//! binary, turn by turn, and diffs the fresh decision stream against the
//! frozen one. Any mismatch means the workflow's logic is no longer
//! deterministic with respect to its own history — a hard CI failure, not a
//! warning.
//!
//! Grounded in `fulfillment_runtime::engine::executor::Executor::replay_event`,
//! whose event-to-callback dispatch this harness mirrors exactly (it has to:
//! diverging dispatch would make every fixture a false positive).

use fulfillment_runtime::{AnyWorkflow, RegistryError, WorkflowAction, WorkflowEvent, WorkflowRegistry};
use serde::{Deserialize, Serialize};

/// A recorded workflow history plus the decision stream it produced.
///
/// `events` is the same append-only log the executor persists
/// (`WorkflowEventStore::load_events`, minus the sequence numbers). `decisions`
/// holds one entry per event in `events`: the actions the workflow returned
/// in response to that event at record time, empty for events that don't
/// drive a callback (`WorkflowCompleted`, `ActivityScheduled`, and so on —
/// see `dispatch`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryFixture {
    pub workflow_type: String,
    pub input: serde_json::Value,
    pub events: Vec<WorkflowEvent>,
    pub decisions: Vec<Vec<WorkflowAction>>,
}

impl HistoryFixture {
    /// Build a fixture by running `events` through a freshly created
    /// workflow once and freezing whatever decisions come out. This is how a
    /// fixture is captured the first time; subsequent `ReplayRunner::check`
    /// calls diff against the frozen result, not against a second live run.
    pub fn capture(
        registry: &WorkflowRegistry,
        workflow_type: impl Into<String>,
        input: serde_json::Value,
        events: Vec<WorkflowEvent>,
    ) -> Result<Self, ReplayError> {
        let workflow_type = workflow_type.into();
        let mut workflow = registry.create(&workflow_type, input.clone())?;
        let decisions = events
            .iter()
            .map(|event| dispatch(&mut *workflow, event))
            .collect();

        Ok(Self {
            workflow_type,
            input,
            events,
            decisions,
        })
    }
}

/// Apply a single recorded event to a type-erased workflow instance the same
/// way `Executor::replay_event` does, returning whatever actions the
/// callback produced instead of discarding them.
///
/// `ActivityFailed` only calls `on_activity_failed` when `will_retry` is
/// false, matching the executor: intermediate (will-retry) failures never
/// reach workflow code, so they never appear in a decision stream either.
fn dispatch(workflow: &mut dyn AnyWorkflow, event: &WorkflowEvent) -> Vec<WorkflowAction> {
    match event {
        WorkflowEvent::WorkflowStarted { .. } => workflow.on_start(),
        WorkflowEvent::ActivityCompleted {
            activity_id,
            result,
        } => workflow.on_activity_completed(activity_id, result.clone()),
        WorkflowEvent::ActivityFailed {
            activity_id,
            error,
            will_retry,
        } => {
            if *will_retry {
                vec![]
            } else {
                workflow.on_activity_failed(activity_id, error)
            }
        }
        WorkflowEvent::TimerFired { timer_id } => workflow.on_timer_fired(timer_id),
        WorkflowEvent::SignalReceived { signal } => workflow.on_signal(signal),
        WorkflowEvent::ChildWorkflowCompleted {
            child_id, result, ..
        } => workflow.on_child_workflow_completed(child_id, result.clone()),
        WorkflowEvent::ChildWorkflowFailed {
            child_id, error, ..
        } => workflow.on_child_workflow_failed(child_id, error),
        WorkflowEvent::VersionMarker { change_id, version } => {
            workflow.on_version_marker(change_id, *version);
            vec![]
        }
        WorkflowEvent::WorkflowCompleted { .. }
        | WorkflowEvent::WorkflowFailed { .. }
        | WorkflowEvent::WorkflowCancelled { .. }
        | WorkflowEvent::ActivityScheduled { .. }
        | WorkflowEvent::ActivityStarted { .. }
        | WorkflowEvent::ActivityTimedOut { .. }
        | WorkflowEvent::ActivityCancelled { .. }
        | WorkflowEvent::TimerStarted { .. }
        | WorkflowEvent::TimerCancelled { .. }
        | WorkflowEvent::ChildWorkflowStarted { .. } => vec![],
    }
}

/// Replays fixtures against the workflow types registered in a
/// [`WorkflowRegistry`], so the harness and the production executor are
/// always parameterized by the same set of workflows.
pub struct ReplayRunner<'a> {
    registry: &'a WorkflowRegistry,
}

impl<'a> ReplayRunner<'a> {
    pub fn new(registry: &'a WorkflowRegistry) -> Self {
        Self { registry }
    }

    /// Replay `fixture.events` against a fresh instance of the registered
    /// workflow and compare the resulting decision stream, turn by turn,
    /// against `fixture.decisions`.
    pub fn check(&self, fixture: &HistoryFixture) -> Result<(), ReplayError> {
        if fixture.events.len() != fixture.decisions.len() {
            return Err(ReplayError::MalformedFixture {
                reason: format!(
                    "{} events but {} recorded decision turns",
                    fixture.events.len(),
                    fixture.decisions.len()
                ),
            });
        }

        let mut workflow = self
            .registry
            .create(&fixture.workflow_type, fixture.input.clone())?;

        for (turn, (event, recorded)) in fixture
            .events
            .iter()
            .zip(fixture.decisions.iter())
            .enumerate()
        {
            let actual = dispatch(&mut *workflow, event);
            if &actual != recorded {
                tracing::error!(
                    workflow_type = %fixture.workflow_type,
                    turn,
                    ?recorded,
                    ?actual,
                    "replay decision stream diverged"
                );
                return Err(ReplayError::Divergence {
                    turn,
                    recorded: recorded.clone(),
                    actual,
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("unknown workflow type in fixture: {0}")]
    Registry(#[from] RegistryError),

    #[error("malformed fixture: {reason}")]
    MalformedFixture { reason: String },

    #[error("decision stream diverged at turn {turn}: recorded {recorded:?}, actual {actual:?}")]
    Divergence {
        turn: usize,
        recorded: Vec<WorkflowAction>,
        actual: Vec<WorkflowAction>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulfillment_sagas::{CancellationOrchestrator, CancellationOrchestratorInput, TerminalState};

    fn registry() -> WorkflowRegistry {
        let mut registry = WorkflowRegistry::new();
        registry.register::<CancellationOrchestrator>();
        registry
    }

    fn input() -> serde_json::Value {
        serde_json::to_value(CancellationOrchestratorInput {
            order_id: "ORD-001".into(),
            reason: "customer requested".into(),
            terminal_state: TerminalState::Cancelled,
        })
        .unwrap()
    }

    fn happy_path_events() -> Vec<WorkflowEvent> {
        vec![
            WorkflowEvent::WorkflowStarted { input: input() },
            WorkflowEvent::ActivityCompleted {
                activity_id: "cancel_order".into(),
                result: serde_json::json!({"cancelled": true}),
            },
            WorkflowEvent::ActivityCompleted {
                activity_id: "release_inventory_reservation".into(),
                result: serde_json::json!({"released": true}),
            },
            WorkflowEvent::ActivityCompleted {
                activity_id: "notify_customer_cancellation".into(),
                result: serde_json::json!({"notified": true}),
            },
        ]
    }

    #[test]
    fn fresh_replay_matches_captured_decisions() {
        let registry = registry();
        let fixture =
            HistoryFixture::capture(&registry, "cancellation_orchestrator", input(), happy_path_events())
                .expect("capture should succeed");

        let runner = ReplayRunner::new(&registry);
        assert!(runner.check(&fixture).is_ok());
    }

    #[test]
    fn tampered_decision_stream_is_caught_as_divergence() {
        let registry = registry();
        let mut fixture =
            HistoryFixture::capture(&registry, "cancellation_orchestrator", input(), happy_path_events())
                .expect("capture should succeed");

        // Simulate a workflow code change that altered the response to the
        // first activity completion.
        fixture.decisions[1] = vec![];

        let runner = ReplayRunner::new(&registry);
        let err = runner.check(&fixture).expect_err("should diverge");
        assert!(matches!(err, ReplayError::Divergence { turn: 1, .. }));
    }

    #[test]
    fn unknown_workflow_type_is_a_registry_error() {
        let registry = registry();
        let fixture = HistoryFixture {
            workflow_type: "not_registered".into(),
            input: input(),
            events: happy_path_events(),
            decisions: vec![vec![]; 4],
        };

        let runner = ReplayRunner::new(&registry);
        assert!(matches!(
            runner.check(&fixture),
            Err(ReplayError::Registry(_))
        ));
    }
}
