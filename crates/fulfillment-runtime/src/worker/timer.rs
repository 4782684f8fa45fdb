//! Timer service
//!
//! Workflows record `StartTimer` actions as `TimerStarted` events, but something has
//! to actually wake the workflow back up once the duration elapses. [`TimerService`]
//! is that something; [`TokioTimerService`] is the default single-process
//! implementation built on `tokio::time::sleep`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::engine::WorkflowExecutor;
use crate::persistence::WorkflowEventStore;

/// Fires a previously started workflow timer once its duration has elapsed.
///
/// Implementations must be resilient to process restarts: a timer scheduled
/// on one process and not yet fired when the process exits should eventually
/// fire anyway (for [`TokioTimerService`], this means a recovery sweep must
/// re-schedule `TimerStarted` events with no matching `TimerFired`).
#[async_trait]
pub trait TimerService: Send + Sync + 'static {
    /// Schedule `timer_id` on `workflow_id` to fire after `duration`.
    async fn schedule(&self, workflow_id: Uuid, timer_id: String, duration: Duration);
}

/// In-process timer service backed by `tokio::time::sleep`.
///
/// Each scheduled timer becomes its own detached task. This is adequate for a
/// single-process deployment or for development; a multi-worker production
/// deployment should instead run a recovery sweep over `TimerStarted` events
/// with no matching `TimerFired` on startup, since in-flight `sleep` futures
/// are lost on crash.
pub struct TokioTimerService<S: WorkflowEventStore> {
    executor: Arc<WorkflowExecutor<S>>,
}

impl<S: WorkflowEventStore> TokioTimerService<S> {
    /// Create a timer service that fires timers back into `executor`.
    pub fn new(executor: Arc<WorkflowExecutor<S>>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<S: WorkflowEventStore> TimerService for TokioTimerService<S> {
    #[instrument(skip(self))]
    async fn schedule(&self, workflow_id: Uuid, timer_id: String, duration: Duration) {
        let executor = self.executor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Err(error) = executor.on_timer_fired(workflow_id, &timer_id).await {
                error!(%workflow_id, %timer_id, %error, "failed to fire workflow timer");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryWorkflowEventStore;
    use crate::workflow::WorkflowAction;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct TimerInput;

    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct TimerOutput;

    struct TimerWorkflow {
        fired: bool,
    }

    impl crate::workflow::Workflow for TimerWorkflow {
        const TYPE: &'static str = "timer_test_workflow";
        type Input = TimerInput;
        type Output = TimerOutput;

        fn new(_input: Self::Input) -> Self {
            Self { fired: false }
        }

        fn on_start(&mut self) -> Vec<WorkflowAction> {
            vec![WorkflowAction::timer("t1", Duration::from_millis(10))]
        }

        fn on_activity_completed(
            &mut self,
            _activity_id: &str,
            _result: serde_json::Value,
        ) -> Vec<WorkflowAction> {
            vec![]
        }

        fn on_activity_failed(
            &mut self,
            _activity_id: &str,
            _error: &crate::activity::ActivityError,
        ) -> Vec<WorkflowAction> {
            vec![]
        }

        fn on_timer_fired(&mut self, _timer_id: &str) -> Vec<WorkflowAction> {
            self.fired = true;
            vec![WorkflowAction::complete(serde_json::json!({}))]
        }

        fn is_completed(&self) -> bool {
            self.fired
        }

        fn result(&self) -> Option<Self::Output> {
            self.fired.then_some(TimerOutput)
        }
    }

    #[tokio::test]
    async fn timer_service_fires_and_completes_workflow() {
        let store = InMemoryWorkflowEventStore::new();
        let mut executor = WorkflowExecutor::new(store);
        executor.register::<TimerWorkflow>();
        let executor = Arc::new(executor);
        executor.set_timer_service(Arc::new(TokioTimerService::new(executor.clone())));

        let workflow_id = executor
            .start_workflow::<TimerWorkflow>(TimerInput, None)
            .await
            .expect("should start workflow");

        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = executor
            .store()
            .get_workflow_status(workflow_id)
            .await
            .expect("should get status");

        assert_eq!(status, crate::persistence::WorkflowStatus::Completed);
    }
}
