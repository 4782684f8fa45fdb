//! Wires `WorkerPool`'s [`ActivityResultSink`] seam to a concrete
//! `WorkflowExecutor`, so a claimed task finishing also advances the
//! workflow that scheduled it. Without this adapter the two halves of the
//! runtime (task queue and workflow log) never talk to each other.

use std::sync::Arc;

use async_trait::async_trait;
use fulfillment_runtime::worker::ActivityResultSink;
use fulfillment_runtime::{ActivityError, ActivityFailure, WorkflowEventStore, WorkflowExecutor};
use tracing::error;
use uuid::Uuid;

pub struct ExecutorResultSink<S: WorkflowEventStore> {
    executor: Arc<WorkflowExecutor<S>>,
}

impl<S: WorkflowEventStore> ExecutorResultSink<S> {
    pub fn new(executor: Arc<WorkflowExecutor<S>>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<S: WorkflowEventStore> ActivityResultSink for ExecutorResultSink<S> {
    async fn on_completed(&self, workflow_id: Uuid, activity_id: &str, result: serde_json::Value) {
        if let Err(e) = self
            .executor
            .on_activity_completed(workflow_id, activity_id, result)
            .await
        {
            error!(%workflow_id, %activity_id, %e, "failed to drive workflow forward after activity completion");
        }
    }

    async fn on_failed(
        &self,
        workflow_id: Uuid,
        activity_id: &str,
        failure: &ActivityFailure,
        will_retry: bool,
    ) {
        let error = if failure.retryable {
            ActivityError::retryable(failure.message.clone())
        } else {
            ActivityError::non_retryable(failure.message.clone())
        };

        if let Err(e) = self
            .executor
            .on_activity_failed(workflow_id, activity_id, error, will_retry)
            .await
        {
            error!(%workflow_id, %activity_id, %e, "failed to drive workflow forward after activity failure");
        }
    }
}
