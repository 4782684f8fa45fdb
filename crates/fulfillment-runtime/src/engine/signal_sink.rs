//! Narrow, object-safe facade over [`WorkflowExecutor`] exposing only the two
//! operations a signal-delivery front end needs: hand a signal to a workflow
//! and drive it forward. `WorkflowExecutor<S>` itself can't be used as a
//! `dyn` collaborator (`register`/`start_workflow` are generic over `W`), so
//! `fulfillment-signalbus` depends on this trait instead of the concrete,
//! store-parameterized executor type — the same seam [`super::DerivedIdIndex`]
//! already provides for the start-time id mapping.

use async_trait::async_trait;
use uuid::Uuid;

use crate::persistence::WorkflowEventStore;
use crate::workflow::WorkflowSignal;

use super::executor::{ExecutorError, WorkflowExecutor};

#[async_trait]
pub trait SignalSink: Send + Sync + 'static {
    /// Append `signal` to the workflow's pending-signal queue (spec §3.2
    /// invariant 4: at-least-once, duplicate-tolerant delivery).
    async fn send_signal(&self, workflow_id: Uuid, signal: WorkflowSignal) -> Result<(), ExecutorError>;

    /// Replay the workflow and apply any pending signals/timers, so a signal
    /// just sent is actually observed rather than left queued.
    async fn process_workflow(&self, workflow_id: Uuid) -> Result<(), ExecutorError>;
}

#[async_trait]
impl<S: WorkflowEventStore> SignalSink for WorkflowExecutor<S> {
    async fn send_signal(&self, workflow_id: Uuid, signal: WorkflowSignal) -> Result<(), ExecutorError> {
        WorkflowExecutor::send_signal(self, workflow_id, signal).await
    }

    async fn process_workflow(&self, workflow_id: Uuid) -> Result<(), ExecutorError> {
        WorkflowExecutor::process_workflow(self, workflow_id)
            .await
            .map(|_| ())
    }
}
