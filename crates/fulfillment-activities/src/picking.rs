//! Picking activities (spec §4.6: `CreateTask`, `AssignResource`, `FinalizeTask`).

use std::sync::Arc;

use async_trait::async_trait;
use fulfillment_domain::dto::{
    AssignResourceRequest, AssignResourceResponse, CreatePickTaskRequest, CreatePickTaskResponse,
    FinalizeTaskRequest, FinalizeTaskResponse, ReprocessPickExceptionRequest,
    ReprocessPickExceptionResponse,
};
use fulfillment_runtime::activity::{ActivityContext, ActivityError};
use fulfillment_runtime::Activity;

use crate::client::DomainClient;
use crate::key::IdempotencyKeyBuilder;

pub struct CreatePickTaskActivity {
    client: Arc<DomainClient>,
}

impl CreatePickTaskActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for CreatePickTaskActivity {
    const TYPE: &'static str = "create_pick_task";
    type Input = CreatePickTaskRequest;
    type Output = CreatePickTaskResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "create_pick_task");
        self.client
            .post("picking", "/v1/pick-tasks", &key, &input)
            .await
    }
}

pub struct AssignResourceActivity {
    client: Arc<DomainClient>,
}

impl AssignResourceActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for AssignResourceActivity {
    const TYPE: &'static str = "assign_pick_resource";
    type Input = AssignResourceRequest;
    type Output = AssignResourceResponse;

    /// Best-effort: assignment failures are logged, not fatal (spec §4.6
    /// step 3) — the loop timeout, not this call, decides whether the
    /// stage ultimately fails.
    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.task_id, "assign_resource");
        match self
            .client
            .post("picking", "/v1/pick-tasks/assign", &key, &input)
            .await
        {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::warn!(task_id = %input.task_id, %err, "resource assignment failed, proceeding best-effort");
                Ok(AssignResourceResponse { assigned: false })
            }
        }
    }
}

pub struct FinalizeTaskActivity {
    client: Arc<DomainClient>,
}

impl FinalizeTaskActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for FinalizeTaskActivity {
    const TYPE: &'static str = "finalize_pick_task";
    type Input = FinalizeTaskRequest;
    type Output = FinalizeTaskResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.task_id, "finalize_pick_task");
        self.client
            .post("picking", "/v1/pick-tasks/finalize", &key, &input)
            .await
    }
}

/// §9 Open Question 3: reprocessing stage hook. Only scheduled when
/// `capabilities.reprocessing` is set on the order-fulfillment input.
pub struct ReprocessPickExceptionActivity {
    client: Arc<DomainClient>,
}

impl ReprocessPickExceptionActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for ReprocessPickExceptionActivity {
    const TYPE: &'static str = "reprocess_pick_exception";
    type Input = ReprocessPickExceptionRequest;
    type Output = ReprocessPickExceptionResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.task_id, "reprocess_pick_exception");
        self.client
            .post("picking", "/v1/pick-tasks/reprocess", &key, &input)
            .await
    }
}
