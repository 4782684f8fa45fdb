//! Consolidation activity (spec §4.6 consolidation stage).

use std::sync::Arc;

use async_trait::async_trait;
use fulfillment_domain::dto::{
    CreateConsolidationTaskRequest, CreateConsolidationTaskResponse, SortTotesRequest, SortTotesResponse,
};
use fulfillment_runtime::activity::{ActivityContext, ActivityError};
use fulfillment_runtime::Activity;

use crate::client::DomainClient;
use crate::key::IdempotencyKeyBuilder;

pub struct CreateConsolidationTaskActivity {
    client: Arc<DomainClient>,
}

impl CreateConsolidationTaskActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for CreateConsolidationTaskActivity {
    const TYPE: &'static str = "create_consolidation_task";
    type Input = CreateConsolidationTaskRequest;
    type Output = CreateConsolidationTaskResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "create_consolidation_task");
        self.client
            .post("consolidation", "/v1/consolidation-tasks", &key, &input)
            .await
    }
}

/// §9 Open Question 3: sortation stage hook. Only scheduled when
/// `capabilities.sortation` is set on the order-fulfillment input.
pub struct SortTotesActivity {
    client: Arc<DomainClient>,
}

impl SortTotesActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for SortTotesActivity {
    const TYPE: &'static str = "sort_totes";
    type Input = SortTotesRequest;
    type Output = SortTotesResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.consolidation_id, "sort_totes");
        self.client
            .post("consolidation", "/v1/consolidation-tasks/sort", &key, &input)
            .await
    }
}
