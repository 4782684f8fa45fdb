//! Route-calculation activity (spec §4.7 orchestrator step 2).

use std::sync::Arc;

use async_trait::async_trait;
use fulfillment_domain::dto::{CalculateRouteRequest, CalculateRouteResponse};
use fulfillment_runtime::activity::{ActivityContext, ActivityError};
use fulfillment_runtime::Activity;

use crate::client::DomainClient;
use crate::key::IdempotencyKeyBuilder;

pub struct CalculateRouteActivity {
    client: Arc<DomainClient>,
}

impl CalculateRouteActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for CalculateRouteActivity {
    const TYPE: &'static str = "calculate_route";
    type Input = CalculateRouteRequest;
    type Output = CalculateRouteResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "calculate_route");
        self.client
            .post("routing", "/v1/routes/calculate", &key, &input)
            .await
    }
}
