//! Validation and routing activities (spec §4.7 orchestrator steps 1-2).

use std::sync::Arc;

use async_trait::async_trait;
use fulfillment_domain::dto::{ValidateOrderRequest, ValidateOrderResponse};
use fulfillment_runtime::activity::{ActivityContext, ActivityError};
use fulfillment_runtime::Activity;

use crate::client::DomainClient;
use crate::key::IdempotencyKeyBuilder;

pub struct ValidateOrderActivity {
    client: Arc<DomainClient>,
}

impl ValidateOrderActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for ValidateOrderActivity {
    const TYPE: &'static str = "validate_order";
    type Input = ValidateOrderRequest;
    type Output = ValidateOrderResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "validate");
        self.client
            .post("orders", "/v1/orders/validate", &key, &input)
            .await
    }
}
