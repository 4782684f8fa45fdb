//! Cancellation-saga activities (spec §4.8), each overriding to the 5 min
//! `scheduleToCloseTimeout` via [`crate::options::cancellation_options`].

use std::sync::Arc;

use async_trait::async_trait;
use fulfillment_domain::dto::{
    CancelOrderRequest, CancelOrderResponse, NotifyCustomerCancellationRequest,
    NotifyCustomerCancellationResponse, ReleaseInventoryReservationRequest,
    ReleaseInventoryReservationResponse,
};
use fulfillment_runtime::activity::{ActivityContext, ActivityError};
use fulfillment_runtime::Activity;

use crate::client::DomainClient;
use crate::key::IdempotencyKeyBuilder;

/// Non-retryable on `NotFound`/`Validation`; retried ≤3× otherwise (spec
/// §4.8 step 1) — [`DomainClient::post`] already maps 404/422 to
/// non-retryable `ActivityError`s, so this activity needs no extra logic
/// beyond the caller's `cancellation_options(3)`.
pub struct CancelOrderActivity {
    client: Arc<DomainClient>,
}

impl CancelOrderActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for CancelOrderActivity {
    const TYPE: &'static str = "cancel_order";
    type Input = CancelOrderRequest;
    type Output = CancelOrderResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "cancel_order");
        self.client
            .post("orders", "/v1/orders/cancel", &key, &input)
            .await
    }
}

/// Retried ≤3×, non-fatal on exhaustion (spec §4.8 step 2): the saga
/// continues even if inventory release ultimately fails, so this activity
/// never escalates the error kind beyond retryable.
pub struct ReleaseInventoryReservationActivity {
    client: Arc<DomainClient>,
}

impl ReleaseInventoryReservationActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for ReleaseInventoryReservationActivity {
    const TYPE: &'static str = "release_inventory_reservation";
    type Input = ReleaseInventoryReservationRequest;
    type Output = ReleaseInventoryReservationResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "release_inventory_reservation");
        self.client
            .post("inventory", "/v1/reservations/release", &key, &input)
            .await
    }
}

/// Single best-effort attempt (spec §4.8 step 3): the caller should pair this
/// with `cancellation_options(1)`. A failure here is swallowed rather than
/// surfaced, since a customer notification is never worth blocking the saga.
pub struct NotifyCustomerCancellationActivity {
    client: Arc<DomainClient>,
}

impl NotifyCustomerCancellationActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for NotifyCustomerCancellationActivity {
    const TYPE: &'static str = "notify_customer_cancellation";
    type Input = NotifyCustomerCancellationRequest;
    type Output = NotifyCustomerCancellationResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "notify_customer_cancellation");
        match self
            .client
            .post("notifications", "/v1/notifications/cancellation", &key, &input)
            .await
        {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::warn!(order_id = %input.order_id, %err, "cancellation notification failed, proceeding");
                Ok(NotifyCustomerCancellationResponse { notified: false })
            }
        }
    }
}
