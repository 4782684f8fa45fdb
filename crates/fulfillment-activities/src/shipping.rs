//! Shipping activities (spec §4.6 shipping stage): `CreateShipment` → `Scan`
//! → `Verify` → `PlaceOnDock` → `AddToManifest` → `MarkShipped` →
//! `NotifyCustomer`, each a serial activity in the stage.

use std::sync::Arc;

use async_trait::async_trait;
use fulfillment_domain::dto::{
    AddToManifestRequest, AddToManifestResponse, CreateShipmentRequest, CreateShipmentResponse,
    MarkShippedRequest, MarkShippedResponse, NotifyCustomerRequest, NotifyCustomerResponse,
    PlaceOnDockRequest, PlaceOnDockResponse, ShipmentScanRequest, ShipmentScanResponse,
    VerifyShipmentRequest, VerifyShipmentResponse,
};
use fulfillment_runtime::activity::{ActivityContext, ActivityError};
use fulfillment_runtime::Activity;

use crate::client::DomainClient;
use crate::key::IdempotencyKeyBuilder;

pub struct CreateShipmentActivity {
    client: Arc<DomainClient>,
}

impl CreateShipmentActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for CreateShipmentActivity {
    const TYPE: &'static str = "create_shipment";
    type Input = CreateShipmentRequest;
    type Output = CreateShipmentResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "create_shipment");
        self.client
            .post("shipping", "/v1/shipments", &key, &input)
            .await
    }
}

pub struct ShipmentScanActivity {
    client: Arc<DomainClient>,
}

impl ShipmentScanActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for ShipmentScanActivity {
    const TYPE: &'static str = "shipment_scan";
    type Input = ShipmentScanRequest;
    type Output = ShipmentScanResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.shipment_id, "shipment_scan");
        self.client
            .post("shipping", "/v1/shipments/scan", &key, &input)
            .await
    }
}

pub struct VerifyShipmentActivity {
    client: Arc<DomainClient>,
}

impl VerifyShipmentActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for VerifyShipmentActivity {
    const TYPE: &'static str = "verify_shipment";
    type Input = VerifyShipmentRequest;
    type Output = VerifyShipmentResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.shipment_id, "verify_shipment");
        self.client
            .post("shipping", "/v1/shipments/verify", &key, &input)
            .await
    }
}

pub struct PlaceOnDockActivity {
    client: Arc<DomainClient>,
}

impl PlaceOnDockActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for PlaceOnDockActivity {
    const TYPE: &'static str = "place_on_dock";
    type Input = PlaceOnDockRequest;
    type Output = PlaceOnDockResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.shipment_id, "place_on_dock");
        self.client
            .post("shipping", "/v1/shipments/place-on-dock", &key, &input)
            .await
    }
}

pub struct AddToManifestActivity {
    client: Arc<DomainClient>,
}

impl AddToManifestActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for AddToManifestActivity {
    const TYPE: &'static str = "add_to_manifest";
    type Input = AddToManifestRequest;
    type Output = AddToManifestResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.shipment_id, "add_to_manifest");
        self.client
            .post("shipping", "/v1/shipments/manifest", &key, &input)
            .await
    }
}

pub struct MarkShippedActivity {
    client: Arc<DomainClient>,
}

impl MarkShippedActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for MarkShippedActivity {
    const TYPE: &'static str = "mark_shipped";
    type Input = MarkShippedRequest;
    type Output = MarkShippedResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "mark_shipped");
        self.client
            .post("orders", "/v1/orders/mark-shipped", &key, &input)
            .await
    }
}

pub struct NotifyCustomerActivity {
    client: Arc<DomainClient>,
}

impl NotifyCustomerActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for NotifyCustomerActivity {
    const TYPE: &'static str = "notify_customer";
    type Input = NotifyCustomerRequest;
    type Output = NotifyCustomerResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "notify_customer");
        self.client
            .post("notifications", "/v1/notifications/customer", &key, &input)
            .await
    }
}
