//! Packing activities (spec §4.6 packing stage): `CreatePackTask` →
//! `SelectPackaging` → `PackItems` → `WeighPackage` → `GenerateShippingLabel`
//! → `ApplyLabel` → `SealPackage`, each a serial activity in the stage.

use std::sync::Arc;

use async_trait::async_trait;
use fulfillment_domain::dto::{
    ApplyLabelRequest, ApplyLabelResponse, CreatePackTaskRequest, CreatePackTaskResponse,
    GenerateShippingLabelRequest, GenerateShippingLabelResponse, GiftWrapPackageRequest,
    GiftWrapPackageResponse, PackItemsRequest, PackItemsResponse, SealPackageRequest,
    SealPackageResponse, SelectPackagingRequest, SelectPackagingResponse, WeighPackageRequest,
    WeighPackageResponse,
};
use fulfillment_runtime::activity::{ActivityContext, ActivityError};
use fulfillment_runtime::Activity;

use crate::client::DomainClient;
use crate::key::IdempotencyKeyBuilder;

pub struct CreatePackTaskActivity {
    client: Arc<DomainClient>,
}

impl CreatePackTaskActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for CreatePackTaskActivity {
    const TYPE: &'static str = "create_pack_task";
    type Input = CreatePackTaskRequest;
    type Output = CreatePackTaskResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.order_id, "create_pack_task");
        self.client
            .post("packing", "/v1/pack-tasks", &key, &input)
            .await
    }
}

pub struct SelectPackagingActivity {
    client: Arc<DomainClient>,
}

impl SelectPackagingActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for SelectPackagingActivity {
    const TYPE: &'static str = "select_packaging";
    type Input = SelectPackagingRequest;
    type Output = SelectPackagingResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.task_id, "select_packaging");
        self.client
            .post("packing", "/v1/pack-tasks/select-packaging", &key, &input)
            .await
    }
}

pub struct PackItemsActivity {
    client: Arc<DomainClient>,
}

impl PackItemsActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for PackItemsActivity {
    const TYPE: &'static str = "pack_items";
    type Input = PackItemsRequest;
    type Output = PackItemsResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.package_id, "pack_items");
        self.client
            .post("packing", "/v1/packages/pack-items", &key, &input)
            .await
    }
}

/// §9 Open Question 3: gift-wrap stage hook. Only scheduled when
/// `capabilities.gift_wrap` is set on the order-fulfillment input, between
/// `pack_items` and `weigh_package`.
pub struct GiftWrapPackageActivity {
    client: Arc<DomainClient>,
}

impl GiftWrapPackageActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for GiftWrapPackageActivity {
    const TYPE: &'static str = "gift_wrap_package";
    type Input = GiftWrapPackageRequest;
    type Output = GiftWrapPackageResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.package_id, "gift_wrap_package");
        self.client
            .post("packing", "/v1/packages/gift-wrap", &key, &input)
            .await
    }
}

pub struct WeighPackageActivity {
    client: Arc<DomainClient>,
}

impl WeighPackageActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for WeighPackageActivity {
    const TYPE: &'static str = "weigh_package";
    type Input = WeighPackageRequest;
    type Output = WeighPackageResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.package_id, "weigh_package");
        self.client
            .post("packing", "/v1/packages/weigh", &key, &input)
            .await
    }
}

pub struct GenerateShippingLabelActivity {
    client: Arc<DomainClient>,
}

impl GenerateShippingLabelActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for GenerateShippingLabelActivity {
    const TYPE: &'static str = "generate_shipping_label";
    type Input = GenerateShippingLabelRequest;
    type Output = GenerateShippingLabelResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.package_id, "generate_shipping_label");
        self.client
            .post("shipping", "/v1/labels/generate", &key, &input)
            .await
    }
}

pub struct ApplyLabelActivity {
    client: Arc<DomainClient>,
}

impl ApplyLabelActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for ApplyLabelActivity {
    const TYPE: &'static str = "apply_label";
    type Input = ApplyLabelRequest;
    type Output = ApplyLabelResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.package_id, "apply_label");
        self.client
            .post("packing", "/v1/packages/apply-label", &key, &input)
            .await
    }
}

pub struct SealPackageActivity {
    client: Arc<DomainClient>,
}

impl SealPackageActivity {
    pub fn new(client: Arc<DomainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Activity for SealPackageActivity {
    const TYPE: &'static str = "seal_package";
    type Input = SealPackageRequest;
    type Output = SealPackageResponse;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let key = IdempotencyKeyBuilder::build(&input.package_id, "seal_package");
        self.client
            .post("packing", "/v1/packages/seal", &key, &input)
            .await
    }
}
