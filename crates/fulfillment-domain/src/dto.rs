//! Request/response DTOs activities exchange with domain services.
//!
//! Spec §1 treats the domain services as external collaborators and gives
//! only their contracts (§6); it does not name concrete payload shapes. An
//! activity layer cannot be typed without them, so these are defined here —
//! intentionally minimal, carrying only the fields an activity in this core
//! actually reads or writes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `priority` on the order-fulfillment orchestrator's input (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderPriority {
    SameDay,
    NextDay,
    Standard,
}

impl OrderPriority {
    /// Wave-assignment timeout table, spec §4.7.
    pub fn wave_timeout(self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            OrderPriority::SameDay => Duration::from_secs(30 * 60),
            OrderPriority::NextDay => Duration::from_secs(2 * 60 * 60),
            OrderPriority::Standard => Duration::from_secs(4 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub sku: String,
    pub qty: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateOrderRequest {
    pub order_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateOrderResponse {
    pub order_id: String,
    pub valid: bool,
    pub items: Vec<OrderLineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRouteRequest {
    pub order_id: String,
    pub facility_id: String,
    pub warehouse_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRouteResponse {
    pub route_id: String,
}

// ---- Picking ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePickTaskRequest {
    pub order_id: String,
    pub wave_id: String,
    pub items: Vec<OrderLineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePickTaskResponse {
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignResourceRequest {
    pub task_id: String,
    pub worker_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssignResourceResponse {
    pub assigned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeTaskRequest {
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FinalizeTaskResponse {
    pub finalized: bool,
}

/// §9 Open Question 3: reprocessing stage hook, scheduled only when the
/// orchestrator's `capabilities.reprocessing` flag is set and a
/// `pickException` signal arrives mid-pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprocessPickExceptionRequest {
    pub task_id: String,
    pub exception: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReprocessPickExceptionResponse {
    pub reprocessed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickedItem {
    pub sku: String,
    pub qty: u32,
    pub location_id: String,
    pub tote_id: String,
}

// ---- Consolidation ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsolidationTaskRequest {
    pub order_id: String,
    pub tote_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsolidationTaskResponse {
    pub task_id: String,
}

/// §9 Open Question 3: sortation stage hook, scheduled only when the
/// orchestrator's `capabilities.sortation` flag is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortTotesRequest {
    pub consolidation_id: String,
    pub tote_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SortTotesResponse {
    pub sorted: bool,
}

// ---- Packing ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePackTaskRequest {
    pub order_id: String,
    /// Optional side input named in spec §4.6/§9 Open Question 2: any
    /// cardinality, silently ignored by `SelectPackaging` when absent.
    pub allocation_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePackTaskResponse {
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectPackagingRequest {
    pub task_id: String,
    pub allocation_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectPackagingResponse {
    pub package_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackItemsRequest {
    pub package_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackItemsResponse {
    pub packed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeighPackageRequest {
    pub package_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeighPackageResponse {
    pub weight_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateShippingLabelRequest {
    pub package_id: String,
    pub carrier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateShippingLabelResponse {
    pub tracking_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyLabelRequest {
    pub package_id: String,
    pub tracking_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplyLabelResponse {
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealPackageRequest {
    pub package_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SealPackageResponse {
    pub sealed: bool,
}

/// §9 Open Question 3: gift-wrap stage hook, scheduled only when the
/// orchestrator's `capabilities.gift_wrap` flag is set, between `PackItems`
/// and `WeighPackage` so the weighed result reflects the wrapped package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftWrapPackageRequest {
    pub package_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GiftWrapPackageResponse {
    pub wrapped: bool,
}

// ---- Shipping ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipmentRequest {
    pub order_id: String,
    pub package_id: String,
    pub tracking_number: String,
    pub carrier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipmentResponse {
    pub shipment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentScanRequest {
    pub shipment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShipmentScanResponse {
    pub scanned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyShipmentRequest {
    pub shipment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerifyShipmentResponse {
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOnDockRequest {
    pub shipment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlaceOnDockResponse {
    pub placed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToManifestRequest {
    pub shipment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddToManifestResponse {
    pub manifested: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkShippedRequest {
    pub order_id: String,
    pub shipment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MarkShippedResponse {
    pub marked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyCustomerRequest {
    pub order_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyCustomerResponse {
    pub notified: bool,
}

// ---- Cancellation (C8) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub order_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CancelOrderResponse {
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInventoryReservationRequest {
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReleaseInventoryReservationResponse {
    pub released: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyCustomerCancellationRequest {
    pub order_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyCustomerCancellationResponse {
    pub notified: bool,
}
