//! CloudEvents v1.0 wire envelope (spec §6.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A JSON CloudEvent v1.0 envelope. `id` is the canonical deduplication key
/// for consumers (spec §3.1, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CloudEvent {
    pub specversion: String,
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub time: DateTime<Utc>,
    pub subject: String,
    pub datacontenttype: String,
    pub data: serde_json::Value,
}

impl CloudEvent {
    /// Build a new event with `specversion = "1.0"`, `datacontenttype =
    /// "application/json"`, a fresh UUID v7 id, and `time = now`.
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        subject: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            specversion: "1.0".to_string(),
            id: Uuid::now_v7().to_string(),
            source: source.into(),
            event_type: event_type.into(),
            time: Utc::now(),
            subject: subject.into(),
            datacontenttype: "application/json".to_string(),
            data,
        }
    }
}

/// Flat, dot-separated bus topic namespace (spec §6.1).
pub mod topics {
    pub const ORDERS: &str = "wms.orders.events";
    pub const WAVES: &str = "wms.waves.events";
    pub const PICKING: &str = "wms.picking.events";
    pub const CONSOLIDATION: &str = "wms.consolidation.events";
    pub const PACKING: &str = "wms.packing.events";
    pub const SHIPPING: &str = "wms.shipping.events";
    pub const INVENTORY: &str = "wms.inventory.events";
    pub const ROUTING: &str = "wms.routing.events";
    pub const LABOR: &str = "wms.labor.events";
}

/// Reverse-domain dotted event `type` names referenced across spec §2, §8.2.
pub mod event_types {
    pub const ORDER_RECEIVED: &str = "wms.order.received";
    pub const ORDER_VALIDATED: &str = "wms.order.validated";
    pub const ORDER_CANCELLED: &str = "wms.order.cancelled";
    pub const ORDER_FAILED: &str = "wms.order.failed";
    pub const WAVE_ASSIGNED: &str = "wms.wave.assigned";
    pub const PICK_COMPLETED: &str = "wms.pick.completed";
    pub const CONSOLIDATION_COMPLETED: &str = "wms.consolidation.completed";
    pub const PACKAGE_SEALED: &str = "wms.package.sealed";
    pub const SHIPMENT_SHIPPED: &str = "wms.shipment.shipped";
}
