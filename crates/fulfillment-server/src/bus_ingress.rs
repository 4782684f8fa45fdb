//! Dev/single-process stand-in for a real bus consumer: exposes
//! `CloudEventSignalBridge` as `POST /v1/bus/{topic}` so a CloudEvent can be
//! pushed at the bridge without a concrete broker wired up (spec §4.5's
//! "domain-service event consumers" have no broker adapter in this core —
//! see DESIGN.md). A production deployment replaces this route with a real
//! consumer loop calling `bridge.handle` directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use fulfillment_domain::error::ErrorBody;
use fulfillment_domain::CloudEvent;
use fulfillment_idempotency::ConsumedMessageStore;
use fulfillment_signalbus::{BridgeError, CloudEventSignalBridge};
use tracing::warn;

pub struct BusIngressState<D: ConsumedMessageStore> {
    pub bridge: Arc<CloudEventSignalBridge<D>>,
}

// Not `#[derive(Clone)]`: the derive would add a spurious `D: Clone` bound
// even though only the `Arc` is cloned here.
impl<D: ConsumedMessageStore> Clone for BusIngressState<D> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
        }
    }
}

pub fn bus_ingress_router<D: ConsumedMessageStore>(state: BusIngressState<D>) -> Router {
    Router::new()
        .route("/v1/bus/:topic", post(ingest::<D>))
        .with_state(state)
}

async fn ingest<D: ConsumedMessageStore>(
    State(state): State<BusIngressState<D>>,
    Path(topic): Path<String>,
    Json(event): Json<CloudEvent>,
) -> Response {
    match state.bridge.handle(&topic, &event).await {
        Ok(true) => (StatusCode::ACCEPTED, Json(serde_json::json!({"status": "delivered"})))
            .into_response(),
        Ok(false) => (StatusCode::OK, Json(serde_json::json!({"status": "duplicate"})))
            .into_response(),
        Err(BridgeError::UnrecognizedEventType(t)) => error_response(
            StatusCode::BAD_REQUEST,
            "unrecognized_event_type",
            format!("no bridge rule for event type '{t}'"),
        ),
        Err(BridgeError::WorkflowNotAddressable(id)) => error_response(
            StatusCode::NOT_FOUND,
            "workflow_not_found",
            format!("no running workflow addressed by '{id}'"),
        ),
        Err(e) => {
            warn!(%topic, %e, "failed to bridge CloudEvent to a workflow signal");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "bridge_failed", e.to_string())
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(code, message))).into_response()
}
