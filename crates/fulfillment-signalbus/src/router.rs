//! Operator-facing signal ingress (spec §4.5, §6.3):
//! `POST /v1/workflows/{workflow_id}/signals/{signal_name}`, where
//! `workflow_id` is the *derived* id (`picking-ORD-1`, not the runtime
//! `Uuid`). Callers are expected to apply
//! `fulfillment_idempotency::IdempotencyLayer` on top via [`Router::layer`]
//! the same way any other mutating `axum` route would (spec §6.2).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use fulfillment_domain::error::ErrorBody;
use fulfillment_runtime::engine::{DerivedIdResolver, ExecutorError};
use fulfillment_runtime::persistence::StoreError;
use fulfillment_runtime::{SignalSink, WorkflowSignal};
use tracing::{info, warn};

#[derive(Clone)]
pub struct SignalBusState {
    pub sink: Arc<dyn SignalSink>,
    pub resolver: Arc<dyn DerivedIdResolver>,
}

/// Build the signal-bus router. Apply idempotency/trace layers with
/// `.layer(...)` on the returned router.
pub fn signal_router(state: SignalBusState) -> Router {
    Router::new()
        .route(
            "/v1/workflows/:workflow_id/signals/:signal_name",
            post(deliver_signal),
        )
        .with_state(state)
}

async fn deliver_signal(
    State(state): State<SignalBusState>,
    Path((workflow_id, signal_name)): Path<(String, String)>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let Some(runtime_id) = state.resolver.resolve(&workflow_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "workflow_not_found",
            format!("no running workflow addressed by '{workflow_id}'"),
        );
    };

    let signal = WorkflowSignal::custom(signal_name.clone(), payload);
    match state.sink.send_signal(runtime_id, signal).await {
        Ok(()) => {
            info!(%workflow_id, %runtime_id, %signal_name, "signal accepted");
            if let Err(e) = state.sink.process_workflow(runtime_id).await {
                warn!(%runtime_id, %e, "signal accepted but workflow processing failed");
            }
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({"status": "accepted"})),
            )
                .into_response()
        }
        Err(ExecutorError::WorkflowCompleted(_)) => error_response(
            StatusCode::CONFLICT,
            "workflow_completed",
            "workflow has already reached a terminal state",
        ),
        Err(ExecutorError::Store(StoreError::WorkflowNotFound(_))) => error_response(
            StatusCode::NOT_FOUND,
            "workflow_not_found",
            format!("no running workflow addressed by '{workflow_id}'"),
        ),
        Err(e) => {
            warn!(%workflow_id, %e, "failed to deliver signal");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "signal_delivery_failed",
                e.to_string(),
            )
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(code, message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use fulfillment_runtime::{DerivedIdIndex, InMemoryDerivedIdIndex};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct RecordingSink {
        delivered: Mutex<Vec<(Uuid, WorkflowSignal)>>,
        reject_completed: bool,
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn send_signal(
            &self,
            workflow_id: Uuid,
            signal: WorkflowSignal,
        ) -> Result<(), ExecutorError> {
            if self.reject_completed {
                return Err(ExecutorError::WorkflowCompleted(workflow_id));
            }
            self.delivered.lock().push((workflow_id, signal));
            Ok(())
        }

        async fn process_workflow(&self, _workflow_id: Uuid) -> Result<(), ExecutorError> {
            Ok(())
        }
    }

    /// Builds state with an index pre-populated for `(workflow_type,
    /// order_id) -> runtime_id`, mirroring what `DerivedIdIndex::index`
    /// would record at workflow-start time.
    async fn state_with_entry(
        sink: Arc<RecordingSink>,
        workflow_type: &str,
        order_id: &str,
        runtime_id: Uuid,
    ) -> SignalBusState {
        let index = InMemoryDerivedIdIndex::new(crate::derive::derive_workflow_id);
        index
            .index(workflow_type, runtime_id, &serde_json::json!({"order_id": order_id}))
            .await;
        SignalBusState {
            sink,
            resolver: index,
        }
    }

    #[tokio::test]
    async fn unresolved_derived_id_is_404() {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
            reject_completed: false,
        });
        let empty = InMemoryDerivedIdIndex::new(crate::derive::derive_workflow_id);
        let app = signal_router(SignalBusState {
            sink,
            resolver: empty,
        });

        let response = app
            .oneshot(
                Request::post("/v1/workflows/picking-ORD-1/signals/itemPicked")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resolved_signal_is_delivered() {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
            reject_completed: false,
        });
        let runtime_id = Uuid::now_v7();
        let st = state_with_entry(sink.clone(), "picking", "ORD-1", runtime_id).await;

        let app = signal_router(st);
        let response = app
            .oneshot(
                Request::post("/v1/workflows/picking-ORD-1/signals/itemPicked")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"sku":"SKU-1","qty":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let delivered = sink.delivered.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, runtime_id);
        assert_eq!(delivered[0].1.signal_type, "itemPicked");
    }

    #[tokio::test]
    async fn completed_workflow_rejects_with_conflict() {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
            reject_completed: true,
        });
        let runtime_id = Uuid::now_v7();
        let st = state_with_entry(sink, "order_fulfillment", "ORD-1", runtime_id).await;

        let app = signal_router(st);
        let response = app
            .oneshot(
                Request::post("/v1/workflows/order-fulfillment-ORD-1/signals/cancel")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["code"], "workflow_completed");
    }
}
