//! `IdempotencyLayer`: a `tower::Layer` any `axum` router can apply per-route
//! to get the spec §4.4 state table for free.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use tower::{Layer, Service};
use tracing::warn;

use crate::hash::request_hash;
use crate::store::{BeginOutcome, IdempotencyStore};

/// Outcome the layer recorded for a request, exposed for tests and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyOutcome {
    Executed,
    RejectedInFlight,
    Replayed,
    RejectedMismatch,
    PassedThrough,
}

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Clone)]
pub struct IdempotencyLayer<St> {
    store: Arc<St>,
    service_name: Arc<str>,
}

impl<St: IdempotencyStore> IdempotencyLayer<St> {
    pub fn new(store: Arc<St>, service_name: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            service_name: service_name.into(),
        }
    }
}

impl<S, St: IdempotencyStore> Layer<S> for IdempotencyLayer<St> {
    type Service = IdempotencyMiddleware<S, St>;

    fn layer(&self, inner: S) -> Self::Service {
        IdempotencyMiddleware {
            inner,
            store: self.store.clone(),
            service_name: self.service_name.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IdempotencyMiddleware<S, St> {
    inner: S,
    store: Arc<St>,
    service_name: Arc<str>,
}

impl<S, St> Service<Request<Body>> for IdempotencyMiddleware<S, St>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    St: IdempotencyStore,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let store = self.store.clone();
        let service_name = self.service_name.clone();
        // tower middleware convention: swap in a ready clone, keep `self.inner`
        // parked for the next `poll_ready`/`call` pair.
        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let Some(key) = req
                .headers()
                .get(IDEMPOTENCY_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
            else {
                return inner.call(req).await;
            };

            let method = req.method().to_string();
            let path = req.uri().path().to_string();
            let (parts, body) = req.into_parts();
            let body_bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(%e, "failed to buffer request body for idempotency hashing");
                    return Ok(bad_request("could not read request body"));
                }
            };
            let hash = request_hash(&method, &path, &body_bytes);

            match store.begin(&service_name, &key, &method, &path, &hash).await {
                Ok(BeginOutcome::Begin) => {
                    let req = Request::from_parts(parts, Body::from(body_bytes));
                    let response = inner.call(req).await?;
                    let (resp_parts, resp_body) = response.into_parts();
                    let resp_bytes = match resp_body.collect().await {
                        Ok(collected) => collected.to_bytes(),
                        Err(e) => {
                            warn!(%e, "failed to buffer response body for idempotency cache");
                            return Ok(Response::from_parts(resp_parts, Body::empty()));
                        }
                    };
                    let cached_body: serde_json::Value =
                        serde_json::from_slice(&resp_bytes).unwrap_or(serde_json::Value::Null);
                    if let Err(e) = store
                        .complete(&service_name, &key, resp_parts.status.as_u16(), cached_body)
                        .await
                    {
                        warn!(%e, "failed to record idempotency completion");
                    }
                    Ok(Response::from_parts(resp_parts, Body::from(resp_bytes)))
                }
                Ok(BeginOutcome::InFlight) => Ok(json_error(
                    StatusCode::CONFLICT,
                    "idempotency_key_in_flight",
                    "a request with this Idempotency-Key is already being processed",
                )),
                Ok(BeginOutcome::Replay { status, body }) => {
                    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
                    Ok(Response::builder()
                        .status(status)
                        .header("content-type", "application/json")
                        .body(Body::from(body.to_string()))
                        .unwrap_or_else(|_| empty_response(StatusCode::INTERNAL_SERVER_ERROR)))
                }
                Ok(BeginOutcome::Mismatch) => Ok(json_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "idempotency_parameter_mismatch",
                    "this Idempotency-Key was previously used with a different request body",
                )),
                Err(e) => {
                    warn!(%e, "idempotency store error");
                    Ok(json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "idempotency_store_error",
                        "idempotency check failed",
                    ))
                }
            }
        })
    }
}

fn json_error(status: StatusCode, code: &str, message: &str) -> Response<Body> {
    let body = serde_json::json!({ "code": code, "message": message });
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| empty_response(StatusCode::INTERNAL_SERVER_ERROR))
}

fn bad_request(message: &str) -> Response<Body> {
    json_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn empty_response(status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .expect("static response is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryIdempotencyStore;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    async fn echo(body: Body) -> Response<Body> {
        let bytes = body.collect().await.unwrap().to_bytes();
        Response::builder()
            .status(StatusCode::CREATED)
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .unwrap()
    }

    fn app(store: Arc<InMemoryIdempotencyStore>) -> Router {
        Router::new()
            .route(
                "/v1/orders",
                post(|body: Body| async move { echo(body).await }),
            )
            .layer(IdempotencyLayer::new(store, "orders-api"))
    }

    #[tokio::test]
    async fn missing_key_passes_through() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let response = app(store)
            .oneshot(
                Request::post("/v1/orders")
                    .body(Body::from(r#"{"orderId":"ORD-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn duplicate_key_replays_cached_response() {
        let store = Arc::new(InMemoryIdempotencyStore::new());

        let first = app(store.clone())
            .oneshot(
                Request::post("/v1/orders")
                    .header(IDEMPOTENCY_KEY_HEADER, "req-1")
                    .body(Body::from(r#"{"orderId":"ORD-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app(store)
            .oneshot(
                Request::post("/v1/orders")
                    .header(IDEMPOTENCY_KEY_HEADER, "req-1")
                    .body(Body::from(r#"{"orderId":"ORD-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn mismatched_replay_is_rejected() {
        let store = Arc::new(InMemoryIdempotencyStore::new());

        app(store.clone())
            .oneshot(
                Request::post("/v1/orders")
                    .header(IDEMPOTENCY_KEY_HEADER, "req-1")
                    .body(Body::from(r#"{"orderId":"ORD-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let second = app(store)
            .oneshot(
                Request::post("/v1/orders")
                    .header(IDEMPOTENCY_KEY_HEADER, "req-1")
                    .body(Body::from(r#"{"orderId":"ORD-2"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
