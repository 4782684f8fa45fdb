//! HTTP client shared by every activity, wrapped in a per-service
//! [`DistributedCircuitBreaker`] (spec §4.2 AMBIENT stack).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use fulfillment_runtime::activity::ActivityError;
use fulfillment_runtime::reliability::{CircuitBreakerConfig, DistributedCircuitBreaker};
use fulfillment_runtime::WorkflowEventStore;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{instrument, warn};

/// Thin HTTP facade over the domain services named in spec §4.6-§4.8.
/// One [`DistributedCircuitBreaker`] is created lazily per service name and
/// shared across every activity call to that service.
pub struct DomainClient {
    http: reqwest::Client,
    base_urls: HashMap<String, String>,
    breakers: DashMap<String, Arc<DistributedCircuitBreaker>>,
    store: Arc<dyn WorkflowEventStore>,
}

impl DomainClient {
    pub fn new(base_urls: HashMap<String, String>, store: Arc<dyn WorkflowEventStore>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("static reqwest client config is valid"),
            base_urls,
            breakers: DashMap::new(),
            store,
        }
    }

    fn breaker_for(&self, service: &str) -> Arc<DistributedCircuitBreaker> {
        if let Some(existing) = self.breakers.get(service) {
            return existing.clone();
        }
        let breaker = Arc::new(DistributedCircuitBreaker::new(
            service.to_string(),
            CircuitBreakerConfig::default(),
            self.store.clone(),
        ));
        self.breakers.insert(service.to_string(), breaker.clone());
        breaker
    }

    /// POST `body` to `service`'s `path`, carrying `idempotency_key`.
    /// Maps transport/5xx failures to retryable `ActivityError`s and
    /// 4xx failures to the non-retryable kinds named in spec §4.2
    /// (`Validation`, `NotFound`).
    #[instrument(skip(self, body))]
    pub async fn post<Req, Resp>(
        &self,
        service: &str,
        path: &str,
        idempotency_key: &str,
        body: &Req,
    ) -> Result<Resp, ActivityError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let base = self.base_urls.get(service).ok_or_else(|| {
            ActivityError::non_retryable(format!("no base URL configured for service {service}"))
                .with_type("configuration")
        })?;

        let breaker = self.breaker_for(service);
        let permit = breaker.allow().await.map_err(|e| {
            ActivityError::retryable(format!("{service} circuit breaker: {e}"))
                .with_type("circuit_open")
        })?;

        let url = format!("{base}{path}");
        let outcome = self
            .http
            .post(&url)
            .header("Idempotency-Key", idempotency_key)
            .json(body)
            .send()
            .await;

        match outcome {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let _ = permit.success().await;
                    response.json::<Resp>().await.map_err(|e| {
                        ActivityError::retryable(format!("malformed response from {service}: {e}"))
                            .with_type("transient")
                    })
                } else if status == StatusCode::NOT_FOUND {
                    let _ = permit.success().await;
                    Err(ActivityError::non_retryable(format!("{service}: entity not found"))
                        .with_type("not_found"))
                } else if status == StatusCode::BAD_REQUEST
                    || status == StatusCode::UNPROCESSABLE_ENTITY
                {
                    let _ = permit.success().await;
                    Err(
                        ActivityError::non_retryable(format!("{service} rejected request: {status}"))
                            .with_type("validation"),
                    )
                } else if status == StatusCode::CONFLICT {
                    let _ = permit.success().await;
                    Err(ActivityError::retryable(format!("{service}: conflict")).with_type("conflict"))
                } else {
                    let _ = permit.failure().await;
                    warn!(%service, %status, "domain service call failed");
                    Err(ActivityError::retryable(format!("{service} returned {status}"))
                        .with_type("transient"))
                }
            }
            Err(e) => {
                let _ = permit.failure().await;
                warn!(%service, %e, "domain service call errored");
                Err(ActivityError::retryable(format!("{service} request failed: {e}"))
                    .with_type("transient"))
            }
        }
    }
}
