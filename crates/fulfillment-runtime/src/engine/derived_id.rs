//! Maps the stable, human-derived workflow ids named throughout spec §4.5
//! (`order-fulfillment-<orderId>`, `picking-<orderId>`, ...) onto the
//! runtime-assigned [`Uuid`] the executor actually keys workflows by.
//!
//! The executor itself only ever mints `Uuid::now_v7()` ids — it has no
//! notion of the caller's correlation scheme, and child workflows in
//! particular are started deep inside [`super::executor::WorkflowExecutor`]
//! where the starter never sees the assigned id. [`DerivedIdIndex`] is the
//! seam that lets something outside the workflow (here,
//! `fulfillment-signalbus`) learn the mapping as soon as a workflow starts,
//! so a signal addressed by its derived id can be routed to the right
//! runtime instance.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Called once per workflow start (top-level or child) with the workflow's
/// type and freshly-serialized input, so implementations can derive their
/// own stable id from whatever fields they recognize (typically `order_id`).
#[async_trait]
pub trait DerivedIdIndex: Send + Sync + 'static {
    async fn index(&self, workflow_type: &str, workflow_id: Uuid, input: &serde_json::Value);
}

/// Default in-process index: a derivation function plus a `DashMap` lookup.
/// `fulfillment-signalbus` owns the actual derivation rules (spec §4.5); this
/// type is reusable storage for any scheme expressed as `Fn(&str, &Value) ->
/// Option<String>`.
pub struct InMemoryDerivedIdIndex<F> {
    derive: F,
    table: DashMap<String, Uuid>,
}

impl<F> InMemoryDerivedIdIndex<F>
where
    F: Fn(&str, &serde_json::Value) -> Option<String> + Send + Sync + 'static,
{
    pub fn new(derive: F) -> Arc<Self> {
        Arc::new(Self {
            derive,
            table: DashMap::new(),
        })
    }

    pub fn resolve(&self, derived_id: &str) -> Option<Uuid> {
        self.table.get(derived_id).map(|e| *e)
    }
}

/// Read side of [`InMemoryDerivedIdIndex`], object-safe so
/// `fulfillment-signalbus` can hold `Arc<dyn DerivedIdResolver>` without
/// naming the index's derivation-closure type parameter.
pub trait DerivedIdResolver: Send + Sync + 'static {
    fn resolve(&self, derived_id: &str) -> Option<Uuid>;
}

impl<F> DerivedIdResolver for InMemoryDerivedIdIndex<F>
where
    F: Fn(&str, &serde_json::Value) -> Option<String> + Send + Sync + 'static,
{
    fn resolve(&self, derived_id: &str) -> Option<Uuid> {
        self.resolve(derived_id)
    }
}

#[async_trait]
impl<F> DerivedIdIndex for InMemoryDerivedIdIndex<F>
where
    F: Fn(&str, &serde_json::Value) -> Option<String> + Send + Sync + 'static,
{
    async fn index(&self, workflow_type: &str, workflow_id: Uuid, input: &serde_json::Value) {
        if let Some(derived_id) = (self.derive)(workflow_type, input) {
            self.table.insert(derived_id, workflow_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn indexes_and_resolves() {
        let index = InMemoryDerivedIdIndex::new(|workflow_type, input| {
            let order_id = input.get("order_id")?.as_str()?;
            Some(format!("{workflow_type}-{order_id}"))
        });

        let id = Uuid::now_v7();
        index
            .index("picking", id, &serde_json::json!({"order_id": "ORD-1"}))
            .await;

        assert_eq!(index.resolve("picking-ORD-1"), Some(id));
        assert_eq!(index.resolve("picking-ORD-2"), None);
    }

    #[tokio::test]
    async fn resolver_trait_object_delegates_to_inherent_resolve() {
        let index = InMemoryDerivedIdIndex::new(|workflow_type, input| {
            let order_id = input.get("order_id")?.as_str()?;
            Some(format!("{workflow_type}-{order_id}"))
        });
        let id = Uuid::now_v7();
        index
            .index("order_fulfillment", id, &serde_json::json!({"order_id": "ORD-9"}))
            .await;

        let resolver: Arc<dyn DerivedIdResolver> = index;
        assert_eq!(resolver.resolve("order_fulfillment-ORD-9"), Some(id));
        assert_eq!(resolver.resolve("nope"), None);
    }
}
