//! `CloudEventSignalBridge`: maps a subset of inbound CloudEvents onto
//! `executor.send_signal` calls (spec §4.5 — "domain-service event
//! consumers (wave-assigned consumer) -> runtime `signalWorkflow`"), so the
//! runtime reaches signals from the bus without depending on it directly.
//!
//! Message dedup (spec §4.4) runs first: a redelivered CloudEvent with an
//! already-seen `(consumer_group, topic, id)` is dropped before it reaches
//! the bridge rules.

use std::sync::Arc;

use fulfillment_domain::cloudevents::event_types;
use fulfillment_domain::CloudEvent;
use fulfillment_idempotency::ConsumedMessageStore;
use fulfillment_runtime::engine::DerivedIdResolver;
use fulfillment_runtime::{SignalSink, WorkflowSignal};
use tracing::{debug, info, warn};

/// One entry in the bridge's routing table: a recognized CloudEvent `type`,
/// the derived-id prefix of the workflow it targets, and the signal name to
/// raise. `subject` is taken as the order id, matching how every workflow in
/// this core is addressed (spec §3.1's `aggregateId` convention).
#[derive(Debug, Clone, Copy)]
pub struct BridgeRule {
    pub event_type: &'static str,
    pub target_prefix: &'static str,
    pub signal_name: &'static str,
}

/// The rule spec §4.5 names explicitly: a wave-assignment event reaching the
/// order-fulfillment workflow's `waveAssigned` signal.
pub fn default_rules() -> Vec<BridgeRule> {
    vec![BridgeRule {
        event_type: event_types::WAVE_ASSIGNED,
        target_prefix: "order-fulfillment",
        signal_name: "waveAssigned",
    }]
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no rule recognizes event type '{0}'")]
    UnrecognizedEventType(String),
    #[error("no running workflow addressed by '{0}'")]
    WorkflowNotAddressable(String),
    #[error("dedup store error: {0}")]
    Dedup(#[from] fulfillment_idempotency::dedup::DedupError),
    #[error("signal delivery failed: {0}")]
    Delivery(#[from] fulfillment_runtime::engine::ExecutorError),
}

pub struct CloudEventSignalBridge<D: ConsumedMessageStore> {
    sink: Arc<dyn SignalSink>,
    resolver: Arc<dyn DerivedIdResolver>,
    dedup: Arc<D>,
    consumer_group: String,
    rules: Vec<BridgeRule>,
}

impl<D: ConsumedMessageStore> CloudEventSignalBridge<D> {
    pub fn new(
        sink: Arc<dyn SignalSink>,
        resolver: Arc<dyn DerivedIdResolver>,
        dedup: Arc<D>,
        consumer_group: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            resolver,
            dedup,
            consumer_group: consumer_group.into(),
            rules: default_rules(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<BridgeRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Handle one inbound CloudEvent from `topic`. Returns `Ok(true)` if a
    /// signal was delivered, `Ok(false)` if the event was a duplicate
    /// delivery and silently skipped (spec §4.4 message dedup).
    pub async fn handle(&self, topic: &str, event: &CloudEvent) -> Result<bool, BridgeError> {
        let is_new = self
            .dedup
            .try_mark_processed(&self.consumer_group, topic, &event.id)
            .await?;
        if !is_new {
            debug!(event_id = %event.id, %topic, "duplicate CloudEvent delivery, skipping");
            return Ok(false);
        }

        let rule = self
            .rules
            .iter()
            .find(|r| r.event_type == event.event_type)
            .ok_or_else(|| BridgeError::UnrecognizedEventType(event.event_type.clone()))?;

        let derived_id = format!("{}-{}", rule.target_prefix, event.subject);
        let Some(runtime_id) = self.resolver.resolve(&derived_id) else {
            warn!(%derived_id, event_id = %event.id, "bridged event addresses no running workflow");
            return Err(BridgeError::WorkflowNotAddressable(derived_id));
        };

        let signal = WorkflowSignal::custom(rule.signal_name, event.data.clone());
        self.sink.send_signal(runtime_id, signal).await?;
        self.sink.process_workflow(runtime_id).await?;
        info!(%derived_id, %runtime_id, signal_name = rule.signal_name, "bridged CloudEvent to workflow signal");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fulfillment_idempotency::InMemoryConsumedMessageStore;
    use fulfillment_runtime::{DerivedIdIndex, ExecutorError, InMemoryDerivedIdIndex};
    use parking_lot::Mutex;
    use uuid::Uuid;

    struct RecordingSink {
        delivered: Mutex<Vec<(Uuid, WorkflowSignal)>>,
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn send_signal(
            &self,
            workflow_id: Uuid,
            signal: WorkflowSignal,
        ) -> Result<(), ExecutorError> {
            self.delivered.lock().push((workflow_id, signal));
            Ok(())
        }

        async fn process_workflow(&self, _workflow_id: Uuid) -> Result<(), ExecutorError> {
            Ok(())
        }
    }

    async fn make_bridge() -> (
        CloudEventSignalBridge<InMemoryConsumedMessageStore>,
        Arc<RecordingSink>,
        Uuid,
    ) {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
        });
        let resolver = InMemoryDerivedIdIndex::new(crate::derive::derive_workflow_id);
        let runtime_id = Uuid::now_v7();
        resolver
            .index(
                "order_fulfillment",
                runtime_id,
                &serde_json::json!({"order_id": "ORD-1"}),
            )
            .await;
        let dedup = Arc::new(InMemoryConsumedMessageStore::new());
        let bridge =
            CloudEventSignalBridge::new(sink.clone(), resolver, dedup, "wave-assignment-consumer");
        (bridge, sink, runtime_id)
    }

    #[tokio::test]
    async fn wave_assigned_event_delivers_signal_to_order_fulfillment() {
        let (bridge, sink, runtime_id) = make_bridge().await;
        let event = CloudEvent::new(
            "wms/waves",
            event_types::WAVE_ASSIGNED,
            "ORD-1",
            serde_json::json!({"waveId": "W-1"}),
        );

        let delivered = bridge
            .handle(fulfillment_domain::cloudevents::topics::WAVES, &event)
            .await
            .unwrap();

        assert!(delivered);
        let recorded = sink.delivered.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, runtime_id);
        assert_eq!(recorded[0].1.signal_type, "waveAssigned");
    }

    #[tokio::test]
    async fn duplicate_delivery_is_skipped() {
        let (bridge, sink, _runtime_id) = make_bridge().await;
        let event = CloudEvent::new(
            "wms/waves",
            event_types::WAVE_ASSIGNED,
            "ORD-1",
            serde_json::json!({"waveId": "W-1"}),
        );

        assert!(bridge
            .handle(fulfillment_domain::cloudevents::topics::WAVES, &event)
            .await
            .unwrap());
        assert!(!bridge
            .handle(fulfillment_domain::cloudevents::topics::WAVES, &event)
            .await
            .unwrap());

        assert_eq!(sink.delivered.lock().len(), 1);
    }

    #[tokio::test]
    async fn unrecognized_event_type_is_rejected() {
        let (bridge, _sink, _runtime_id) = make_bridge().await;
        let event = CloudEvent::new(
            "wms/orders",
            event_types::ORDER_RECEIVED,
            "ORD-1",
            serde_json::json!({}),
        );

        let err = bridge
            .handle(fulfillment_domain::cloudevents::topics::ORDERS, &event)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnrecognizedEventType(_)));
    }
}
