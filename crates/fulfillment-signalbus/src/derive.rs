//! Derived-id rules (spec §4.5): `order-fulfillment-<orderId>`,
//! `picking-<orderId>`, `consolidation-<orderId>`, `packing-<orderId>`,
//! `shipping-<orderId>`, `cancellation-<orderId>`. Every workflow in this
//! core takes an `order_id` field on its input, so one rule covers all of
//! them — the only per-type work is mapping `Workflow::TYPE` (the registry
//! key, e.g. `"order_fulfillment"`) onto the spec's hyphenated prefix.

use serde_json::Value;

/// Maps a registered `Workflow::TYPE` onto its spec-named derived-id prefix.
/// Returns `None` for workflow types this core doesn't address by derived id
/// (there are none today, but new internal-only workflow types shouldn't be
/// silently made addressable).
fn prefix_for(workflow_type: &str) -> Option<&'static str> {
    match workflow_type {
        "order_fulfillment" => Some("order-fulfillment"),
        "picking" => Some("picking"),
        "consolidation" => Some("consolidation"),
        "packing" => Some("packing"),
        "shipping" => Some("shipping"),
        "cancellation_orchestrator" => Some("cancellation"),
        _ => None,
    }
}

/// `fn(&str, &Value) -> Option<String>` handed to
/// `fulfillment_runtime::InMemoryDerivedIdIndex::new`.
pub fn derive_workflow_id(workflow_type: &str, input: &Value) -> Option<String> {
    let prefix = prefix_for(workflow_type)?;
    let order_id = input.get("order_id")?.as_str()?;
    Some(format!("{prefix}-{order_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_every_known_workflow_type() {
        for (workflow_type, expected_prefix) in [
            ("order_fulfillment", "order-fulfillment"),
            ("picking", "picking"),
            ("consolidation", "consolidation"),
            ("packing", "packing"),
            ("shipping", "shipping"),
            ("cancellation_orchestrator", "cancellation"),
        ] {
            let input = serde_json::json!({"order_id": "ORD-42"});
            assert_eq!(
                derive_workflow_id(workflow_type, &input),
                Some(format!("{expected_prefix}-ORD-42"))
            );
        }
    }

    #[test]
    fn unknown_workflow_type_is_not_addressable() {
        assert_eq!(
            derive_workflow_id("some_internal_workflow", &serde_json::json!({"order_id": "X"})),
            None
        );
    }

    #[test]
    fn missing_order_id_is_not_addressable() {
        assert_eq!(derive_workflow_id("picking", &serde_json::json!({})), None);
    }
}
