//! `Idempotency-Key: <aggregateId>:<stage>` (spec §4.2 dedup key).

pub struct IdempotencyKeyBuilder;

impl IdempotencyKeyBuilder {
    pub fn build(aggregate_id: &str, stage: &str) -> String {
        format!("{aggregate_id}:{stage}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_aggregate_and_stage() {
        assert_eq!(
            IdempotencyKeyBuilder::build("ORD-1", "validate"),
            "ORD-1:validate"
        );
    }
}
