//! Canonical signal names per workflow (spec §3.1, §6.3), beyond the generic
//! `cancel`/`shutdown` pair `fulfillment_runtime::workflow::signal_types`
//! already defines.

/// Order-fulfillment orchestrator signals.
pub mod orchestrator {
    pub const WAVE_ASSIGNED: &str = "waveAssigned";
    pub const PICK_COMPLETED: &str = "pickCompleted";
}

/// Picking child-workflow signals.
pub mod picking {
    pub const WORKER_ASSIGNED: &str = "workerAssigned";
    pub const ITEM_PICKED: &str = "itemPicked";
    pub const PICKING_COMPLETE: &str = "pickingComplete";
    pub const PICK_EXCEPTION: &str = "pickException";
}

/// Consolidation child-workflow signals.
pub mod consolidation {
    pub const STATION_ASSIGNED: &str = "stationAssigned";
    pub const ITEM_CONSOLIDATED: &str = "itemConsolidated";
    pub const CONSOLIDATION_COMPLETE: &str = "consolidationComplete";
}

/// Packing child-workflow signals.
pub mod packing {
    pub const LABEL_GENERATED: &str = "labelGenerated";
}
