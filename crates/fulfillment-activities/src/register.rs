//! Adapts typed [`Activity`] implementations onto the untyped
//! `WorkerPool::register_handler` closure signature.

use std::sync::Arc;

use fulfillment_runtime::activity::{ActivityContext, ActivityError};
use fulfillment_runtime::worker::{ActivityFailure, ActivityResult};
use fulfillment_runtime::{Activity, ClaimedTask, WorkerPool};

use crate::cancellation::{
    CancelOrderActivity, NotifyCustomerCancellationActivity, ReleaseInventoryReservationActivity,
};
use crate::client::DomainClient;
use crate::consolidation::{CreateConsolidationTaskActivity, SortTotesActivity};
use crate::packing::{
    ApplyLabelActivity, CreatePackTaskActivity, GenerateShippingLabelActivity,
    GiftWrapPackageActivity, PackItemsActivity, SealPackageActivity, SelectPackagingActivity,
    WeighPackageActivity,
};
use crate::picking::{
    AssignResourceActivity, CreatePickTaskActivity, FinalizeTaskActivity,
    ReprocessPickExceptionActivity,
};
use crate::routing::CalculateRouteActivity;
use crate::shipping::{
    AddToManifestActivity, CreateShipmentActivity, MarkShippedActivity, NotifyCustomerActivity,
    PlaceOnDockActivity, ShipmentScanActivity, VerifyShipmentActivity,
};
use crate::validation::ValidateOrderActivity;

/// Register `activity` under `A::TYPE` on `pool`, translating between the
/// typed [`Activity`] trait and the pool's JSON-in/JSON-out handler closure.
pub fn register_activity<A: Activity>(pool: &WorkerPool, activity: Arc<A>) {
    pool.register_handler(A::TYPE, move |task: ClaimedTask| {
        let activity = activity.clone();
        async move { run(activity.as_ref(), task).await }
    });
}

async fn run<A: Activity>(activity: &A, task: ClaimedTask) -> ActivityResult {
    let input: A::Input = serde_json::from_value(task.input).map_err(|e| {
        ActivityFailure::non_retryable(format!("invalid activity input: {e}"))
    })?;

    let ctx = ActivityContext::new(
        task.workflow_id,
        task.activity_id.clone(),
        task.attempt,
        task.max_attempts,
    );

    match activity.execute(&ctx, input).await {
        Ok(output) => serde_json::to_value(output)
            .map_err(|e| ActivityFailure::retryable(format!("failed to serialize output: {e}"))),
        Err(err) => Err(err_into_failure(err)),
    }
}

fn err_into_failure(err: ActivityError) -> ActivityFailure {
    ActivityFailure::from(err)
}

/// Register every activity named in spec §4.6-§4.8 onto `pool`.
pub fn register_all(pool: &WorkerPool, client: Arc<DomainClient>) {
    register_activity(pool, Arc::new(ValidateOrderActivity::new(client.clone())));
    register_activity(pool, Arc::new(CalculateRouteActivity::new(client.clone())));

    register_activity(pool, Arc::new(CreatePickTaskActivity::new(client.clone())));
    register_activity(pool, Arc::new(AssignResourceActivity::new(client.clone())));
    register_activity(pool, Arc::new(FinalizeTaskActivity::new(client.clone())));
    register_activity(
        pool,
        Arc::new(ReprocessPickExceptionActivity::new(client.clone())),
    );

    register_activity(
        pool,
        Arc::new(CreateConsolidationTaskActivity::new(client.clone())),
    );
    register_activity(pool, Arc::new(SortTotesActivity::new(client.clone())));

    register_activity(pool, Arc::new(CreatePackTaskActivity::new(client.clone())));
    register_activity(pool, Arc::new(SelectPackagingActivity::new(client.clone())));
    register_activity(pool, Arc::new(PackItemsActivity::new(client.clone())));
    register_activity(pool, Arc::new(GiftWrapPackageActivity::new(client.clone())));
    register_activity(pool, Arc::new(WeighPackageActivity::new(client.clone())));
    register_activity(
        pool,
        Arc::new(GenerateShippingLabelActivity::new(client.clone())),
    );
    register_activity(pool, Arc::new(ApplyLabelActivity::new(client.clone())));
    register_activity(pool, Arc::new(SealPackageActivity::new(client.clone())));

    register_activity(pool, Arc::new(CreateShipmentActivity::new(client.clone())));
    register_activity(pool, Arc::new(ShipmentScanActivity::new(client.clone())));
    register_activity(pool, Arc::new(VerifyShipmentActivity::new(client.clone())));
    register_activity(pool, Arc::new(PlaceOnDockActivity::new(client.clone())));
    register_activity(pool, Arc::new(AddToManifestActivity::new(client.clone())));
    register_activity(pool, Arc::new(MarkShippedActivity::new(client.clone())));
    register_activity(pool, Arc::new(NotifyCustomerActivity::new(client.clone())));

    register_activity(pool, Arc::new(CancelOrderActivity::new(client.clone())));
    register_activity(
        pool,
        Arc::new(ReleaseInventoryReservationActivity::new(client.clone())),
    );
    register_activity(
        pool,
        Arc::new(NotifyCustomerCancellationActivity::new(client)),
    );
}
