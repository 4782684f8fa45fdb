//! Process wiring: one binary hosting the workflow executor, the activity
//! worker pool, the outbox relayer, and the signal-bus HTTP surface. A
//! control-plane/worker split collapsed into a single process, since this
//! core has no separate control-plane service to dial.

mod activity_bridge;
mod bus_ingress;
mod config;

use std::collections::HashMap;
use std::sync::Arc;

use activity_bridge::ExecutorResultSink;
use anyhow::{Context, Result};
use axum::Router;
use config::AppConfig;
use fulfillment_activities::DomainClient;
use fulfillment_idempotency::dedup::{ConsumedMessageStore, InMemoryConsumedMessageStore, PostgresConsumedMessageStore};
use fulfillment_idempotency::store::{IdempotencyStore, InMemoryIdempotencyStore, PostgresIdempotencyStore};
use fulfillment_idempotency::IdempotencyLayer;
use fulfillment_outbox::{InMemoryBusPublisher, InMemoryOutboxStore, OutboxStore, PostgresOutboxStore, Relayer, RelayerConfig};
use fulfillment_sagas::cancellation::CancellationOrchestrator;
use fulfillment_sagas::children::{ConsolidationWorkflow, PackingWorkflow, PickingWorkflow, ShippingWorkflow};
use fulfillment_sagas::orchestrator::OrderFulfillmentWorkflow;
use fulfillment_runtime::{
    DerivedIdIndex, InMemoryDerivedIdIndex, InMemoryWorkflowEventStore, PostgresWorkflowEventStore,
    TokioTimerService, WorkerPool, WorkerPoolConfig, WorkflowEventStore, WorkflowExecutor,
};
use fulfillment_signalbus::{signal_router, CloudEventSignalBridge, SignalBusState};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::info;

const ACTIVITY_TYPES: &[&str] = &[
    "validate_order",
    "calculate_route",
    "create_pick_task",
    "assign_pick_resource",
    "finalize_pick_task",
    "create_consolidation_task",
    "create_pack_task",
    "select_packaging",
    "pack_items",
    "weigh_package",
    "generate_shipping_label",
    "apply_label",
    "seal_package",
    "create_shipment",
    "shipment_scan",
    "verify_shipment",
    "place_on_dock",
    "add_to_manifest",
    "mark_shipped",
    "notify_customer",
    "cancel_order",
    "release_inventory_reservation",
    "notify_customer_cancellation",
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();

    if let Some(database_url) = config.database_url.clone() {
        info!("connecting to postgres");
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&database_url)
            .await
            .context("failed to connect to database")?;

        run(
            config,
            PostgresWorkflowEventStore::new(pool.clone()),
            PostgresOutboxStore::new(pool.clone()),
            PostgresIdempotencyStore::new(pool.clone()),
            PostgresConsumedMessageStore::new(pool),
        )
        .await
    } else {
        info!("DATABASE_URL not set, running with in-memory stores");
        run(
            config,
            InMemoryWorkflowEventStore::new(),
            InMemoryOutboxStore::new(),
            InMemoryIdempotencyStore::new(),
            InMemoryConsumedMessageStore::new(),
        )
        .await
    }
}

/// Wires every collaborator together for one store backend. Generic over the
/// four persistence traits so the postgres and in-memory paths above share
/// this one body instead of diverging.
async fn run<S, OS, IS, DS>(
    config: AppConfig,
    store: S,
    outbox_store: OS,
    idempotency_store: IS,
    dedup_store: DS,
) -> Result<()>
where
    S: WorkflowEventStore + Clone,
    OS: OutboxStore,
    IS: IdempotencyStore,
    DS: ConsumedMessageStore,
{
    let shared_store: Arc<dyn WorkflowEventStore> = Arc::new(store.clone());

    let domain_client = Arc::new(DomainClient::new(
        config.domain_services.clone(),
        shared_store.clone(),
    ));

    let mut executor = WorkflowExecutor::new(store);
    executor.register::<OrderFulfillmentWorkflow>();
    executor.register::<CancellationOrchestrator>();
    executor.register::<PickingWorkflow>();
    executor.register::<ConsolidationWorkflow>();
    executor.register::<PackingWorkflow>();
    executor.register::<ShippingWorkflow>();
    let executor = Arc::new(executor);

    executor.set_timer_service(Arc::new(TokioTimerService::new(executor.clone())));

    let derived_id_index = InMemoryDerivedIdIndex::new(fulfillment_signalbus::derive_workflow_id);
    executor.set_derived_id_index(derived_id_index.clone() as Arc<dyn DerivedIdIndex>);

    let pool = Arc::new(WorkerPool::new(
        shared_store.clone(),
        WorkerPoolConfig::new(ACTIVITY_TYPES.iter().map(|s| s.to_string()).collect())
            .with_worker_group(config.runtime.namespace.clone()),
    ));
    fulfillment_activities::register::register_all(&pool, domain_client);
    pool.set_result_sink(Arc::new(ExecutorResultSink::new(executor.clone())));
    pool.start().await.context("failed to start worker pool")?;

    let relayer = Arc::new(Relayer::new(
        Arc::new(outbox_store),
        Arc::new(InMemoryBusPublisher::new()),
        RelayerConfig {
            poll_interval: config.outbox.poll_interval,
            batch_size: config.outbox.batch_size,
            ..RelayerConfig::default()
        },
    ));
    let _relayer_handle = relayer.clone().spawn();

    let idempotency_store = Arc::new(idempotency_store);
    let signal_state = SignalBusState {
        sink: executor.clone(),
        resolver: derived_id_index.clone(),
    };
    let signals = signal_router(signal_state)
        .layer(IdempotencyLayer::new(idempotency_store.clone(), "signalbus"));

    let bridge = Arc::new(CloudEventSignalBridge::new(
        executor.clone(),
        derived_id_index.clone(),
        Arc::new(dedup_store),
        "fulfillment-server",
    ));
    let bus = bus_ingress::bus_ingress_router(bus_ingress::BusIngressState { bridge });

    let app: Router = Router::new()
        .route("/health", axum::routing::get(health))
        .merge(signals)
        .merge(bus)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "fulfillment-server listening");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.context("server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    relayer.shutdown();
    pool.shutdown().await.context("worker pool shutdown failed")?;

    Ok(())
}

async fn health() -> axum::Json<HashMap<&'static str, &'static str>> {
    axum::Json(HashMap::from([("status", "ok")]))
}
