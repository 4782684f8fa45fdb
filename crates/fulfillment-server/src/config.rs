//! Loads the recognized options of spec §6.4 from the environment
//! (`dotenvy::dotenv().ok()` then `std::env::var` with defaults), collected
//! into one [`AppConfig`].

use std::collections::HashMap;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

/// `workflow.runtime.hostPort` / `workflow.runtime.namespace` (spec §6.4):
/// this core self-hosts the runtime, so these name the process's own
/// HTTP bind address and the tenant label attached to its logs, rather than
/// an external server to dial.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host_port: String,
    pub namespace: String,
}

/// `bus.brokers` (spec §6.4). No concrete broker is wired in this core
/// (`BusPublisher` is a trait with only an in-memory implementation today —
/// see DESIGN.md); this is carried so a real adapter has somewhere to read
/// its endpoint list from.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub brokers: Vec<String>,
}

/// `outbox.pollInterval`, `outbox.batchSize` (spec §6.4).
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
}

/// `idempotency.retention`, `idempotency.lockTimeout`, `idempotency.requireKey`
/// (spec §6.4).
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    pub retention: Duration,
    pub lock_timeout: Duration,
    pub require_key: bool,
}

/// `activity.defaultRetry.*` (spec §6.4): overrides applied to
/// `fulfillment_runtime::reliability::RetryPolicy::exponential()`, the
/// default every activity in `fulfillment-activities` starts from.
#[derive(Debug, Clone)]
pub struct ActivityRetryConfig {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff_coefficient: f64,
}

/// Base URLs for the domain services `fulfillment-activities`' `DomainClient`
/// dials (spec §4.6-§4.8): one `<NAME>_SERVICE_URL` env var per service, each
/// defaulting to a distinct localhost port so a single-machine dev stack
/// comes up without any configuration.
fn default_domain_services() -> Vec<(&'static str, u16)> {
    vec![
        ("orders", 8081),
        ("inventory", 8082),
        ("notifications", 8083),
        ("consolidation", 8084),
        ("packing", 8085),
        ("shipping", 8086),
        ("picking", 8087),
        ("routing", 8088),
    ]
}

fn domain_services_from_env() -> HashMap<String, String> {
    default_domain_services()
        .into_iter()
        .map(|(name, port)| {
            let env_key = format!("{}_SERVICE_URL", name.to_uppercase());
            let url = env_or(&env_key, &format!("http://127.0.0.1:{port}"));
            (name.to_string(), url)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub runtime: RuntimeConfig,
    pub bus: BusConfig,
    pub outbox: OutboxConfig,
    pub idempotency: IdempotencyConfig,
    pub activity_retry: ActivityRetryConfig,
    pub domain_services: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            runtime: RuntimeConfig {
                host_port: env_or("WORKFLOW_RUNTIME_HOST_PORT", "0.0.0.0:8080"),
                namespace: env_or("WORKFLOW_RUNTIME_NAMESPACE", "default"),
            },
            bus: BusConfig {
                brokers: std::env::var("BUS_BROKERS")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.split(',').map(|b| b.trim().to_string()).collect())
                    .unwrap_or_default(),
            },
            outbox: OutboxConfig {
                poll_interval: Duration::from_millis(env_u32("OUTBOX_POLL_INTERVAL_MS", 500) as u64),
                batch_size: env_usize("OUTBOX_BATCH_SIZE", 100),
            },
            idempotency: IdempotencyConfig {
                retention: env_duration_secs("IDEMPOTENCY_RETENTION_SECS", 24 * 3600),
                lock_timeout: env_duration_secs("IDEMPOTENCY_LOCK_TIMEOUT_SECS", 5 * 60),
                require_key: env_bool("IDEMPOTENCY_REQUIRE_KEY", false),
            },
            activity_retry: ActivityRetryConfig {
                max_attempts: env_u32("ACTIVITY_DEFAULT_RETRY_MAX_ATTEMPTS", 5),
                initial_interval: Duration::from_millis(env_u32(
                    "ACTIVITY_DEFAULT_RETRY_INITIAL_INTERVAL_MS",
                    1000,
                ) as u64),
                max_interval: Duration::from_secs(env_u32(
                    "ACTIVITY_DEFAULT_RETRY_MAX_INTERVAL_SECS",
                    60,
                ) as u64),
                backoff_coefficient: std::env::var("ACTIVITY_DEFAULT_RETRY_BACKOFF_COEFFICIENT")
                    .ok()
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(2.0),
            },
            domain_services: domain_services_from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_with_no_environment() {
        // Isolated from the process environment: only asserts the shape a
        // caller gets back with the relevant vars absent, not live env state.
        let config = AppConfig {
            database_url: None,
            bind_addr: "0.0.0.0:8080".into(),
            runtime: RuntimeConfig {
                host_port: "0.0.0.0:8080".into(),
                namespace: "default".into(),
            },
            bus: BusConfig { brokers: vec![] },
            outbox: OutboxConfig {
                poll_interval: Duration::from_millis(500),
                batch_size: 100,
            },
            idempotency: IdempotencyConfig {
                retention: Duration::from_secs(24 * 3600),
                lock_timeout: Duration::from_secs(5 * 60),
                require_key: false,
            },
            activity_retry: ActivityRetryConfig {
                max_attempts: 5,
                initial_interval: Duration::from_millis(1000),
                max_interval: Duration::from_secs(60),
                backoff_coefficient: 2.0,
            },
            domain_services: HashMap::new(),
        };

        assert!(config.database_url.is_none());
        assert_eq!(config.outbox.batch_size, 100);
        assert!(!config.idempotency.require_key);
    }

    #[test]
    fn domain_services_default_to_distinct_localhost_ports() {
        let services = domain_services_from_env();
        assert_eq!(services.len(), 8);
        assert_eq!(services.get("orders").unwrap(), "http://127.0.0.1:8081");
        assert_eq!(services.get("routing").unwrap(), "http://127.0.0.1:8088");
    }
}
