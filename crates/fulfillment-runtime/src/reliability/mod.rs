//! Reliability patterns for durable execution
//!
//! This module provides:
//! - [`RetryPolicy`] - Configurable retry with exponential backoff
//! - [`CircuitBreakerConfig`] - Circuit breaker configuration
//! - [`DistributedCircuitBreaker`] - Circuit breaker shared across workers via
//!   the `WorkflowEventStore`, one instance per downstream domain service
//!   (spec §4.2: activities wrapped in a circuit breaker per service)

mod circuit_breaker;
mod distributed_circuit_breaker;
mod retry;
mod timeout;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitState};
pub use distributed_circuit_breaker::{
    CircuitBreakerError, CircuitBreakerPermit, DistributedCircuitBreaker,
};
pub use retry::RetryPolicy;
pub use timeout::{TaskTimingInfo, TimedOutTask, TimeoutConfig, TimeoutError, TimeoutManager, TimeoutType};
