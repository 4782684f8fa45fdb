//! Default `ActivityOptions` per spec §4.2's table, and the cancellation-saga
//! override (§4.8).

use std::time::Duration;

use fulfillment_runtime::workflow::ActivityOptions;
use fulfillment_runtime::RetryPolicy;

/// `startToCloseTimeout = 10 min`, `heartbeatTimeout = 30 s`, retry
/// `{initialInterval=1s, backoffCoefficient=2.0, maximumInterval=1min,
/// maximumAttempts=3}` — the default unless an activity overrides it.
pub fn default_options() -> ActivityOptions {
    ActivityOptions::default()
        .with_start_to_close_timeout(Duration::from_secs(10 * 60))
        .with_heartbeat(Duration::from_secs(30))
        .with_retry(
            RetryPolicy::exponential()
                .with_initial_interval(Duration::from_secs(1))
                .with_max_interval(Duration::from_secs(60))
                .with_max_attempts(3),
        )
}

/// Cancellation-saga activities override to `scheduleToCloseTimeout = 5 min`
/// (spec §4.2). `fulfillment-runtime::ActivityOptions` has no separate
/// schedule-to-close field, so the closest available lever —
/// `start_to_close_timeout` — carries the 5 minute bound.
pub fn cancellation_options(max_attempts: u32) -> ActivityOptions {
    default_options()
        .with_start_to_close_timeout(Duration::from_secs(5 * 60))
        .with_retry(
            RetryPolicy::exponential()
                .with_initial_interval(Duration::from_secs(1))
                .with_max_interval(Duration::from_secs(60))
                .with_max_attempts(max_attempts),
        )
}
