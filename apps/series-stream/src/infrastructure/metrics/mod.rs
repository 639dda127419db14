//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Generation**: samples produced, loop state, iteration latency
//! - **Persistence**: failed appends
//! - **Delivery**: messages delivered, subscribers evicted, live subscribers
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "series_stream_samples_generated_total",
        "Total samples produced by the generation loop"
    );
    describe_counter!(
        "series_stream_persist_failures_total",
        "Total samples the store failed to persist"
    );
    describe_counter!(
        "series_stream_messages_delivered_total",
        "Total sample messages delivered to subscribers"
    );
    describe_counter!(
        "series_stream_subscribers_evicted_total",
        "Total subscribers evicted after a failed send"
    );

    describe_gauge!(
        "series_stream_subscribers",
        "Number of attached live-stream subscribers"
    );
    describe_gauge!(
        "series_stream_generation_running",
        "1 while a generation loop is running, 0 otherwise"
    );

    describe_histogram!(
        "series_stream_iteration_seconds",
        "Time spent persisting and broadcasting one sample"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one generated sample.
pub fn record_sample_generated() {
    counter!("series_stream_samples_generated_total").increment(1);
}

/// Record a failed append.
pub fn record_persist_failure() {
    counter!("series_stream_persist_failures_total").increment(1);
}

/// Record messages delivered by one publish.
pub fn record_messages_delivered(count: u64) {
    if count > 0 {
        counter!("series_stream_messages_delivered_total").increment(count);
    }
}

/// Record subscribers evicted by one publish.
pub fn record_subscribers_evicted(count: u64) {
    counter!("series_stream_subscribers_evicted_total").increment(count);
}

/// Update the attached subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("series_stream_subscribers").set(count as f64);
}

/// Update the generation loop state.
pub fn set_generation_running(running: bool) {
    gauge!("series_stream_generation_running").set(if running { 1.0 } else { 0.0 });
}

/// Record how long one iteration took, excluding the interval sleep.
pub fn record_iteration_duration(duration: Duration) {
    histogram!("series_stream_iteration_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_sample_generated();
        record_persist_failure();
        record_messages_delivered(3);
        record_subscribers_evicted(1);
        set_subscribers(2);
        set_generation_running(true);
        record_iteration_duration(Duration::from_millis(5));
    }
}
