//! Prometheus metrics for the kindred server.
//!
//! Counters cover event handling, notification delivery and retention
//! sweeps. Recording is a no-op until [`init_metrics`] installs a recorder.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const EVENTS_HANDLED_TOTAL: &str = "kindred_events_handled_total";
    pub const NOTIFICATIONS_SENT_TOTAL: &str = "kindred_notifications_sent_total";

    pub const RETENTION_DELETED_TOTAL: &str = "kindred_retention_deleted_total";
    pub const RETENTION_CHUNK_FAILURES_TOTAL: &str = "kindred_retention_chunk_failures_total";
    pub const COUNTER_COMPENSATIONS_TOTAL: &str = "kindred_counter_compensations_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics renders from the handle.
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

pub fn record_event_handled(handler: &str, outcome: &str) {
    counter!(
        names::EVENTS_HANDLED_TOTAL,
        "handler" => handler.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// `outcome` is `delivered`, `rejected` or `error`.
pub fn record_notification(outcome: &'static str) {
    counter!(names::NOTIFICATIONS_SENT_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_retention_deleted(collection: &str, count: u64) {
    if count == 0 {
        return;
    }
    counter!(names::RETENTION_DELETED_TOTAL, "collection" => collection.to_string())
        .increment(count);
}

pub fn record_chunk_failure(collection: &str) {
    counter!(
        names::RETENTION_CHUNK_FAILURES_TOTAL,
        "collection" => collection.to_string()
    )
    .increment(1);
}

pub fn record_compensation(counter_name: &str, amount: u64) {
    if amount == 0 {
        return;
    }
    counter!(
        names::COUNTER_COMPENSATIONS_TOTAL,
        "counter" => counter_name.to_string()
    )
    .increment(amount);
}
