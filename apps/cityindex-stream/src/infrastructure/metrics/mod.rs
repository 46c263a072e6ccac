//! Prometheus Metrics Module
//!
//! Counters, gauges and histograms for the streaming client. Recording is
//! a no-op until a recorder is installed, so library users who never call
//! [`init_metrics`] pay nothing.
//!
//! # Metrics Categories
//!
//! - **Updates**: rows dispatched, rows dropped on decode errors, callback panics
//! - **Subscriptions**: live tables per category, table create/delete counts
//! - **Connections**: sessions opened, reconnect attempts, state per adapter set
//! - **Rate limiting**: time spent waiting for a request token

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::streaming::{AdapterSet, Category, ConnectionState};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and describe every metric.
///
/// Calling it again returns the handle installed by the first call.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Handle for rendering the scrape output, if metrics were initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "cityindex_updates_dispatched_total",
        "Rows decoded and fanned out to listeners"
    );
    describe_counter!(
        "cityindex_decode_errors_total",
        "Rows dropped because they failed to decode"
    );
    describe_counter!(
        "cityindex_callback_failures_total",
        "Listener callbacks that panicked during dispatch"
    );

    describe_gauge!(
        "cityindex_active_subscriptions",
        "Channel keys with at least one listener"
    );
    describe_counter!("cityindex_tables_created_total", "Tables requested");
    describe_counter!("cityindex_tables_deleted_total", "Tables deleted");
    describe_counter!(
        "cityindex_tables_failed_total",
        "Table requests refused by a live connection"
    );

    describe_counter!("cityindex_sessions_created_total", "Push sessions opened");
    describe_counter!(
        "cityindex_reconnects_total",
        "Reconnection attempts scheduled"
    );
    describe_gauge!(
        "cityindex_connection_state",
        "0 disconnected, 1 connecting, 2 reconnecting, 3 connected"
    );

    describe_counter!(
        "cityindex_rest_requests_total",
        "Trading API requests by method and HTTP status"
    );
    describe_histogram!(
        "cityindex_rate_limit_wait_seconds",
        "Time callers waited for a request token"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one row fanned out to listeners.
pub fn record_update_dispatched(category: Category) {
    counter!(
        "cityindex_updates_dispatched_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Record a row dropped on a decode error.
pub fn record_decode_error(category: Category) {
    counter!(
        "cityindex_decode_errors_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Record a panicking listener.
pub fn record_callback_failure(category: Category) {
    counter!(
        "cityindex_callback_failures_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Update the live key count for a category.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(category: Category, count: usize) {
    gauge!(
        "cityindex_active_subscriptions",
        "category" => category.as_str()
    )
    .set(count as f64);
}

/// Record a table request.
pub fn record_table_created(category: Category) {
    counter!(
        "cityindex_tables_created_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Record a table deletion.
pub fn record_table_deleted(category: Category) {
    counter!(
        "cityindex_tables_deleted_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Record a table request the connection refused.
pub fn record_table_failed(category: Category) {
    counter!(
        "cityindex_tables_failed_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// Record a new push session.
pub fn record_session_created(adapter_set: AdapterSet) {
    counter!(
        "cityindex_sessions_created_total",
        "adapter_set" => adapter_set.as_str()
    )
    .increment(1);
}

/// Record a scheduled reconnect.
pub fn record_reconnect(adapter_set: AdapterSet) {
    counter!(
        "cityindex_reconnects_total",
        "adapter_set" => adapter_set.as_str()
    )
    .increment(1);
}

/// Export the state of one connection.
pub fn set_connection_state(adapter_set: AdapterSet, state: ConnectionState) {
    gauge!(
        "cityindex_connection_state",
        "adapter_set" => adapter_set.as_str()
    )
    .set(state.gauge_value());
}

/// Record a completed REST call. Transport failures report status 0.
pub fn record_rest_request(method: &str, status: u16) {
    counter!(
        "cityindex_rest_requests_total",
        "method" => method.to_owned(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record time spent in the rate limiter.
pub fn record_rate_limit_wait(waited: Duration) {
    histogram!("cityindex_rate_limit_wait_seconds").record(waited.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_update_dispatched(Category::Prices);
        record_decode_error(Category::News);
        record_table_failed(Category::TradeMargin);
        set_active_subscriptions(Category::Orders, 3);
        set_connection_state(AdapterSet::Account, ConnectionState::Connected);
        record_rate_limit_wait(Duration::from_millis(100));
        record_rest_request("GET", 200);
    }

    #[test]
    fn state_gauge_values_are_ordered() {
        assert!(
            ConnectionState::Connected.gauge_value() > ConnectionState::Disconnected.gauge_value()
        );
    }
}
