//! Prometheus exposition of the saga, stock and payment metrics.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the metrics the crates emit. Call once after the
/// recorder is installed.
pub fn describe() {
    metrics::describe_counter!("saga_executions_total", "Placement sagas started");
    metrics::describe_counter!("saga_completed", "Placement sagas that completed");
    metrics::describe_counter!("saga_failed", "Placement sagas that failed and compensated");
    metrics::describe_histogram!(
        "saga_duration_seconds",
        Unit::Seconds,
        "Wall time of one placement saga"
    );
    metrics::describe_counter!(
        "stock_reservations_total",
        "Stock ledger calls by operation and outcome"
    );
    metrics::describe_counter!(
        "compensation_failures_total",
        "Releases that failed during compensation"
    );
    metrics::describe_counter!(
        "downstream_timeouts_total",
        "Downstream calls abandoned after the call timeout"
    );
    metrics::describe_counter!("orders_placed_total", "Orders persisted by placement");
    metrics::describe_counter!("payment_intents_total", "Provider payment orders opened");
    metrics::describe_counter!(
        "payment_verifications_total",
        "Payment callbacks by outcome"
    );
}

/// GET /metrics
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
