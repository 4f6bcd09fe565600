//! Prometheus metrics exposition and request accounting
//!
//! Registered series:
//!
//! - `letter_requests_total` (counter): labels `status`, `method`
//! - `letter_request_duration_seconds` (histogram): label `status`
//! - `letter_upstream_errors_total` (counter): label `error_type`
//! - `letter_active_sessions` (gauge)
//!
//! Alongside the Prometheus series, [`ServiceMetrics`] keeps plain atomic
//! counters that the `/health` endpoint reads without touching the recorder.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::AppState;

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures `letter_request_duration_seconds` with explicit buckets so it
/// renders as a histogram (with `_bucket` lines usable in
/// `histogram_quantile()` queries) rather than the default summary. The
/// boundaries span 5ms to 60s, covering everything from a session-cookie hit
/// to a slow Drive upload.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format served on `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "letter_request_duration_seconds".to_string(),
            ),
            &[
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("letter_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!("letter_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

/// Record a failed call to Google (token endpoint or Drive) with a
/// classification label.
pub fn record_upstream_error(error_type: &str) {
    metrics::counter!("letter_upstream_errors_total", "error_type" => error_type.to_string())
        .increment(1);
}

/// Publish the current live-session count.
pub fn set_active_sessions(count: f64) {
    metrics::gauge!("letter_active_sessions").set(count);
}

/// Atomic counters for the `/health` endpoint. Cloning shares the counters.
#[derive(Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub in_flight: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware recording every request into both the Prometheus series and
/// the `/health` counters. Server errors (5xx) count toward `errors_total`.
pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let started = Instant::now();
    state.metrics.in_flight.fetch_add(1, Ordering::Relaxed);
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
    }
    record_request(status.as_u16(), &method, started.elapsed().as_secs_f64());
    state.metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
    response
}
