use axum::{extract::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Instant;

pub const REQUESTS_RECEIVED: &str = "http_requests_received_total";
pub const RESPONSES_SENT: &str = "http_responses_sent_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const REQUESTS_THROTTLED: &str = "http_requests_throttled_total";

static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

/// Handle to the process-wide Prometheus recorder, installing it on first use.
///
/// When another recorder already owns the global slot, a detached recorder
/// is returned instead; it renders an empty exposition.
pub fn recorder() -> PrometheusHandle {
    RECORDER
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .cloned()
        .unwrap_or_else(|e| {
            tracing::warn!("Metrics recorder unavailable: {}", e);
            PrometheusBuilder::new().build_recorder().handle()
        })
}

/// Counts every request and response, and times the handler chain.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    metrics::counter!(REQUESTS_RECEIVED).increment(1);

    let response = next.run(request).await;

    metrics::counter!(RESPONSES_SENT, "status" => response.status().as_u16().to_string()).increment(1);
    metrics::histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());
    response
}
