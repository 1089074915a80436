use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};

use crate::app::AppState;

/// GET /debug/vars - Request and response counters in Prometheus text format
pub async fn debug_vars(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], state.metrics.render())
}
