use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::admission::Admission;
use crate::app::AppState;
use crate::error::ApiError;

/// Key used when the peer address is unavailable (e.g. in-process tests).
const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limit key for a request: the peer IP address.
pub fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Charges one token per request; answers 429 once the client's bucket is empty.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.admission.is_enabled() {
        return next.run(request).await;
    }

    let key = client_key(&request);
    match state.admission.admit(&key) {
        Admission::Allowed => next.run(request).await,
        Admission::Throttled => {
            tracing::warn!(client = %key, "Rate limit exceeded");
            metrics::counter!(super::telemetry::REQUESTS_THROTTLED).increment(1);
            ApiError::too_many_requests("rate limit exceeded").into_response()
        }
    }
}
