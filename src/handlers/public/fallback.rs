use axum::http::{Method, Uri};

use crate::error::ApiError;

/// Any path no route matches.
pub async fn not_found(uri: Uri) -> ApiError {
    tracing::debug!("No route for {}", uri.path());
    ApiError::not_found("the requested resource could not be found")
}

/// A known path requested with a method it does not support.
pub async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    tracing::debug!("{} is not supported on {}", method, uri.path());
    ApiError::MethodNotAllowed(format!("the {} method is not supported for this resource", method))
}
