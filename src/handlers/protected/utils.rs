use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::{header::IF_MATCH, HeaderMap, StatusCode},
};
use uuid::Uuid;

use crate::auth::Subject;
use crate::error::ApiError;

/// Only the owner may modify a resource.
pub fn ensure_owner(subject: &Subject, owner: Uuid) -> Result<(), ApiError> {
    if subject.id == owner {
        Ok(())
    } else {
        tracing::warn!("Subject {} attempted to modify a resource owned by {}", subject.id, owner);
        Err(ApiError::forbidden(
            "you do not have the necessary permissions to modify this resource",
        ))
    }
}

/// Reads the optimistic-concurrency version from `If-Match`.
///
/// Accepts a bare integer or a quoted one (`"3"`, `W/"3"`). `*` and an
/// absent header both mean "whatever version was just loaded".
pub fn expected_version(headers: &HeaderMap) -> Result<Option<i32>, ApiError> {
    let Some(value) = headers.get(IF_MATCH) else {
        return Ok(None);
    };

    let raw = value
        .to_str()
        .map_err(|_| ApiError::bad_request("If-Match header must be ASCII"))?
        .trim();
    if raw == "*" {
        return Ok(None);
    }

    let unquoted = raw.strip_prefix("W/").unwrap_or(raw).trim_matches('"');
    unquoted
        .parse::<i32>()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("If-Match must hold a record version, got {:?}", raw)))
}

pub fn multipart_rejection(rejection: MultipartRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

pub fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(err.body_text())
    }
}

pub fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}
