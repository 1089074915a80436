// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::assets::AssetError;
use crate::auth::AuthError;
use crate::database::{StoreError, ValidationErrors};

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Every typed outcome of the admission, auth, store and asset layers maps to
/// exactly one variant here, and every variant has a stable status and code.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthenticated(String),
    InvalidCredential(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed(String),

    // 409 Conflict
    EditConflict(String),
    DuplicateOwner(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 415 Unsupported Media Type
    InvalidContentType(String),

    // 422 Unprocessable Entity
    ValidationFailed {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    IoFailure(String),
    InternalServerError(String),

    // 503 Service Unavailable
    Timeout(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthenticated(_) => 401,
            ApiError::InvalidCredential(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::EditConflict(_) => 409,
            ApiError::DuplicateOwner(_) => 409,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::InvalidContentType(_) => 415,
            ApiError::ValidationFailed { .. } => 422,
            ApiError::TooManyRequests(_) => 429,
            ApiError::IoFailure(_) => 500,
            ApiError::InternalServerError(_) => 500,
            ApiError::Timeout(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthenticated(msg) => msg,
            ApiError::InvalidCredential(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed(msg) => msg,
            ApiError::EditConflict(msg) => msg,
            ApiError::DuplicateOwner(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::InvalidContentType(msg) => msg,
            ApiError::ValidationFailed { message, .. } => message,
            ApiError::TooManyRequests(msg) => msg,
            ApiError::IoFailure(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::Timeout(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::EditConflict(_) => "EDIT_CONFLICT",
            ApiError::DuplicateOwner(_) => "DUPLICATE_OWNER",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InvalidContentType(_) => "INVALID_CONTENT_TYPE",
            ApiError::ValidationFailed { .. } => "VALIDATION_ERROR",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::IoFailure(_) => "IO_FAILURE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::Timeout(_) => "TIMEOUT",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationFailed { field_errors, .. } = self {
            response["field_errors"] = json!(field_errors);
        }

        response
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

// Convert domain error types to ApiError
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => {
                ApiError::Unauthenticated("you must be authenticated to access this resource".into())
            }
            AuthError::InvalidCredential(reason) => {
                tracing::debug!("Rejected bearer credential: {}", reason);
                ApiError::InvalidCredential("invalid or missing authentication token".into())
            }
            AuthError::Signing(msg) => {
                tracing::error!("Token signing failed: {}", msg);
                ApiError::internal_server_error("the server encountered a problem")
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::ValidationFailed {
            message: "request failed validation".into(),
            field_errors: err.into_inner(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::not_found("the requested resource could not be found"),
            StoreError::Conflict => ApiError::EditConflict(
                "unable to update the record due to an edit conflict, please try again".into(),
            ),
            StoreError::DuplicateOwner => {
                ApiError::DuplicateOwner("a record already exists for this owner".into())
            }
            StoreError::Validation(errors) => errors.into(),
            StoreError::Timeout(after) => {
                tracing::error!("Store call timed out after {:?}", after);
                ApiError::Timeout("the database did not respond in time".into())
            }
            StoreError::Database(e) => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", e);
                ApiError::internal_server_error("the server encountered a problem")
            }
        }
    }
}

impl From<AssetError> for ApiError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::InvalidContentType(detected) => ApiError::InvalidContentType(format!(
                "please upload a JPEG or PNG image (detected {})",
                detected
            )),
            AssetError::InvalidName(name) => ApiError::not_found(format!("asset '{}' not found", name)),
            AssetError::Missing(_) => ApiError::not_found("the requested resource could not be found"),
            AssetError::Io(e) => {
                tracing::error!("Asset I/O failure: {}", e);
                ApiError::IoFailure("failed to store the uploaded file".into())
            }
            AssetError::Store(e) => e.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
