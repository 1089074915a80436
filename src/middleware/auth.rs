use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{AuthError, Identity, Subject};
use crate::error::ApiError;

/// Resolves the caller from the `Authorization` header and attaches the
/// resulting [`Identity`] to the request. Requests without the header
/// continue as anonymous; a header that fails verification is rejected here.
pub async fn authenticate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AuthError::InvalidCredential("Invalid Authorization header format".into()))
        })
        .transpose()?;

    let identity = state.authenticator.authenticate(header)?;
    if let Identity::User(subject) = &identity {
        tracing::debug!("Authenticated subject {}", subject.id);
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// The request's identity, anonymous for public routes.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::internal_server_error("authentication middleware not installed"))
    }
}

/// Authenticated caller; rejects the anonymous identity with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Subject);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        Ok(CurrentUser(identity.require_user()?.clone()))
    }
}
