use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(subject: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: subject,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Authenticated caller resolved from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Caller identity attached to each request exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(Subject),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    /// The authenticated subject, or `Unauthenticated` for the anonymous sentinel.
    pub fn require_user(&self) -> Result<&Subject, AuthError> {
        match self {
            Identity::User(subject) => Ok(subject),
            Identity::Anonymous => Err(AuthError::Unauthenticated),
        }
    }
}

/// Verifies HS256 bearer tokens against a shared secret.
#[derive(Clone)]
pub struct Authenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        // Expiry is checked to the second, no grace period
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Resolves the caller from the raw `Authorization` header value.
    ///
    /// No header yields the anonymous identity; anything present but not a
    /// valid, unexpired bearer token is `InvalidCredential`.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Identity, AuthError> {
        let Some(header) = authorization else {
            return Ok(Identity::Anonymous);
        };

        let token = extract_bearer(header)?;
        let claims = self.verify(token)?;

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidCredential("expiry out of range".into()))?;

        Ok(Identity::User(Subject {
            id: claims.sub,
            expires_at,
        }))
    }

    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::InvalidCredential("token expired".into()),
                ErrorKind::InvalidSignature => {
                    AuthError::InvalidCredential("signature mismatch".into())
                }
                _ => AuthError::InvalidCredential(format!("malformed token: {}", e)),
            })
    }

    /// Mints a token for `subject` valid for `ttl`.
    pub fn issue(&self, subject: Uuid, ttl: Duration) -> Result<String, AuthError> {
        encode(&Header::default(), &Claims::new(subject, ttl), &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

/// Extract the token from a `Bearer <token>` header value
fn extract_bearer(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Err(AuthError::InvalidCredential("empty bearer token".into()))
            } else {
                Ok(token)
            }
        }
        _ => Err(AuthError::InvalidCredential(
            "authorization header must use Bearer token format".into(),
        )),
    }
}
