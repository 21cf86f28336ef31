//! Authentication middleware
//!
//! Session tokens are issued and signed by the upstream inventory API. The
//! gateway only reads the payload to learn who is calling and forwards the
//! token unchanged; upstream rejects forged or revoked tokens. Cached upstream
//! data is partitioned by token (see `services::session`), so a token upstream
//! has never accepted cannot read anything from the caches.

use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};

use shared::SessionUser;

use crate::error::AppError;

/// Authenticated session extracted from the bearer token
#[derive(Clone, Debug)]
pub struct AuthUser {
    /// Raw token, forwarded to the upstream API
    pub token: String,
    pub user: SessionUser,
}

/// Authentication middleware that requires a readable, unexpired bearer token
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) if !token.trim().is_empty() => token.trim().to_string(),
        _ => {
            return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
                .into_response();
        }
    };

    let user = match decode_session(&token) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    tracing::debug!(employee_id = user.employee_id, "Authenticated request");
    request.extensions_mut().insert(AuthUser { token, user });

    next.run(request).await
}

/// Read the session user from a token payload without verifying the signature
pub fn decode_session(token: &str) -> Result<SessionUser, AppError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    decode::<SessionUser>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::Unauthorized(format!("Invalid token: {}", e)),
        })
}

/// Extractor for the current session.
/// Use this in handlers to get the caller and their token
#[derive(Clone, Debug)]
pub struct CurrentSession(pub Option<AuthUser>);

impl CurrentSession {
    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    pub fn current_user(&self) -> Option<&SessionUser> {
        self.0.as_ref().map(|auth| &auth.user)
    }

    /// The authenticated session, or 401
    pub fn require(&self) -> Result<&AuthUser, AppError> {
        self.0
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(parts.extensions.get::<AuthUser>().cloned()))
    }
}
