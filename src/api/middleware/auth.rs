//! Bearer token authentication middleware.
//!
//! Active only when the server is configured with a token; otherwise every
//! request passes through.

use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

/// Require `Authorization: Bearer <token>` when a token is configured.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match check_token(&req) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

fn check_token(req: &Request<axum::body::Body>) -> Result<(), ApiError> {
    let ctx = req
        .extensions()
        .get::<ApiContext>()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let Some(expected) = ctx.config.auth_token.as_deref() else {
        return Ok(());
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if presented.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 0 {
        tracing::warn!(path = %req.uri().path(), "Rejected request with invalid token");
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}
