//! Correlation id middleware.
//!
//! Reads `X-Correlation-Id` (or mints one), exposes it to handlers as a
//! `CorrelationId` extension, runs the request inside a span carrying it,
//! and echoes it on the response.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use crate::api::types::CorrelationId;
use crate::config::CORRELATION_HEADER;

pub async fn assign(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let id = CorrelationId::from_header(req.headers().get(CORRELATION_HEADER));
    req.extensions_mut().insert(id);

    let span = tracing::info_span!(
        "request",
        correlation_id = %id,
        method = %req.method(),
        path = %req.uri().path()
    );

    let mut response = next.run(req).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::debug!(status = response.status().as_u16(), "Request finished");
    });

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
