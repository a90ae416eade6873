//! `POST /api/extract-pdf`: server-side fallback extraction.
//!
//! Receives a base64 PDF, parses it with the server's parser, and returns
//! recovered text. Used by clients whose local parse failed.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CorrelationId};
use crate::pipeline::extraction::{
    extract_local, ProxyExtractRequest, ProxyExtractResponse, ProxyOptions,
};

pub async fn extract_pdf(
    State(ctx): State<ApiContext>,
    Extension(correlation_id): Extension<CorrelationId>,
    payload: Result<Json<ProxyExtractRequest>, JsonRejection>,
) -> Result<Json<ProxyExtractResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let bytes = decode_document(&request.pdf_base64)?;
    let max_pages = effective_max_pages(&request.options, &ctx);
    let budget = effective_budget(&request.options, &ctx);

    tracing::info!(
        correlation_id = %correlation_id,
        size = bytes.len(),
        max_pages,
        budget_ms = budget.as_millis() as u64,
        "Fallback extraction requested"
    );

    let parser = ctx.parser.clone();
    let task = tokio::task::spawn_blocking(move || extract_local(parser.as_ref(), &bytes, max_pages));

    // The blocking parse cannot be cancelled; on timeout it finishes in the
    // background and its result is dropped.
    let output = match tokio::time::timeout(budget, task).await {
        Err(_) => {
            tracing::warn!(correlation_id = %correlation_id, "Fallback extraction timed out");
            return Err(ApiError::Timeout(budget));
        }
        Ok(Err(join_error)) => {
            return Err(ApiError::Internal(format!("parse task failed: {join_error}")))
        }
        Ok(Ok(result)) => result?,
    };

    if output.is_fallback() {
        return Err(ApiError::NoTextFound("no cleaning stage recovered text".into()));
    }

    tracing::info!(
        correlation_id = %correlation_id,
        text_len = output.text.len(),
        pages = output.pages.unwrap_or(0),
        "Fallback extraction succeeded"
    );

    Ok(Json(ProxyExtractResponse {
        text: Some(output.text),
        error: None,
        pages: output.pages,
    }))
}

/// Accepts bare base64 or a `data:` URL.
fn decode_document(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let data = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Empty document".into()));
    }
    Ok(bytes)
}

fn effective_max_pages(options: &ProxyOptions, ctx: &ApiContext) -> usize {
    options
        .max_pages
        .unwrap_or(ctx.config.default_max_pages)
        .clamp(1, ctx.config.max_pages_limit.max(1))
}

fn effective_budget(options: &ProxyOptions, ctx: &ApiContext) -> Duration {
    options
        .timeout
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .map_or(ctx.config.watchdog, |requested| requested.min(ctx.config.watchdog))
}
