//! API error types with structured JSON responses.
//!
//! The body is flat (`{ "error": "...", "code": "..." }`) so extraction
//! clients read failures with the same shape as successful responses.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::logging::LogError;
use crate::pipeline::extraction::ExtractionError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("No text found: {0}")]
    NoTextFound(String),
    #[error("Processing timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::NoTextFound(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NO_TEXT",
                "No text found in PDF".to_string(),
            ),
            ApiError::Timeout(limit) => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                format!("Processing timed out after {}s", limit.as_secs()),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Parse(detail) | ExtractionError::InvalidUrl(detail) => {
                ApiError::BadRequest(detail)
            }
            ExtractionError::NoTextFound(detail) | ExtractionError::NotFound(detail) => {
                ApiError::NoTextFound(detail)
            }
            ExtractionError::Timeout(limit) => ApiError::Timeout(limit),
            ExtractionError::Auth(_) => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<LogError> for ApiError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::UnknownLevel(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn no_text_returns_422_with_flat_error() {
        let response = ApiError::NoTextFound("empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"], "No text found in PDF");
    }

    #[tokio::test]
    async fn timeout_returns_504() {
        let response = ApiError::Timeout(Duration::from_secs(45)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Processing timed out after 45s");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "An internal error occurred");
    }

    #[test]
    fn extraction_errors_map_to_statuses() {
        assert!(matches!(
            ApiError::from(ExtractionError::Parse("xref".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(ExtractionError::NoTextFound("none".into())),
            ApiError::NoTextFound(_)
        ));
        assert!(matches!(
            ApiError::from(ExtractionError::Timeout(Duration::from_secs(1))),
            ApiError::Timeout(_)
        ));
        assert!(matches!(
            ApiError::from(ExtractionError::Network("down".into())),
            ApiError::Internal(_)
        ));
    }
}
