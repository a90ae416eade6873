//! Shared types for the extraction API layer.

use std::sync::Arc;

use axum::http::HeaderValue;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::logging::LogControl;
use crate::pipeline::extraction::{LopdfParser, PdfParser};

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub parser: Arc<dyn PdfParser>,
    pub config: Arc<ServerConfig>,
    pub log: Arc<LogControl>,
}

impl ApiContext {
    pub fn new(config: ServerConfig, log: Arc<LogControl>) -> Self {
        Self {
            parser: Arc::new(LopdfParser),
            config: Arc::new(config),
            log,
        }
    }

    /// Swap the PDF parser (tests inject fakes).
    pub fn with_parser(mut self, parser: Arc<dyn PdfParser>) -> Self {
        self.parser = parser;
        self
    }
}

/// Per-request correlation id, injected into request extensions by the
/// correlation middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Reuse the caller's id when it parses, otherwise mint a new one.
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        value
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(CorrelationId)
            .unwrap_or_else(|| CorrelationId(Uuid::new_v4()))
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
