//! Document byte fetcher.
//!
//! Downloads a document either straight from its origin or through a
//! same-origin proxy (`{proxy}?url=<source>`) when cross-origin or auth
//! rules get in the way. Retrying is the orchestrator's job, not ours.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{StatusCode, Url};

use super::types::{ByteFetcher, RawDocumentBytes};
use super::ExtractionError;
use crate::config::ExtractionConfig;

/// HTTP fetcher backed by a shared `reqwest::Client`.
pub struct HttpFetcher {
    client: reqwest::Client,
    proxy: Option<String>,
    auth_token: Option<String>,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("pdf-salvage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExtractionError::Network(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            proxy: config.fetch_proxy.clone(),
            auth_token: config.auth_token.clone(),
            max_bytes: config.max_document_bytes,
        })
    }
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    async fn fetch(
        &self,
        source_url: &str,
        hint: Option<&str>,
    ) -> Result<RawDocumentBytes, ExtractionError> {
        let url = validate_source_url(source_url)?;

        let mut request = match &self.proxy {
            Some(proxy) => self.client.get(proxy).query(&[("url", url.as_str())]),
            None => self.client.get(url.clone()),
        };
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(
            url = %url,
            title = hint.unwrap_or(""),
            via_proxy = self.proxy.is_some(),
            "Fetching document"
        );

        let response = request.send().await.map_err(map_request_error)?;
        check_status(response.status(), source_url)?;

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_request_error)?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(ExtractionError::Network(format!(
                    "document exceeds {} byte limit",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(ExtractionError::NotFound(format!(
                "{source_url} returned an empty body"
            )));
        }

        tracing::debug!(url = %url, size = body.len(), "Document fetched");
        Ok(RawDocumentBytes::new(source_url, body))
    }
}

/// Accept only absolute http(s) URLs.
pub fn validate_source_url(source: &str) -> Result<Url, ExtractionError> {
    let url = Url::parse(source.trim())
        .map_err(|e| ExtractionError::InvalidUrl(format!("'{source}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ExtractionError::InvalidUrl(format!(
            "'{source}': unsupported scheme '{other}'"
        ))),
    }
}

/// Map a non-success status to the error taxonomy.
pub fn check_status(status: StatusCode, source: &str) -> Result<(), ExtractionError> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ExtractionError::Auth(format!("{source} answered {status}"))
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            ExtractionError::NotFound(format!("{source} answered {status}"))
        }
        _ => ExtractionError::Network(format!("{source} answered {status}")),
    })
}

pub(crate) fn map_request_error(e: reqwest::Error) -> ExtractionError {
    if e.is_timeout() {
        // Client-side timeouts only fire on connect; the watchdog covers the rest.
        ExtractionError::Timeout(Duration::from_secs(10))
    } else if e.is_connect() {
        ExtractionError::Network(format!("connection failed: {e}"))
    } else {
        ExtractionError::Network(e.to_string())
    }
}
