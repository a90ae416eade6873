//! Client for the server-side fallback extraction endpoint.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fetch::map_request_error;
use super::ExtractionError;
use crate::config::{ExtractionConfig, CORRELATION_HEADER};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyExtractRequest {
    pub pdf_base64: String,
    #[serde(default)]
    pub options: ProxyOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOptions {
    /// Milliseconds the server may spend on the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyExtractResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

/// Text returned by the fallback endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyText {
    pub text: String,
    pub pages: Option<usize>,
}

pub struct ServerProxyClient {
    endpoint: String,
    client: reqwest::Client,
    auth_token: Option<String>,
}

impl ServerProxyClient {
    pub fn new(endpoint: impl Into<String>, auth_token: Option<String>) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("pdf-salvage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExtractionError::Network(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
            auth_token,
        })
    }

    /// `None` when no fallback endpoint is configured.
    pub fn from_config(config: &ExtractionConfig) -> Result<Option<Self>, ExtractionError> {
        config
            .proxy_endpoint
            .as_ref()
            .map(|endpoint| Self::new(endpoint.clone(), config.auth_token.clone()))
            .transpose()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn extract(
        &self,
        bytes: &[u8],
        options: ProxyOptions,
        correlation_id: &Uuid,
    ) -> Result<ProxyText, ExtractionError> {
        let server_timeout = options.timeout.map(Duration::from_millis);
        let body = ProxyExtractRequest {
            pdf_base64: BASE64.encode(bytes),
            options,
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CORRELATION_HEADER, correlation_id.to_string())
            .json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(
            correlation_id = %correlation_id,
            endpoint = %self.endpoint,
            size = bytes.len(),
            "Calling fallback extraction endpoint"
        );

        let response = request.send().await.map_err(map_request_error)?;
        let status = response.status();
        // Error bodies are best effort; a proxy in between may answer with HTML.
        let payload = response.json::<ProxyExtractResponse>().await.ok();

        interpret_response(status, payload, server_timeout)
    }
}

/// Map status and body to text or an error.
pub fn interpret_response(
    status: StatusCode,
    payload: Option<ProxyExtractResponse>,
    server_timeout: Option<Duration>,
) -> Result<ProxyText, ExtractionError> {
    let server_error = payload.as_ref().and_then(|p| p.error.clone());

    if !status.is_success() {
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExtractionError::Auth(
                server_error.unwrap_or_else(|| format!("fallback endpoint answered {status}")),
            ),
            StatusCode::GATEWAY_TIMEOUT => {
                ExtractionError::Timeout(server_timeout.unwrap_or(Duration::from_secs(45)))
            }
            _ => match server_error {
                Some(message) => ExtractionError::Server(message),
                None => ExtractionError::Network(format!("fallback endpoint answered {status}")),
            },
        });
    }

    let payload = payload.ok_or_else(|| {
        ExtractionError::Server("fallback endpoint returned an unreadable body".into())
    })?;
    if let Some(message) = payload.error {
        return Err(ExtractionError::Server(message));
    }

    match payload.text {
        Some(text) if !text.trim().is_empty() => Ok(ProxyText {
            text,
            pages: payload.pages,
        }),
        _ => Err(ExtractionError::NoTextFound(
            "fallback endpoint returned no text".into(),
        )),
    }
}
