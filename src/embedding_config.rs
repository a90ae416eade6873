//! Embedding provider configuration.
//!
//! Settings arrive as untyped JSON (typically a stored settings row).
//! [`parse_embedding_config`] is the only way in: it turns that value into an
//! [`EmbeddingConfig`] and reports problems as errors or warnings instead of
//! failing on the first one.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ConfigError;
use crate::logging::mask_secret;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const MAX_BATCH_SIZE: usize = 2048;
/// Batches above this are accepted but usually hit provider rate limits.
pub const LARGE_BATCH_WARNING: usize = 512;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
/// Thresholds outside this band are legal but rarely useful.
pub const TYPICAL_THRESHOLD_RANGE: (f64, f64) = (0.5, 0.95);

const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAi,
    Cohere,
    HuggingFace,
    Ollama,
    Custom,
}

impl EmbeddingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Cohere => "cohere",
            Self::HuggingFace => "huggingface",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        }
    }

    /// Model used when the config names none. Custom endpoints have no default.
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("text-embedding-3-small"),
            Self::Cohere => Some("embed-english-v3.0"),
            Self::HuggingFace => Some("sentence-transformers/all-MiniLM-L6-v2"),
            Self::Ollama => Some("nomic-embed-text"),
            Self::Custom => None,
        }
    }

    /// Local Ollama runs without credentials.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "cohere" => Ok(Self::Cohere),
            "huggingface" | "hugging_face" | "hf" => Ok(Self::HuggingFace),
            "ollama" => Ok(Self::Ollama),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown embedding provider '{other}'")),
        }
    }
}

impl fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub batch_size: usize,
    pub similarity_threshold: f64,
}

// Manual impl so the API key never reaches the logs.
impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("endpoint", &self.endpoint)
            .field("batch_size", &self.batch_size)
            .field("similarity_threshold", &self.similarity_threshold)
            .finish()
    }
}

/// Parse result: a config only when there are no errors.
#[derive(Debug, Clone, Default)]
pub struct ConfigValidation {
    pub config: Option<EmbeddingConfig>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Read a JSON settings file and validate it.
///
/// Only an unreadable file or malformed JSON is an `Err`; everything the
/// file says is reported through the returned [`ConfigValidation`].
pub fn load_embedding_config(path: &Path) -> Result<ConfigValidation, ConfigError> {
    let file_error = |reason: String| ConfigError::File {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| file_error(e.to_string()))?;
    Ok(parse_embedding_config(&value))
}

/// Validate untyped settings into an [`EmbeddingConfig`]. Never panics.
///
/// Keys are accepted in camelCase or snake_case (`apiKey` / `api_key`).
pub fn parse_embedding_config(input: &Value) -> ConfigValidation {
    let mut result = ConfigValidation::default();

    let Some(fields) = input.as_object() else {
        result
            .errors
            .push("embedding config must be a JSON object".to_string());
        return result;
    };

    let provider = match string_field(fields, &["provider"]) {
        Field::Present(raw) => match raw.parse::<EmbeddingProvider>() {
            Ok(provider) => Some(provider),
            Err(e) => {
                result.errors.push(e);
                None
            }
        },
        Field::Missing => {
            result.errors.push("provider is required".to_string());
            None
        }
        Field::WrongType => {
            result.errors.push("provider must be a string".to_string());
            None
        }
    };

    let model = match string_field(fields, &["model"]) {
        Field::Present(model) => Some(model),
        Field::Missing => match provider.and_then(|p| p.default_model().map(|m| (p, m))) {
            Some((provider, model)) => {
                result.warnings.push(format!(
                    "model not set, using {provider} default '{model}'"
                ));
                Some(model.to_string())
            }
            None => {
                if provider.is_some() {
                    result
                        .errors
                        .push("model is required for custom providers".to_string());
                }
                None
            }
        },
        Field::WrongType => {
            result.errors.push("model must be a string".to_string());
            None
        }
    };

    let api_key = match string_field(fields, &["apiKey", "api_key"]) {
        Field::Present(key) => Some(key),
        Field::Missing => {
            if provider.is_some_and(|p| p.requires_api_key()) {
                result.errors.push(format!(
                    "apiKey is required for provider {}",
                    provider.map(|p| p.as_str()).unwrap_or_default()
                ));
            }
            None
        }
        Field::WrongType => {
            result.errors.push("apiKey must be a string".to_string());
            None
        }
    };
    if api_key.is_some() && provider == Some(EmbeddingProvider::Ollama) {
        result
            .warnings
            .push("apiKey is ignored for provider ollama".to_string());
    }

    let endpoint = match string_field(fields, &["endpoint", "baseUrl", "base_url"]) {
        Field::Present(endpoint) => {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                result
                    .errors
                    .push(format!("endpoint '{endpoint}' must be an http(s) URL"));
            }
            Some(endpoint)
        }
        Field::Missing => match provider {
            Some(EmbeddingProvider::Custom) => {
                result
                    .errors
                    .push("endpoint is required for custom providers".to_string());
                None
            }
            Some(EmbeddingProvider::Ollama) => Some(DEFAULT_OLLAMA_ENDPOINT.to_string()),
            _ => None,
        },
        Field::WrongType => {
            result.errors.push("endpoint must be a string".to_string());
            None
        }
    };

    let batch_size = match lookup(fields, &["batchSize", "batch_size"]) {
        None => DEFAULT_BATCH_SIZE,
        Some(value) => match value.as_u64() {
            Some(n) if (1..=MAX_BATCH_SIZE as u64).contains(&n) => {
                let n = n as usize;
                if n > LARGE_BATCH_WARNING {
                    result.warnings.push(format!(
                        "batchSize {n} is above {LARGE_BATCH_WARNING} and may hit provider rate limits"
                    ));
                }
                n
            }
            _ => {
                result.errors.push(format!(
                    "batchSize must be an integer between 1 and {MAX_BATCH_SIZE}, got {value}"
                ));
                DEFAULT_BATCH_SIZE
            }
        },
    };

    let similarity_threshold = match lookup(fields, &["similarityThreshold", "similarity_threshold"]) {
        None => DEFAULT_SIMILARITY_THRESHOLD,
        Some(value) => match value.as_f64() {
            Some(t) if (0.0..=1.0).contains(&t) => {
                let (low, high) = TYPICAL_THRESHOLD_RANGE;
                if !(low..=high).contains(&t) {
                    result.warnings.push(format!(
                        "similarityThreshold {t} is outside the typical range {low}-{high}"
                    ));
                }
                t
            }
            _ => {
                result.errors.push(format!(
                    "similarityThreshold must be a number between 0.0 and 1.0, got {value}"
                ));
                DEFAULT_SIMILARITY_THRESHOLD
            }
        },
    };

    if !result.errors.is_empty() {
        tracing::debug!(errors = result.errors.len(), "Embedding config rejected");
        return result;
    }

    if let (Some(provider), Some(model)) = (provider, model) {
        result.config = Some(EmbeddingConfig {
            provider,
            model,
            api_key,
            endpoint,
            batch_size,
            similarity_threshold,
        });
    }
    result
}

enum Field {
    Present(String),
    Missing,
    WrongType,
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find(|v| !v.is_null())
}

/// Trimmed, non-empty string field. Blank strings count as missing.
fn string_field(fields: &Map<String, Value>, keys: &[&str]) -> Field {
    match lookup(fields, keys) {
        None => Field::Missing,
        Some(Value::String(s)) if s.trim().is_empty() => Field::Missing,
        Some(Value::String(s)) => Field::Present(s.trim().to_string()),
        Some(_) => Field::WrongType,
    }
}
