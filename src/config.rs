use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::logging::mask_secret;

/// Application-level constants
pub const APP_NAME: &str = "pdf-salvage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the per-request correlation id between client and server.
pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Prefix shared by every environment variable the crate reads.
pub const ENV_PREFIX: &str = "PDF_SALVAGE_";

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> String {
    "pdf_salvage=info,tower_http=warn".to_string()
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("Cannot load {path}: {reason}")]
    File { path: String, reason: String },
}

/// Client-side extraction settings.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Pages beyond this cap are never visited.
    pub max_pages: usize,
    /// Total attempts per document, including the first.
    pub max_attempts: u32,
    /// First backoff delay; doubles after every failed attempt.
    pub backoff_base: Duration,
    /// Watchdog applied to every network or parse call.
    pub call_timeout: Duration,
    /// Full URL of the server-side fallback endpoint. Fallback is disabled when unset.
    pub proxy_endpoint: Option<String>,
    /// Fetch documents through this proxy (`{proxy}?url=...`) instead of the origin.
    pub fetch_proxy: Option<String>,
    /// Session token attached to fetch and fallback calls.
    pub auth_token: Option<String>,
    /// Upper bound on downloaded document size.
    pub max_document_bytes: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            max_attempts: 3,
            backoff_base: Duration::from_millis(1000),
            call_timeout: Duration::from_secs(45),
            proxy_endpoint: None,
            fetch_proxy: None,
            auth_token: None,
            max_document_bytes: 50 * 1024 * 1024,
        }
    }
}

// Manual impl so the session token never reaches the logs.
impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_pages", &self.max_pages)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .field("call_timeout", &self.call_timeout)
            .field("proxy_endpoint", &self.proxy_endpoint)
            .field("fetch_proxy", &self.fetch_proxy)
            .field("auth_token", &self.auth_token.as_deref().map(mask_secret))
            .field("max_document_bytes", &self.max_document_bytes)
            .finish()
    }
}

impl ExtractionConfig {
    /// Read settings from `PDF_SALVAGE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        Ok(Self {
            max_pages: env.parse_positive("MAX_PAGES")?.unwrap_or(defaults.max_pages),
            max_attempts: env
                .parse_positive::<u32>("MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
            backoff_base: env
                .parse_positive::<u64>("BACKOFF_BASE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_base),
            call_timeout: env
                .parse_positive::<u64>("CALL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_timeout),
            proxy_endpoint: env.string("PROXY_ENDPOINT"),
            fetch_proxy: env.string("FETCH_PROXY"),
            auth_token: env.string("AUTH_TOKEN"),
            max_document_bytes: env
                .parse_positive("MAX_DOCUMENT_BYTES")?
                .unwrap_or(defaults.max_document_bytes),
        })
    }
}

/// Settings for the server-side fallback endpoint.
#[derive(Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Hard cap on `maxPages` requested by clients.
    pub max_pages_limit: usize,
    /// Pages processed when the client does not ask for a cap.
    pub default_max_pages: usize,
    /// Longest a single extraction may run, whatever the client asks for.
    pub watchdog: Duration,
    /// Bearer token required on `/api` routes (health excluded).
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            max_pages_limit: 50,
            default_max_pages: 10,
            watchdog: Duration::from_secs(45),
            auth_token: None,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("max_pages_limit", &self.max_pages_limit)
            .field("default_max_pages", &self.default_max_pages)
            .field("watchdog", &self.watchdog)
            .field("auth_token", &self.auth_token.as_deref().map(mask_secret))
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        let bind = match env.string("BIND") {
            Some(raw) => raw.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: env_key("BIND"),
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => defaults.bind,
        };

        Ok(Self {
            bind,
            max_pages_limit: env
                .parse_positive("SERVER_MAX_PAGES")?
                .unwrap_or(defaults.max_pages_limit),
            default_max_pages: env
                .parse_positive("MAX_PAGES")?
                .unwrap_or(defaults.default_max_pages),
            watchdog: env
                .parse_positive::<u64>("CALL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.watchdog),
            auth_token: env.string("AUTH_TOKEN"),
        })
    }
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty, trimmed string value.
    fn string(&self, suffix: &str) -> Option<String> {
        (self.lookup)(&env_key(suffix))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Strictly positive number; zero and garbage are rejected.
    fn parse_positive<T>(&self, suffix: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.string(suffix) else {
            return Ok(None);
        };
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: env_key(suffix),
            value: raw.clone(),
            reason,
        };
        let value: T = raw.parse().map_err(|e: T::Err| invalid(e.to_string()))?;
        if value <= T::default() {
            return Err(invalid("must be greater than zero".into()));
        }
        Ok(Some(value))
    }
}
