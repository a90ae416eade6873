//! Logger setup and runtime level control.
//!
//! The subscriber is installed once at process start by [`init`]. The
//! returned [`LogControl`] is the only handle to the active level: callers
//! pass it around (the API keeps it in its state) instead of touching
//! process-wide statics.

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::config;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Unknown log level: {0}")]
    UnknownLevel(String),

    #[error("Failed to install log subscriber: {0}")]
    Init(String),

    #[error("Failed to reload log filter: {0}")]
    Reload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Filter directive applied when this level is selected at runtime.
    /// Dependencies stay at `warn` unless tracing is requested.
    pub fn directive(&self) -> String {
        match self {
            Self::Trace => "trace".to_string(),
            level => format!("warn,pdf_salvage={}", level.as_str()),
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Error,
            1 => Self::Warn,
            3 => Self::Debug,
            4 => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(LogError::UnknownLevel(other.to_string())),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit logger handle with a `set_level` / `level` contract.
pub struct LogControl {
    level: AtomicU8,
    handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogControl {
    /// A control that tracks the level without a live subscriber behind it.
    /// Used when logging is owned by someone else (tests, embedding hosts).
    pub fn detached(level: LogLevel) -> Self {
        Self {
            level: AtomicU8::new(level as u8),
            handle: None,
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: LogLevel) -> Result<(), LogError> {
        if let Some(handle) = &self.handle {
            handle
                .reload(EnvFilter::new(level.directive()))
                .map_err(|e| LogError::Reload(e.to_string()))?;
        }
        let previous = LogLevel::from_u8(self.level.swap(level as u8, Ordering::Relaxed));
        tracing::info!(from = %previous, to = %level, "Log level changed");
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init(level: LogLevel) -> Result<LogControl, LogError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if level == LogLevel::Info {
            EnvFilter::new(config::default_log_filter())
        } else {
            EnvFilter::new(level.directive())
        }
    });
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| LogError::Init(e.to_string()))?;

    Ok(LogControl {
        level: AtomicU8::new(level as u8),
        handle: Some(handle),
    })
}

/// Mask a credential for logging: keep a short prefix and the last four
/// characters, hide the rest. Short values are hidden entirely.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}****{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" warning ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn detached_control_tracks_level() {
        let control = LogControl::detached(LogLevel::Info);
        assert_eq!(control.level(), LogLevel::Info);

        control.set_level(LogLevel::Debug).unwrap();
        assert_eq!(control.level(), LogLevel::Debug);

        control.set_level(LogLevel::Error).unwrap();
        assert_eq!(control.level(), LogLevel::Error);
    }

    #[test]
    fn directive_keeps_dependencies_quiet() {
        assert_eq!(LogLevel::Debug.directive(), "warn,pdf_salvage=debug");
        assert_eq!(LogLevel::Trace.directive(), "trace");
    }

    #[test]
    fn level_serializes_lowercase() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
        let level: LogLevel = serde_json::from_str("\"trace\"").unwrap();
        assert_eq!(level, LogLevel::Trace);
    }

    #[test]
    fn mask_secret_hides_middle() {
        assert_eq!(mask_secret("sk-abcdefghijklmnop"), "sk-****mnop");
    }

    #[test]
    fn mask_secret_hides_short_values_entirely() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("12345678"), "****");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn mask_secret_is_char_boundary_safe() {
        let masked = mask_secret("clé-secrète-très-longue");
        assert!(masked.starts_with("clé"));
        assert!(masked.ends_with("ngue"));
    }
}
