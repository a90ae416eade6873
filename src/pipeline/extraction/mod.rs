pub mod types;
pub mod fetch;
pub mod pdf;
pub mod assemble;
pub mod quality;
pub mod binary;
pub mod sanitize;
pub mod proxy;
pub mod retry;
pub mod strategy;
pub mod orchestrator;

pub use types::*;
pub use fetch::*;
pub use pdf::*;
pub use assemble::*;
pub use quality::*;
pub use binary::*;
pub use sanitize::*;
pub use proxy::*;
pub use retry::*;
pub use strategy::*;
pub use orchestrator::*;

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Processing timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("PDF parsing failed: {0}")]
    Parse(String),

    #[error("No text found: {0}")]
    NoTextFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document URL: {0}")]
    InvalidUrl(String),

    #[error("Extraction service error: {0}")]
    Server(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Whether another attempt could plausibly succeed.
    /// A malformed URL fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExtractionError::InvalidUrl(_))
    }

    /// Short machine-friendly reason recorded in the attempt audit trail.
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractionError::Network(_) => "network error",
            ExtractionError::Timeout(_) => "processing timed out",
            ExtractionError::Parse(_) => "parse error",
            ExtractionError::NoTextFound(_) => "no text found",
            ExtractionError::Auth(_) => "authentication error",
            ExtractionError::NotFound(_) => "document not found",
            ExtractionError::InvalidUrl(_) => "invalid url",
            ExtractionError::Server(_) => "server error",
            ExtractionError::Io(_) => "i/o error",
        }
    }

    /// Message shown to end users once retries are exhausted. Never carries
    /// internal detail beyond the cause category.
    pub fn user_message(&self) -> String {
        match self {
            ExtractionError::Network(_) => {
                "Could not reach the document server. Check your connection and try again.".into()
            }
            ExtractionError::Timeout(limit) => format!(
                "Processing timed out after {} seconds. The document may be too large; try again later.",
                limit.as_secs()
            ),
            ExtractionError::Auth(_) => {
                "Your session is not authorized to process this document. Please sign in again.".into()
            }
            ExtractionError::NotFound(_) => {
                "The document could not be found or is empty.".into()
            }
            ExtractionError::InvalidUrl(_) => "The document link is not a valid URL.".into(),
            ExtractionError::Parse(_) => {
                "The file could not be read as a PDF. It may be damaged or password protected.".into()
            }
            ExtractionError::NoTextFound(_) => {
                "No readable text was found in this document. It may be a scanned image.".into()
            }
            ExtractionError::Server(_) | ExtractionError::Io(_) => {
                "Text extraction failed. Please try again.".into()
            }
        }
    }
}
