use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sanitize::CleaningStage;
use super::ExtractionError;

/// Document bytes as fetched, tagged with where they came from.
#[derive(Debug, Clone)]
pub struct RawDocumentBytes {
    pub source: String,
    pub bytes: Arc<[u8]>,
}

impl RawDocumentBytes {
    pub fn new(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            bytes: Arc::from(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One run of text as emitted by the PDF library for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFragment {
    /// 1-indexed.
    pub page_number: usize,
    pub text: String,
    /// Emission order within the page, starting at 0.
    pub order: usize,
}

/// Parser output: the library's page count plus the fragments of every
/// page that was visited and read successfully.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub page_count: usize,
    pub pages: Vec<Vec<PageFragment>>,
}

/// Page texts concatenated into one blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledText {
    pub full_text: String,
    pub page_count: usize,
    pub per_page_lengths: Vec<usize>,
}

/// Readability judgement for a text blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityVerdict {
    pub readable: bool,
    pub word_count: usize,
    pub total_length: usize,
}

/// Outcome of a single strategy call inside an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { text: String },
    Failure { reason: String },
}

/// Audit trail entry. One per strategy call.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionAttempt {
    pub strategy_name: String,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl ExtractionAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }
}

/// Result of one cleaning stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleaningStageResult {
    pub stage: CleaningStage,
    pub output: String,
    pub accepted: bool,
}

/// What the caller hands in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mime_type: String,
}

impl DocumentDescriptor {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            mime_type: String::new(),
        }
    }

    /// Declared MIME type, or one guessed from the URL path when none was given.
    pub fn effective_mime(&self) -> String {
        if !self.mime_type.trim().is_empty() {
            return self.mime_type.trim().to_ascii_lowercase();
        }
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    pub fn looks_like_pdf(&self) -> bool {
        let mime = self.effective_mime();
        mime == "application/pdf" || mime == "application/octet-stream"
    }
}

/// What the caller gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub success: bool,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

impl ExtractionOutcome {
    pub fn succeeded(text: String, pages: Option<usize>) -> Self {
        Self {
            success: true,
            text,
            error: None,
            pages,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            text: String::new(),
            error: Some(error),
            pages: None,
        }
    }
}

/// Text produced by a strategy, before the orchestrator accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyOutput {
    pub text: String,
    pub pages: Option<usize>,
    /// Cleaning stage that produced the text, when cleaning ran locally.
    pub stage: Option<CleaningStage>,
}

/// Retrieves document bytes. Implementations perform no retries of their own.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    async fn fetch(
        &self,
        source_url: &str,
        hint: Option<&str>,
    ) -> Result<RawDocumentBytes, ExtractionError>;
}

/// PDF parsing abstraction (allows mocking for tests).
pub trait PdfParser: Send + Sync {
    /// Parse `bytes`, visiting at most `max_pages` pages.
    fn parse(&self, bytes: &[u8], max_pages: usize) -> Result<ParsedDocument, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guessed_from_url_path() {
        let doc = DocumentDescriptor::new("https://cdn.example.com/files/report.pdf?token=abc", "Report");
        assert_eq!(doc.effective_mime(), "application/pdf");
        assert!(doc.looks_like_pdf());
    }

    #[test]
    fn declared_mime_wins() {
        let mut doc = DocumentDescriptor::new("https://example.com/download", "Notes");
        doc.mime_type = "Text/Plain".into();
        assert_eq!(doc.effective_mime(), "text/plain");
        assert!(!doc.looks_like_pdf());
    }

    #[test]
    fn extensionless_url_is_treated_as_possible_pdf() {
        let doc = DocumentDescriptor::new("https://example.com/download/42", "");
        assert!(doc.looks_like_pdf());
    }

    #[test]
    fn outcome_serializes_without_empty_optionals() {
        let json = serde_json::to_string(&ExtractionOutcome::succeeded("hi".into(), None)).unwrap();
        assert_eq!(json, r#"{"success":true,"text":"hi"}"#);

        let json = serde_json::to_string(&ExtractionOutcome::failed("boom".into())).unwrap();
        assert!(json.contains(r#""error":"boom""#));
    }

    #[test]
    fn descriptor_uses_camel_case_wire_names() {
        let doc: DocumentDescriptor = serde_json::from_str(
            r#"{"url":"https://example.com/a.pdf","title":"A","mimeType":"application/pdf"}"#,
        )
        .unwrap();
        assert_eq!(doc.mime_type, "application/pdf");
    }

    #[test]
    fn raw_bytes_share_buffer_on_clone() {
        let raw = RawDocumentBytes::new("https://example.com/a.pdf", vec![1, 2, 3]);
        let copy = raw.clone();
        assert!(Arc::ptr_eq(&raw.bytes, &copy.bytes));
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn traits_are_object_safe() {
        fn _assert_fetcher(_: &dyn ByteFetcher) {}
        fn _assert_parser(_: &dyn PdfParser) {}
    }
}
