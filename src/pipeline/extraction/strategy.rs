//! Extraction strategies tried by the orchestrator, in order, within each attempt.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::assemble::assemble;
use super::proxy::{ProxyOptions, ServerProxyClient};
use super::sanitize::{recover_text, FALLBACK_MESSAGE};
use super::types::{PdfParser, RawDocumentBytes, StrategyOutput};
use super::ExtractionError;

#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        raw: &RawDocumentBytes,
        correlation_id: &Uuid,
    ) -> Result<StrategyOutput, ExtractionError>;
}

impl StrategyOutput {
    /// The cleaning pipeline gave up and produced the fixed fallback message.
    pub fn is_fallback(&self) -> bool {
        self.text == FALLBACK_MESSAGE
    }
}

/// Parse, assemble and recover text in one synchronous pass.
///
/// A document with no text at all fails with `NoTextFound`; garbled text
/// that no cleaning stage salvages yields the fallback message.
pub fn extract_local(
    parser: &dyn PdfParser,
    bytes: &[u8],
    max_pages: usize,
) -> Result<StrategyOutput, ExtractionError> {
    let parsed = parser.parse(bytes, max_pages)?;
    let assembled = assemble(&parsed.pages);

    if assembled.full_text.trim().is_empty() {
        return Err(ExtractionError::NoTextFound(format!(
            "{} page(s) parsed, none carried text",
            parsed.pages.len()
        )));
    }

    let recovered = recover_text(&assembled.full_text);
    tracing::debug!(
        pages = parsed.page_count,
        raw_len = assembled.full_text.len(),
        cleaned = recovered.cleaned,
        stage = recovered.stage.map(|s| s.as_str()).unwrap_or("none"),
        "Local extraction finished"
    );

    Ok(StrategyOutput {
        text: recovered.text,
        pages: Some(parsed.page_count),
        stage: recovered.stage,
    })
}

/// In-process parse with the configured PDF library.
pub struct LocalParseStrategy {
    parser: Arc<dyn PdfParser>,
    max_pages: usize,
}

impl LocalParseStrategy {
    pub fn new(parser: Arc<dyn PdfParser>, max_pages: usize) -> Self {
        Self { parser, max_pages }
    }
}

#[async_trait]
impl ExtractionStrategy for LocalParseStrategy {
    fn name(&self) -> &'static str {
        "local_parse"
    }

    async fn attempt(
        &self,
        raw: &RawDocumentBytes,
        _correlation_id: &Uuid,
    ) -> Result<StrategyOutput, ExtractionError> {
        let parser = self.parser.clone();
        let bytes = raw.bytes.clone();
        let max_pages = self.max_pages;

        // Parsing is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || extract_local(parser.as_ref(), &bytes, max_pages))
            .await
            .map_err(|e| ExtractionError::Parse(format!("parse task failed: {e}")))?
    }
}

/// Hands the document to the server-side fallback endpoint.
pub struct ServerProxyStrategy {
    client: ServerProxyClient,
    options: ProxyOptions,
}

impl ServerProxyStrategy {
    pub fn new(client: ServerProxyClient, options: ProxyOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl ExtractionStrategy for ServerProxyStrategy {
    fn name(&self) -> &'static str {
        "server_proxy"
    }

    async fn attempt(
        &self,
        raw: &RawDocumentBytes,
        correlation_id: &Uuid,
    ) -> Result<StrategyOutput, ExtractionError> {
        let result = self
            .client
            .extract(&raw.bytes, self.options.clone(), correlation_id)
            .await?;
        Ok(StrategyOutput {
            text: result.text,
            pages: result.pages,
            stage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::pdf::tests::make_test_pdf;
    use crate::pipeline::extraction::pdf::LopdfParser;
    use crate::pipeline::extraction::sanitize::CleaningStage;
    use crate::pipeline::extraction::types::{PageFragment, ParsedDocument};

    struct FixedParser(Vec<Vec<String>>);

    impl FixedParser {
        fn new(pages: &[&[&str]]) -> Self {
            Self(
                pages
                    .iter()
                    .map(|texts| texts.iter().map(|t| t.to_string()).collect())
                    .collect(),
            )
        }
    }

    impl PdfParser for FixedParser {
        fn parse(&self, _bytes: &[u8], max_pages: usize) -> Result<ParsedDocument, ExtractionError> {
            let pages = self
                .0
                .iter()
                .take(max_pages)
                .enumerate()
                .map(|(i, texts)| {
                    texts
                        .iter()
                        .enumerate()
                        .map(|(order, t)| PageFragment {
                            page_number: i + 1,
                            text: t.clone(),
                            order,
                        })
                        .collect()
                })
                .collect();
            Ok(ParsedDocument {
                page_count: self.0.len(),
                pages,
            })
        }
    }

    const PROSE: &str = "Quarterly revenue increased across every region while operating costs \
        stayed flat. The board approved the budget for the coming year and asked management \
        to report progress on hiring, product launches and customer retention at the next \
        meeting. Several members praised the finance team for closing the books early and \
        thanked the auditors for a smooth review.";

    #[test]
    fn garbled_first_page_with_clean_second_page_recovers_at_stage_one() {
        let garbled = "\u{0001}\u{0002}\u{FFFD}\u{0003}".repeat(40);
        let parser = FixedParser::new(&[&[garbled.as_str()], &[PROSE]]);

        let output = extract_local(&parser, b"%PDF", 10).unwrap();

        assert_eq!(output.stage, Some(CleaningStage::ControlStrip));
        assert!(output.text.contains("Quarterly revenue increased"));
        assert!(!output.text.contains('\u{FFFD}'));
        assert_eq!(output.pages, Some(2));
    }

    #[test]
    fn clean_document_skips_cleaning() {
        let parser = FixedParser::new(&[&[PROSE]]);
        let output = extract_local(&parser, b"%PDF", 10).unwrap();
        assert_eq!(output.stage, None);
        assert_eq!(output.text, PROSE);
        assert!(!output.is_fallback());
    }

    #[test]
    fn document_without_text_is_no_text_found() {
        let parser = FixedParser::new(&[&[], &["   "]]);
        let err = extract_local(&parser, b"%PDF", 10).unwrap_err();
        assert!(matches!(err, ExtractionError::NoTextFound(_)));
    }

    #[test]
    fn unsalvageable_text_yields_fallback_message() {
        let parser = FixedParser::new(&[&["§¶ ¤¤ ©®"]]);
        let output = extract_local(&parser, b"%PDF", 10).unwrap();
        assert!(output.is_fallback());
    }

    #[tokio::test]
    async fn local_strategy_parses_real_pdf() {
        let sentence = "Hello from a generated document with plain words on every line. ";
        let body = sentence.repeat(6);
        let bytes = make_test_pdf(&[body.as_str()]);
        let strategy = LocalParseStrategy::new(Arc::new(LopdfParser), 10);
        let raw = RawDocumentBytes::new("https://example.com/a.pdf", bytes);

        let output = strategy.attempt(&raw, &Uuid::new_v4()).await.unwrap();

        assert_eq!(output.pages, Some(1));
        assert!(output.text.contains("Hello from a generated document"));
    }

    #[tokio::test]
    async fn local_strategy_surfaces_parse_errors() {
        let strategy = LocalParseStrategy::new(Arc::new(LopdfParser), 10);
        let raw = RawDocumentBytes::new("https://example.com/a.pdf", b"not a pdf".to_vec());
        let err = strategy.attempt(&raw, &Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Parse(_)));
    }
}
