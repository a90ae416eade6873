use std::panic::{self, AssertUnwindSafe};

use lopdf::Document;

use super::types::{PageFragment, ParsedDocument, PdfParser};
use super::ExtractionError;

/// PDF parser adapter over `lopdf`. Pure Rust, runs in-process.
pub struct LopdfParser;

impl PdfParser for LopdfParser {
    fn parse(&self, bytes: &[u8], max_pages: usize) -> Result<ParsedDocument, ExtractionError> {
        let doc = load_document(bytes)?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let page_count = page_numbers.len();

        if page_count == 0 {
            return Err(ExtractionError::NoTextFound("document has no pages".into()));
        }

        if page_count > max_pages {
            tracing::debug!(
                page_count,
                max_pages,
                "Page cap reached, later pages are not visited"
            );
        }

        let pages = collect_pages(PageReader::new(&doc, page_numbers, max_pages))?;
        Ok(ParsedDocument { page_count, pages })
    }
}

fn load_document(bytes: &[u8]) -> Result<Document, ExtractionError> {
    // lopdf can panic on malformed cross-reference data rather than erroring.
    match panic::catch_unwind(AssertUnwindSafe(|| Document::load_mem(bytes))) {
        Ok(Ok(doc)) => Ok(doc),
        Ok(Err(e)) => Err(ExtractionError::Parse(e.to_string())),
        Err(_) => Err(ExtractionError::Parse(
            "PDF loader panicked (malformed document)".into(),
        )),
    }
}

/// Per-page read failure, tagged with the page it happened on.
#[derive(Debug)]
pub struct PageFault {
    pub page_number: u32,
    pub error: ExtractionError,
}

/// Lazily reads pages in page-number order, stopping at the cap.
/// Nothing is extracted for a page until the iterator reaches it.
pub struct PageReader<'a> {
    doc: &'a Document,
    remaining: std::iter::Take<std::vec::IntoIter<u32>>,
}

impl<'a> PageReader<'a> {
    pub fn new(doc: &'a Document, page_numbers: Vec<u32>, max_pages: usize) -> Self {
        Self {
            doc,
            remaining: page_numbers.into_iter().take(max_pages.max(1)),
        }
    }
}

impl Iterator for PageReader<'_> {
    type Item = Result<Vec<PageFragment>, PageFault>;

    fn next(&mut self) -> Option<Self::Item> {
        let page_number = self.remaining.next()?;
        Some(read_page(self.doc, page_number))
    }
}

fn read_page(doc: &Document, page_number: u32) -> Result<Vec<PageFragment>, PageFault> {
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| doc.extract_text(&[page_number])));
    let text = match extracted {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Err(PageFault {
                page_number,
                error: ExtractionError::Parse(e.to_string()),
            })
        }
        Err(_) => {
            return Err(PageFault {
                page_number,
                error: ExtractionError::Parse("page extraction panicked".into()),
            })
        }
    };

    Ok(split_fragments(page_number as usize, &text))
}

/// Each non-blank line the library emits becomes one fragment, in emission order.
pub fn split_fragments(page_number: usize, text: &str) -> Vec<PageFragment> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(order, line)| PageFragment {
            page_number,
            text: line.to_string(),
            order,
        })
        .collect()
}

/// Drain a page sequence, skipping faulty pages. Fails only when every
/// visited page faulted.
pub fn collect_pages<I>(pages: I) -> Result<Vec<Vec<PageFragment>>, ExtractionError>
where
    I: Iterator<Item = Result<Vec<PageFragment>, PageFault>>,
{
    let mut collected = Vec::new();
    let mut faults = 0usize;

    for page in pages {
        match page {
            Ok(fragments) => collected.push(fragments),
            Err(fault) => {
                faults += 1;
                tracing::warn!(
                    page = fault.page_number,
                    error = %fault.error,
                    "Skipping unreadable page"
                );
            }
        }
    }

    if collected.is_empty() {
        tracing::warn!(faulty_pages = faults, "Every visited page failed");
        return Err(ExtractionError::NoTextFound("no text found".into()));
    }

    Ok(collected)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Generate a valid PDF with one page per entry, each carrying one text run.
    pub(crate) fn make_test_pdf(pages: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Object, Stream};

        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();

        // Font dictionary
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for text in pages {
            // Page content stream: BT /F1 12 Tf (text) Tj ET
            let content = format!("BT /F1 12 Tf 72 700 Td ({text}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F1" => font_id,
                    },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        // Catalog
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn fragment(page: usize, text: &str, order: usize) -> PageFragment {
        PageFragment {
            page_number: page,
            text: text.to_string(),
            order,
        }
    }

    #[test]
    fn extract_text_from_digital_pdf() {
        let pdf_bytes = make_test_pdf(&["Hello World from the parser"]);
        let parsed = LopdfParser.parse(&pdf_bytes, 10).unwrap();

        assert_eq!(parsed.page_count, 1);
        let full_text: String = parsed.pages[0].iter().map(|f| f.text.clone()).collect();
        assert!(
            full_text.contains("Hello") || full_text.contains("World"),
            "Expected text to contain 'Hello' or 'World', got: {full_text}"
        );
    }

    #[test]
    fn fragments_are_one_indexed() {
        let pdf_bytes = make_test_pdf(&["First page text", "Second page text"]);
        let parsed = LopdfParser.parse(&pdf_bytes, 10).unwrap();

        assert_eq!(parsed.pages.len(), 2);
        assert!(parsed.pages[0].iter().all(|f| f.page_number == 1));
        assert!(parsed.pages[1].iter().all(|f| f.page_number == 2));
    }

    #[test]
    fn page_cap_limits_visited_pages_but_not_count() {
        let pdf_bytes = make_test_pdf(&["One", "Two", "Three", "Four"]);
        let parsed = LopdfParser.parse(&pdf_bytes, 2).unwrap();

        assert_eq!(parsed.page_count, 4, "page_count reflects the parser's own count");
        assert_eq!(parsed.pages.len(), 2, "only the first two pages are visited");
    }

    #[test]
    fn invalid_pdf_returns_parse_error() {
        let result = LopdfParser.parse(b"not a pdf", 10);
        assert!(matches!(result, Err(ExtractionError::Parse(_))));
    }

    #[test]
    fn split_fragments_keeps_emission_order() {
        let fragments = split_fragments(3, "zeta line\n\n  \nalpha line\nmiddle");
        assert_eq!(
            fragments,
            vec![
                fragment(3, "zeta line", 0),
                fragment(3, "alpha line", 1),
                fragment(3, "middle", 2),
            ]
        );
    }

    #[test]
    fn collect_pages_skips_faulty_page() {
        let pages: Vec<Result<Vec<PageFragment>, PageFault>> = vec![
            Err(PageFault {
                page_number: 1,
                error: ExtractionError::Parse("corrupt stream".into()),
            }),
            Ok(vec![fragment(2, "readable", 0)]),
        ];
        let collected = collect_pages(pages.into_iter()).unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0][0].text, "readable");
    }

    #[test]
    fn collect_pages_fails_when_all_pages_fault() {
        let pages: Vec<Result<Vec<PageFragment>, PageFault>> = vec![
            Err(PageFault {
                page_number: 1,
                error: ExtractionError::Parse("a".into()),
            }),
            Err(PageFault {
                page_number: 2,
                error: ExtractionError::Parse("b".into()),
            }),
        ];
        let err = collect_pages(pages.into_iter()).unwrap_err();
        assert!(matches!(err, ExtractionError::NoTextFound(ref m) if m == "no text found"));
    }

    #[test]
    fn empty_pages_are_not_faults() {
        let pages: Vec<Result<Vec<PageFragment>, PageFault>> =
            vec![Ok(vec![]), Ok(vec![fragment(2, "text", 0)])];
        let collected = collect_pages(pages.into_iter()).unwrap();
        assert_eq!(collected.len(), 2);
    }
}
