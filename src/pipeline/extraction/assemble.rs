use super::types::{AssembledText, PageFragment};

/// Separator placed between page texts.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Concatenate per-page fragments into one text blob.
///
/// Fragments of a page are joined with a single space in emission order and
/// the result trimmed. Pages that end up empty are left out of `full_text`
/// but still counted. No normalization happens here: control characters and
/// other noise pass through untouched.
pub fn assemble(pages: &[Vec<PageFragment>]) -> AssembledText {
    let mut page_texts: Vec<String> = Vec::with_capacity(pages.len());
    let mut per_page_lengths = Vec::with_capacity(pages.len());

    for fragments in pages {
        let joined = fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = joined.trim();
        per_page_lengths.push(trimmed.chars().count());
        if !trimmed.is_empty() {
            page_texts.push(trimmed.to_string());
        }
    }

    AssembledText {
        full_text: page_texts.join(PAGE_SEPARATOR),
        page_count: pages.len(),
        per_page_lengths,
    }
}
