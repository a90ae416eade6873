//! Staged text recovery for garbled PDF extraction.
//!
//! Stages run from least to most destructive. Each stage transforms the raw
//! input and is accepted when its output clears that stage's threshold; the
//! first accepted stage ends the run. Every stage is total: a panic inside a
//! transform short-circuits to the fixed fallback message.

use std::panic;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::binary::is_binary_data;
use super::quality::classify;
use super::types::CleaningStageResult;

/// Returned when no stage salvages enough text.
pub const FALLBACK_MESSAGE: &str = "Text could not be extracted from this document. \
The PDF may be scanned, image-based or use an unsupported encoding.";

/// Stage acceptance thresholds, in characters. Empirically tuned.
pub mod stage_thresholds {
    pub const CONTROL_STRIP: usize = 300;
    pub const CHARSET_RESTRICT: usize = 200;
    pub const WORD_EXTRACT: usize = 200;
    pub const PAGE_PATTERN: usize = 200;
    pub const ULTRA_STRIP: usize = 100;
}

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{3}\s*Page\s+(\d+)\s*-{3}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    ControlStrip,
    CharsetRestrict,
    WordExtract,
    PagePattern,
    UltraStrip,
}

impl CleaningStage {
    /// Execution order.
    pub const ALL: [CleaningStage; 5] = [
        CleaningStage::ControlStrip,
        CleaningStage::CharsetRestrict,
        CleaningStage::WordExtract,
        CleaningStage::PagePattern,
        CleaningStage::UltraStrip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ControlStrip => "control_strip",
            Self::CharsetRestrict => "charset_restrict",
            Self::WordExtract => "word_extract",
            Self::PagePattern => "page_pattern",
            Self::UltraStrip => "ultra_strip",
        }
    }

    /// Output must be strictly longer than this to be accepted.
    pub fn min_length(&self) -> usize {
        match self {
            Self::ControlStrip => stage_thresholds::CONTROL_STRIP,
            Self::CharsetRestrict => stage_thresholds::CHARSET_RESTRICT,
            Self::WordExtract => stage_thresholds::WORD_EXTRACT,
            Self::PagePattern => stage_thresholds::PAGE_PATTERN,
            Self::UltraStrip => stage_thresholds::ULTRA_STRIP,
        }
    }

    /// Whether the classifier must also call the output readable.
    pub fn requires_readable(&self) -> bool {
        matches!(self, Self::ControlStrip | Self::CharsetRestrict)
    }

    pub fn transform(&self, raw: &str) -> String {
        match self {
            Self::ControlStrip => strip_control_chars(raw),
            Self::CharsetRestrict => restrict_charset(raw),
            Self::WordExtract => extract_words(raw),
            Self::PagePattern => extract_page_segments(raw),
            Self::UltraStrip => ultra_strip(raw),
        }
    }

    pub fn accepts(&self, output: &str) -> bool {
        let long_enough = output.chars().count() > self.min_length();
        if !long_enough {
            return false;
        }
        !self.requires_readable() || classify(output).readable
    }
}

impl std::fmt::Display for CleaningStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every stage that ran, plus the text finally returned.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningTrace {
    pub stages: Vec<CleaningStageResult>,
    pub text: String,
    /// Stage whose output was returned; `None` means the fallback message.
    pub accepted: Option<CleaningStage>,
}

/// Clean `raw` and return the first accepted stage's output. Never fails.
pub fn clean(raw: &str) -> String {
    clean_with_trace(raw).text
}

/// Same as [`clean`], keeping the per-stage results for inspection.
pub fn clean_with_trace(raw: &str) -> CleaningTrace {
    let mut stages = Vec::new();

    for stage in CleaningStage::ALL {
        let output = match panic::catch_unwind(|| stage.transform(raw)) {
            Ok(output) => output,
            Err(_) => {
                tracing::error!(stage = %stage, "Cleaning stage panicked, using fallback");
                return CleaningTrace {
                    stages,
                    text: FALLBACK_MESSAGE.to_string(),
                    accepted: None,
                };
            }
        };

        let accepted = stage.accepts(&output);
        tracing::debug!(
            stage = %stage,
            output_len = output.len(),
            accepted,
            "Cleaning stage evaluated"
        );
        stages.push(CleaningStageResult {
            stage,
            output: output.clone(),
            accepted,
        });

        if accepted {
            return CleaningTrace {
                stages,
                text: output,
                accepted: Some(stage),
            };
        }
    }

    tracing::info!(input_len = raw.len(), "No cleaning stage accepted, using fallback");
    CleaningTrace {
        stages,
        text: FALLBACK_MESSAGE.to_string(),
        accepted: None,
    }
}

/// Text ready for the caller, plus the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredText {
    pub text: String,
    /// `None` when the raw text was already clean and cleaning was skipped,
    /// or when the fallback message was returned.
    pub stage: Option<CleaningStage>,
    pub cleaned: bool,
}

/// Decide whether cleaning is needed, and run it if so.
///
/// Readable text with no binary signals and no control or replacement
/// characters is returned trimmed without going through the pipeline.
pub fn recover_text(raw: &str) -> RecoveredText {
    let has_noise = raw.chars().any(is_noise_char);
    if !has_noise && !is_binary_data(raw) && classify(raw).readable {
        return RecoveredText {
            text: raw.trim().to_string(),
            stage: None,
            cleaned: false,
        };
    }

    let trace = clean_with_trace(raw);
    RecoveredText {
        text: trace.text,
        stage: trace.accepted,
        cleaned: true,
    }
}

fn is_noise_char(c: char) -> bool {
    (c.is_control() && !matches!(c, '\n' | '\r' | '\t')) || c == char::REPLACEMENT_CHARACTER
}

// ── Stage 1 ──────────────────────────────────────────────

/// Drop control characters (line breaks and tabs survive) and U+FFFD.
/// Idempotent.
pub fn strip_control_chars(raw: &str) -> String {
    raw.chars().filter(|c| !is_noise_char(*c)).collect()
}

// ── Stage 2 ──────────────────────────────────────────────

/// Keep printable ASCII, Latin-1 letters and common typographic
/// punctuation; everything else becomes a space. Whitespace is collapsed.
pub fn restrict_charset(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| if is_allowed_charset(c) { c } else { ' ' })
        .collect();
    collapse_whitespace(&mapped)
}

fn is_allowed_charset(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{00C0}'..='\u{00FF}')
        || matches!(
            c,
            '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' | '\u{2013}' | '\u{2014}' | '\u{2026}'
        )
}

// ── Stage 3 ──────────────────────────────────────────────

/// Keep whitespace-delimited tokens of two or more characters holding at
/// least two letters. Control and replacement characters are dropped first
/// so they never survive inside a kept token.
pub fn extract_words(raw: &str) -> String {
    strip_control_chars(raw)
        .split_whitespace()
        .filter(|token| {
            token.chars().count() >= 2 && token.chars().filter(|c| c.is_alphabetic()).count() >= 2
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Stage 4 ──────────────────────────────────────────────

/// Split on repeated `--- Page N ---` markers and clean each segment on its
/// own. Yields an empty string when fewer than two markers are present.
pub fn extract_page_segments(raw: &str) -> String {
    let markers: Vec<_> = PAGE_MARKER.captures_iter(raw).collect();
    if markers.len() < 2 {
        return String::new();
    }

    let mut sections = Vec::with_capacity(markers.len() + 1);

    let preamble_end = markers[0].get(0).map(|m| m.start()).unwrap_or(0);
    let preamble = clean_segment(&raw[..preamble_end]);
    if !preamble.is_empty() {
        sections.push(preamble);
    }

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let segment_end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(raw.len());
        let segment = clean_segment(&raw[whole.end()..segment_end]);
        if !segment.is_empty() {
            sections.push(format!("--- Page {} ---\n{segment}", number.as_str()));
        }
    }

    sections.join("\n\n")
}

fn clean_segment(segment: &str) -> String {
    extract_words(&restrict_charset(segment))
}

// ── Stage 5 ──────────────────────────────────────────────

/// Keep ASCII letters, digits and a short punctuation allow-list.
pub fn ultra_strip(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric()
                || matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' | '(' | ')' | '-')
            {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&mapped)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
