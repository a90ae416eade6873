//! Binary-content detection for extracted text.
//!
//! Four independent heuristics vote; text is considered binary when at
//! least two of them fire. Callers use this to decide whether the cleaning
//! pipeline needs to run at all.

use std::sync::LazyLock;

use regex::Regex;

/// Share of non-standard characters above which heuristic 1 fires.
const NON_STANDARD_RATIO: f64 = 0.20;

/// Share of spaces below which heuristic 2 fires.
const MIN_SPACE_RATIO: f64 = 0.05;

/// Heuristic 2 only applies to text longer than this.
const SPACE_CHECK_MIN_LEN: usize = 50;

/// Symbol clusters / hex literals needed for heuristics 3 and 4.
const MIN_PATTERN_HITS: usize = 3;

/// Votes needed to call text binary.
const MIN_VOTES: usize = 2;

static SYMBOL_CLUSTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]{4,}").unwrap());

static HEX_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\x[0-9a-fA-F]{2}|0x[0-9a-fA-F]{2,}|<[0-9a-fA-F]{8,}>").unwrap()
});

/// Which heuristics fired for a given text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinarySignals {
    pub non_standard_chars: bool,
    pub low_space_ratio: bool,
    pub symbol_clusters: bool,
    pub hex_literals: bool,
}

impl BinarySignals {
    pub fn votes(&self) -> usize {
        [
            self.non_standard_chars,
            self.low_space_ratio,
            self.symbol_clusters,
            self.hex_literals,
        ]
        .iter()
        .filter(|fired| **fired)
        .count()
    }
}

/// Evaluate every heuristic.
pub fn binary_signals(text: &str) -> BinarySignals {
    let total = text.chars().count();
    if total == 0 {
        return BinarySignals::default();
    }

    let non_standard = text.chars().filter(|c| !is_standard_char(*c)).count();
    let spaces = text.chars().filter(|c| *c == ' ').count();

    BinarySignals {
        non_standard_chars: non_standard as f64 / total as f64 > NON_STANDARD_RATIO,
        low_space_ratio: total > SPACE_CHECK_MIN_LEN
            && (spaces as f64 / total as f64) < MIN_SPACE_RATIO,
        symbol_clusters: SYMBOL_CLUSTER.find_iter(text).count() >= MIN_PATTERN_HITS,
        hex_literals: HEX_LITERAL.find_iter(text).count() >= MIN_PATTERN_HITS,
    }
}

/// Majority vote over the four heuristics.
pub fn is_binary_data(text: &str) -> bool {
    binary_signals(text).votes() >= MIN_VOTES
}

/// Letters, digits, whitespace and everyday punctuation.
fn is_standard_char(c: char) -> bool {
    c.is_alphanumeric()
        || c.is_whitespace()
        || matches!(
            c,
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' | '(' | ')' | '-' | '/'
        )
}
