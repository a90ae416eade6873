use super::types::QualityVerdict;

/// Readability thresholds. Empirically tuned; keep them in sync with the
/// cleaning stage thresholds when changing either.
pub mod thresholds {
    /// Fewer word-like tokens than this: too short to trust.
    pub const MIN_WORDS: usize = 10;

    /// At least one word-like token per this many characters.
    pub const CHARS_PER_WORD: usize = 50;

    /// Consecutive letters needed for a token to count as a word.
    pub const MIN_LETTER_RUN: usize = 3;
}

/// Score a text blob for readability.
///
/// `readable` requires at least [`thresholds::MIN_WORDS`] word-like tokens
/// and at least one of them per [`thresholds::CHARS_PER_WORD`] characters,
/// which rejects both short fragments and long, mostly-noise blobs.
pub fn classify(text: &str) -> QualityVerdict {
    let word_count = text.split_whitespace().filter(|t| is_word_like(t)).count();
    let total_length = text.chars().count();

    // word_count >= total_length / 50, kept in integers.
    let dense_enough = word_count * thresholds::CHARS_PER_WORD >= total_length;

    QualityVerdict {
        readable: word_count >= thresholds::MIN_WORDS && dense_enough,
        word_count,
        total_length,
    }
}

/// Token contains a run of at least three ASCII letters.
pub fn is_word_like(token: &str) -> bool {
    let mut run = 0usize;
    for c in token.chars() {
        if c.is_ascii_alphabetic() {
            run += 1;
            if run >= thresholds::MIN_LETTER_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_unreadable() {
        assert_eq!(
            classify(""),
            QualityVerdict {
                readable: false,
                word_count: 0,
                total_length: 0,
            }
        );
    }

    #[test]
    fn quick_brown_fox_sentence_is_readable() {
        // Every token has three or more letters, so all twelve count.
        let verdict = classify("the quick brown fox jumps over the lazy dog and runs fast");
        assert_eq!(verdict.word_count, 12);
        assert_eq!(verdict.total_length, 57);
        assert!(verdict.readable);
    }

    #[test]
    fn too_few_words_is_unreadable() {
        let verdict = classify("only nine words here in this short little line");
        assert_eq!(verdict.word_count, 8, "'in' is too short to count");
        assert!(!verdict.readable);
    }

    #[test]
    fn sparse_words_in_long_noise_are_unreadable() {
        let noise = "#@!%^&*".repeat(100);
        let text = format!("{noise} one two three four five six seven eight nine ten eleven");
        let verdict = classify(&text);
        assert!(verdict.word_count >= 10);
        assert!(!verdict.readable, "11 words over ~760 chars is below 1 per 50");
    }

    #[test]
    fn short_tokens_are_not_words() {
        assert!(!is_word_like("an"));
        assert!(!is_word_like("a1b2c3"));
        assert!(is_word_like("x-abc"));
        assert!(is_word_like("(the)"));
    }

    #[test]
    fn non_ascii_letters_do_not_count() {
        // Accented runs are still counted when at least three ASCII letters are adjacent.
        assert!(!is_word_like("été"));
        assert!(is_word_like("résumé-ready"));
    }

    #[test]
    fn classify_is_deterministic() {
        let text = "some text that repeats for the classifier to judge consistently";
        assert_eq!(classify(text), classify(text));
    }
}
