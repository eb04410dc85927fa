//! Lightweight structural scorer that guesses which layout a word was meant
//! for.
//!
//! The heuristic looks at consonant clustering only: a rendering with an
//! impossibly long consonant run, or a long rendering with no vowels at all,
//! is penalized; anything else gets a small positive score. A switch verdict
//! is produced only when exactly one rendering scores positive and the other
//! negative, so ambiguous words ("net"/"туе") never trigger a rewrite.
use crate::layout::Layout;

const EN_VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];
const RU_VOWELS: &[char] = &['а', 'е', 'ё', 'и', 'о', 'у', 'ы', 'э', 'ю', 'я'];

// Longest plausible consonant run per language ("strength" -> 5, "взгляд" -> 4).
const EN_CONSONANT_LIMIT: usize = 5;
const RU_CONSONANT_LIMIT: usize = 4;

/// Scores both layout renderings of a word and picks the intended layout.
#[derive(Debug, Default, Clone)]
pub struct LanguageDetector;

impl LanguageDetector {
    pub fn new() -> Self {
        Self
    }

    /// Returns the layout the user most likely intended, or `None` when
    /// neither rendering is clearly better.
    ///
    /// `primary_text` and `secondary_text` are the same scancodes rendered
    /// through layout 0 and layout 1 respectively.
    pub fn analyze(&self, primary_text: &str, secondary_text: &str) -> Option<Layout> {
        let score_primary = score_structure(primary_text, Layout::Primary);
        let score_secondary = score_structure(secondary_text, Layout::Secondary);

        if score_primary > 0 && score_secondary < 0 {
            return Some(Layout::Primary);
        }
        if score_secondary > 0 && score_primary < 0 {
            return Some(Layout::Secondary);
        }
        None
    }
}

/// Positive for likely valid text, negative for likely gibberish.
fn score_structure(text: &str, layout: Layout) -> i32 {
    if text.is_empty() {
        return 0;
    }

    let (vowels, limit) = match layout {
        Layout::Primary => (EN_VOWELS, EN_CONSONANT_LIMIT),
        Layout::Secondary => (RU_VOWELS, RU_CONSONANT_LIMIT),
    };

    let mut run = 0usize;
    let mut max_run = 0usize;
    let mut has_vowel = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        if !ch.is_alphabetic() {
            continue;
        }
        if vowels.contains(&ch) {
            has_vowel = true;
            run = 0;
        } else {
            run += 1;
            max_run = max_run.max(run);
        }
    }

    if max_run > limit {
        return -10;
    }
    if text.chars().count() > 4 && !has_vowel {
        return -5;
    }
    5
}
