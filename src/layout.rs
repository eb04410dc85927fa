//! Provides the immutable mapping between physical keys and the two layouts.
//!
//! The daemon never asks the display server which layout is active; instead it
//! carries its own table of the 33 printable keys shared by the QWERTY (US)
//! and ЙЦУКЕН (RU) layouts. Every printable key maps to a pair of characters:
//! the one produced in the primary layout and the one produced in the
//! secondary layout. A derived reverse map resolves characters back to the
//! key that produces them, which is what the injector needs to type arbitrary
//! strings.
use evdev::Key;
use std::collections::HashMap;

/// Index of one of the two configured layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Layout 0, producing the primary (Latin) characters.
    Primary,
    /// Layout 1, producing the secondary (Cyrillic) characters.
    Secondary,
}

impl Layout {
    /// Returns the other layout.
    pub fn other(self) -> Self {
        match self {
            Layout::Primary => Layout::Secondary,
            Layout::Secondary => Layout::Primary,
        }
    }
}

// Three QWERTY rows. Each entry is (key, primary char, secondary char).
static PRINTABLE_KEYS: [(Key, char, char); 33] = [
    // Top row
    (Key::KEY_Q, 'q', 'й'),
    (Key::KEY_W, 'w', 'ц'),
    (Key::KEY_E, 'e', 'у'),
    (Key::KEY_R, 'r', 'к'),
    (Key::KEY_T, 't', 'е'),
    (Key::KEY_Y, 'y', 'н'),
    (Key::KEY_U, 'u', 'г'),
    (Key::KEY_I, 'i', 'ш'),
    (Key::KEY_O, 'o', 'щ'),
    (Key::KEY_P, 'p', 'з'),
    (Key::KEY_LEFTBRACE, '[', 'х'),
    (Key::KEY_RIGHTBRACE, ']', 'ъ'),
    // Home row
    (Key::KEY_A, 'a', 'ф'),
    (Key::KEY_S, 's', 'ы'),
    (Key::KEY_D, 'd', 'в'),
    (Key::KEY_F, 'f', 'а'),
    (Key::KEY_G, 'g', 'п'),
    (Key::KEY_H, 'h', 'р'),
    (Key::KEY_J, 'j', 'о'),
    (Key::KEY_K, 'k', 'л'),
    (Key::KEY_L, 'l', 'д'),
    (Key::KEY_SEMICOLON, ';', 'ж'),
    (Key::KEY_APOSTROPHE, '\'', 'э'),
    // Bottom row
    (Key::KEY_Z, 'z', 'я'),
    (Key::KEY_X, 'x', 'ч'),
    (Key::KEY_C, 'c', 'с'),
    (Key::KEY_V, 'v', 'м'),
    (Key::KEY_B, 'b', 'и'),
    (Key::KEY_N, 'n', 'т'),
    (Key::KEY_M, 'm', 'ь'),
    (Key::KEY_COMMA, ',', 'б'),
    (Key::KEY_DOT, '.', 'ю'),
    (Key::KEY_SLASH, '/', '.'),
];

/// Immutable scancode/character table for the two layouts.
#[derive(Debug, Clone)]
pub struct LayoutTable {
    chars: HashMap<u16, (char, char)>,
    reverse: HashMap<char, u16>,
}

impl LayoutTable {
    pub fn new() -> Self {
        let mut chars = HashMap::with_capacity(PRINTABLE_KEYS.len());
        let mut reverse = HashMap::with_capacity(PRINTABLE_KEYS.len() * 2);
        for (key, primary, secondary) in PRINTABLE_KEYS {
            chars.insert(key.code(), (primary, secondary));
            reverse.insert(primary, key.code());
            reverse.insert(secondary, key.code());
        }
        Self { chars, reverse }
    }

    /// True if the scancode produces a printable character in both layouts.
    pub fn contains(&self, code: u16) -> bool {
        self.chars.contains_key(&code)
    }

    /// The (primary, secondary) character pair for a scancode.
    pub fn chars_for(&self, code: u16) -> Option<(char, char)> {
        self.chars.get(&code).copied()
    }

    /// Renders a scancode sequence as the string a given layout would produce.
    ///
    /// Scancodes outside the table are skipped; callers uphold the invariant
    /// that buffered scancodes are always present.
    pub fn render(&self, codes: &[u16], layout: Layout) -> String {
        codes
            .iter()
            .filter_map(|code| self.chars_for(*code))
            .map(|(primary, secondary)| match layout {
                Layout::Primary => primary,
                Layout::Secondary => secondary,
            })
            .collect()
    }

    /// Resolves a character to the key that produces it, via lowercase lookup.
    ///
    /// Returns `(scancode, needs_shift)`, where `needs_shift` is set when the
    /// original character was uppercase. `None` when no key in either layout
    /// produces the character.
    pub fn key_for_char(&self, ch: char) -> Option<(u16, bool)> {
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        let code = self.reverse.get(&lower)?;
        Some((*code, ch.is_uppercase()))
    }

    /// All (primary, secondary) character pairs, in key-table order.
    pub fn char_pairs(&self) -> impl Iterator<Item = (char, char)> {
        PRINTABLE_KEYS
            .iter()
            .map(|(_, primary, secondary)| (*primary, *secondary))
    }
}

impl Default for LayoutTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_should_cover_all_printable_keys() {
        let table = LayoutTable::new();
        assert_eq!(table.chars.len(), 33);
        for (key, _, _) in PRINTABLE_KEYS {
            assert!(table.contains(key.code()));
        }
    }

    #[test]
    fn chars_for_should_return_both_layout_characters() {
        let table = LayoutTable::new();
        assert_eq!(table.chars_for(Key::KEY_Q.code()), Some(('q', 'й')));
        assert_eq!(table.chars_for(Key::KEY_DOT.code()), Some(('.', 'ю')));
        assert_eq!(table.chars_for(Key::KEY_ESC.code()), None);
    }

    #[test]
    fn render_should_produce_layout_specific_strings() {
        let table = LayoutTable::new();
        let codes = [
            Key::KEY_G.code(),
            Key::KEY_H.code(),
            Key::KEY_B.code(),
            Key::KEY_D.code(),
            Key::KEY_T.code(),
            Key::KEY_N.code(),
        ];
        assert_eq!(table.render(&codes, Layout::Primary), "ghbdtn");
        assert_eq!(table.render(&codes, Layout::Secondary), "привет");
    }

    #[test]
    fn key_for_char_should_resolve_both_alphabets() {
        let table = LayoutTable::new();
        assert_eq!(table.key_for_char('q'), Some((Key::KEY_Q.code(), false)));
        assert_eq!(table.key_for_char('Q'), Some((Key::KEY_Q.code(), true)));
        assert_eq!(table.key_for_char('ф'), Some((Key::KEY_A.code(), false)));
        assert_eq!(table.key_for_char('Ф'), Some((Key::KEY_A.code(), true)));
        assert_eq!(table.key_for_char('7'), None);
    }

    #[test]
    fn layout_other_should_toggle() {
        assert_eq!(Layout::Primary.other(), Layout::Secondary);
        assert_eq!(Layout::Secondary.other().other(), Layout::Secondary);
    }
}
