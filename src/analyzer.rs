//! Converts the raw key stream into typed recommendations.
//!
//! The analyzer is the only stateful piece of the pipeline: it keeps the
//! scancodes of the word being typed, the set of currently held modifiers,
//! and the paused flag driven by window exclusions. Every key event produces
//! exactly one [`Analysis`], and all policy about word boundaries, hotkeys
//! and wrong-layout detection lives here. The analyzer never touches the
//! virtual keyboard; realizing a recommendation is the service's job.
use crate::detector::LanguageDetector;
use crate::layout::{Layout, LayoutTable};
use evdev::Key;
use log::info;
use std::collections::{HashMap, HashSet};

/// Pure text transform selected by a manual hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Rewrite in the other layout, regardless of the detector's opinion.
    SwitchLayout,
    /// Cyrillic to Latin transliteration.
    Transliterate,
    /// Swap the case of every character.
    InvertCase,
    /// Spell out a number in words.
    NumberToWords,
}

/// Recommendation produced for a single key event.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// No user-visible effect.
    None,
    /// The buffered word was typed in the wrong layout; rewrite it.
    SwitchLayout {
        target: Layout,
        payload: Vec<u16>,
        confidence: f32,
    },
    /// The user pressed the host's layout-switch chord themselves.
    LayoutChanged,
    /// A manual hotkey fired. `payload` carries the buffered word, or `None`
    /// when the buffer was empty and the transform targets the selection.
    Manual {
        transform: Transform,
        payload: Option<Vec<u16>>,
    },
    /// An autoreplace/autocorrect entry matched on a word boundary.
    ReplaceText {
        payload: Vec<u16>,
        replacement: String,
    },
}

/// Per-word state machine over the physical key stream.
pub struct Analyzer {
    table: LayoutTable,
    detector: LanguageDetector,
    buffer: Vec<u16>,
    held_modifiers: HashSet<u16>,
    switch_chord: Vec<u16>,
    autocorrect: HashMap<String, String>,
    autoreplace: HashMap<String, String>,
    paused: bool,
}

impl Analyzer {
    pub fn new(
        table: LayoutTable,
        switch_chord: Vec<u16>,
        autocorrect: HashMap<String, String>,
        autoreplace: HashMap<String, String>,
    ) -> Self {
        Self {
            table,
            detector: LanguageDetector::new(),
            buffer: Vec::new(),
            held_modifiers: HashSet::new(),
            switch_chord,
            autocorrect,
            autoreplace,
            paused: false,
        }
    }

    /// Pauses or resumes processing. Pausing clears the word buffer so a
    /// half-typed word never survives an excluded window.
    pub fn set_paused(&mut self, value: bool) {
        if value && !self.paused {
            info!("Analyzer paused by exclusion rule.");
            self.reset();
        } else if !value && self.paused {
            info!("Analyzer resumed.");
        }
        self.paused = value;
    }

    /// Drops the in-progress word. Called after the service realizes a
    /// rewrite, so the buffer never diverges from the on-screen text.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Ingests one key event and returns the recommended action.
    ///
    /// `value` is the kernel event value: 0 for up, 1 for down, 2 for repeat.
    pub fn process_key(&mut self, code: u16, value: i32) -> Analysis {
        if self.paused {
            return Analysis::None;
        }

        let key = Key::new(code);

        if is_modifier(key) {
            match value {
                1 => {
                    self.held_modifiers.insert(code);
                }
                0 => {
                    self.held_modifiers.remove(&code);
                }
                _ => {}
            }
            return Analysis::None;
        }

        // State changes are driven by key-down and key-repeat only.
        if value == 0 {
            return Analysis::None;
        }

        // An empty chord disables manual switch detection entirely.
        if let Some((&trigger, required)) = self.switch_chord.split_last() {
            if code == trigger && required.iter().all(|m| self.held_modifiers.contains(m)) {
                self.reset();
                return Analysis::LayoutChanged;
            }
        }

        if key == Key::KEY_PAUSE {
            let transform = self.hotkey_transform();
            let payload = if self.buffer.is_empty() {
                None
            } else {
                Some(self.buffer.clone())
            };
            return Analysis::Manual { transform, payload };
        }

        if key == Key::KEY_BACKSPACE {
            self.buffer.pop();
            return Analysis::None;
        }

        if is_word_boundary(key) {
            let result = self.check_replacements();
            self.reset();
            return result.unwrap_or(Analysis::None);
        }

        if !self.table.contains(code) {
            self.reset();
            return Analysis::None;
        }

        self.buffer.push(code);
        self.analyze_buffer()
    }

    /// Maps the held modifiers to the transform bound to the PAUSE hotkey.
    fn hotkey_transform(&self) -> Transform {
        let ctrl = self.held_modifiers.contains(&Key::KEY_LEFTCTRL.code());
        let shift = self.held_modifiers.contains(&Key::KEY_LEFTSHIFT.code());
        let alt = self.held_modifiers.contains(&Key::KEY_LEFTALT.code());

        if ctrl && shift {
            Transform::Transliterate
        } else if ctrl {
            Transform::InvertCase
        } else if alt {
            Transform::NumberToWords
        } else if shift {
            Transform::InvertCase
        } else {
            Transform::SwitchLayout
        }
    }

    /// Looks the buffered word up in the replacement tables, trying both
    /// layout renderings. Autoreplace entries win over autocorrect entries.
    fn check_replacements(&self) -> Option<Analysis> {
        if self.buffer.is_empty() {
            return None;
        }

        let primary = self.table.render(&self.buffer, Layout::Primary);
        let secondary = self.table.render(&self.buffer, Layout::Secondary);

        let replacement = self
            .autoreplace
            .get(&primary)
            .or_else(|| self.autoreplace.get(&secondary))
            .or_else(|| self.autocorrect.get(&primary))
            .or_else(|| self.autocorrect.get(&secondary))?;

        Some(Analysis::ReplaceText {
            payload: self.buffer.clone(),
            replacement: replacement.clone(),
        })
    }

    /// Runs the layout scorer once the word is long enough to judge.
    fn analyze_buffer(&self) -> Analysis {
        if self.buffer.len() < 3 {
            return Analysis::None;
        }

        let primary = self.table.render(&self.buffer, Layout::Primary);
        let secondary = self.table.render(&self.buffer, Layout::Secondary);

        match self.detector.analyze(&primary, &secondary) {
            Some(target) => Analysis::SwitchLayout {
                target,
                payload: self.buffer.clone(),
                confidence: 0.8,
            },
            None => Analysis::None,
        }
    }
}

/// Modifier keys never enter the word buffer.
fn is_modifier(key: Key) -> bool {
    matches!(
        key,
        Key::KEY_LEFTSHIFT
            | Key::KEY_RIGHTSHIFT
            | Key::KEY_LEFTCTRL
            | Key::KEY_RIGHTCTRL
            | Key::KEY_LEFTALT
            | Key::KEY_RIGHTALT
            | Key::KEY_LEFTMETA
            | Key::KEY_RIGHTMETA
    )
}

/// Keys that terminate the word in progress.
fn is_word_boundary(key: Key) -> bool {
    matches!(
        key,
        Key::KEY_SPACE | Key::KEY_ENTER | Key::KEY_TAB | Key::KEY_COMMA | Key::KEY_DOT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWN: i32 = 1;
    const UP: i32 = 0;

    fn analyzer() -> Analyzer {
        Analyzer::new(
            LayoutTable::new(),
            vec![Key::KEY_LEFTMETA.code(), Key::KEY_SPACE.code()],
            HashMap::new(),
            HashMap::new(),
        )
    }

    fn analyzer_with_replacements(
        autocorrect: &[(&str, &str)],
        autoreplace: &[(&str, &str)],
    ) -> Analyzer {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>()
        };
        Analyzer::new(
            LayoutTable::new(),
            vec![Key::KEY_LEFTMETA.code(), Key::KEY_SPACE.code()],
            to_map(autocorrect),
            to_map(autoreplace),
        )
    }

    fn type_word(analyzer: &mut Analyzer, keys: &[Key]) -> Vec<Analysis> {
        keys.iter()
            .map(|key| {
                let result = analyzer.process_key(key.code(), DOWN);
                analyzer.process_key(key.code(), UP);
                result
            })
            .collect()
    }

    #[test]
    fn process_key_should_detect_wrong_layout_gibberish() {
        // "ghbdtn" is "привет" typed with the Latin layout active. The
        // verdict lands as soon as the primary rendering turns gibberish:
        // "ghbdt" is five letters without a vowel while "приве" stays valid.
        let mut analyzer = analyzer();
        let prefix = [Key::KEY_G, Key::KEY_H, Key::KEY_B, Key::KEY_D];
        for result in type_word(&mut analyzer, &prefix) {
            assert_eq!(result, Analysis::None);
        }

        let result = analyzer.process_key(Key::KEY_T.code(), DOWN);
        let expected_payload: Vec<u16> = prefix
            .iter()
            .chain([Key::KEY_T].iter())
            .map(|k| k.code())
            .collect();
        assert_eq!(
            result,
            Analysis::SwitchLayout {
                target: Layout::Secondary,
                payload: expected_payload,
                confidence: 0.8,
            }
        );

        // The service resets the buffer once it realizes the rewrite; the
        // next key then starts a fresh word.
        analyzer.reset();
        assert_eq!(analyzer.process_key(Key::KEY_N.code(), DOWN), Analysis::None);
        assert_eq!(analyzer.buffer, vec![Key::KEY_N.code()]);
    }

    #[test]
    fn process_key_should_not_switch_on_valid_text() {
        let mut analyzer = analyzer();
        let keys = [
            Key::KEY_H,
            Key::KEY_E,
            Key::KEY_L,
            Key::KEY_L,
            Key::KEY_O,
        ];
        for result in type_word(&mut analyzer, &keys) {
            assert_eq!(result, Analysis::None);
        }

        // The boundary clears the buffer and recommends nothing.
        assert_eq!(
            analyzer.process_key(Key::KEY_SPACE.code(), DOWN),
            Analysis::None
        );
        assert!(analyzer.buffer.is_empty());
    }

    #[test]
    fn process_key_should_never_switch_on_short_buffers() {
        let mut analyzer = analyzer();
        assert_eq!(analyzer.process_key(Key::KEY_G.code(), DOWN), Analysis::None);
        assert_eq!(analyzer.process_key(Key::KEY_H.code(), DOWN), Analysis::None);
    }

    #[test]
    fn process_key_should_ignore_key_up_events() {
        let mut analyzer = analyzer();
        assert_eq!(analyzer.process_key(Key::KEY_G.code(), UP), Analysis::None);
        assert!(analyzer.buffer.is_empty());
    }

    #[test]
    fn modifiers_should_not_enter_the_buffer() {
        let mut analyzer = analyzer();
        analyzer.process_key(Key::KEY_LEFTSHIFT.code(), DOWN);
        analyzer.process_key(Key::KEY_LEFTSHIFT.code(), UP);
        assert!(analyzer.buffer.is_empty());
    }

    #[test]
    fn backspace_should_pop_one_scancode() {
        let mut analyzer = analyzer();
        analyzer.process_key(Key::KEY_G.code(), DOWN);
        analyzer.process_key(Key::KEY_H.code(), DOWN);
        analyzer.process_key(Key::KEY_BACKSPACE.code(), DOWN);
        assert_eq!(analyzer.buffer, vec![Key::KEY_G.code()]);
    }

    #[test]
    fn backspace_on_empty_buffer_should_be_a_noop() {
        let mut analyzer = analyzer();
        assert_eq!(
            analyzer.process_key(Key::KEY_BACKSPACE.code(), DOWN),
            Analysis::None
        );
        assert!(analyzer.buffer.is_empty());
    }

    #[test]
    fn switch_chord_should_emit_layout_changed_and_clear_buffer() {
        let mut analyzer = analyzer();
        analyzer.process_key(Key::KEY_G.code(), DOWN);
        analyzer.process_key(Key::KEY_LEFTMETA.code(), DOWN);
        let result = analyzer.process_key(Key::KEY_SPACE.code(), DOWN);
        assert_eq!(result, Analysis::LayoutChanged);
        assert!(analyzer.buffer.is_empty());
    }

    #[test]
    fn space_without_chord_modifier_should_be_a_word_boundary() {
        let mut analyzer = analyzer();
        analyzer.process_key(Key::KEY_G.code(), DOWN);
        assert_eq!(
            analyzer.process_key(Key::KEY_SPACE.code(), DOWN),
            Analysis::None
        );
        assert!(analyzer.buffer.is_empty());
    }

    #[test]
    fn empty_switch_chord_should_disable_manual_detection() {
        let mut analyzer = Analyzer::new(
            LayoutTable::new(),
            Vec::new(),
            HashMap::new(),
            HashMap::new(),
        );
        analyzer.process_key(Key::KEY_LEFTMETA.code(), DOWN);
        assert_eq!(
            analyzer.process_key(Key::KEY_SPACE.code(), DOWN),
            Analysis::None
        );
    }

    #[test]
    fn autoreplace_should_fire_on_word_boundary() {
        let mut analyzer = analyzer_with_replacements(&[], &[("omw", "on my way")]);
        let keys = [Key::KEY_O, Key::KEY_M, Key::KEY_W];
        type_word(&mut analyzer, &keys);

        let result = analyzer.process_key(Key::KEY_SPACE.code(), DOWN);
        assert_eq!(
            result,
            Analysis::ReplaceText {
                payload: keys.iter().map(|k| k.code()).collect(),
                replacement: "on my way".to_string(),
            }
        );
        assert!(analyzer.buffer.is_empty());
    }

    #[test]
    fn autoreplace_should_win_over_autocorrect() {
        let mut analyzer =
            analyzer_with_replacements(&[("omw", "corrected")], &[("omw", "replaced")]);
        type_word(&mut analyzer, &[Key::KEY_O, Key::KEY_M, Key::KEY_W]);

        match analyzer.process_key(Key::KEY_SPACE.code(), DOWN) {
            Analysis::ReplaceText { replacement, .. } => assert_eq!(replacement, "replaced"),
            other => panic!("expected ReplaceText, got {:?}", other),
        }
    }

    #[test]
    fn replacements_should_match_the_secondary_rendering() {
        // Typing J, H scancodes renders "ор" in the secondary layout.
        let mut analyzer = analyzer_with_replacements(&[("ор", "орёл")], &[]);
        type_word(&mut analyzer, &[Key::KEY_J, Key::KEY_H]);

        match analyzer.process_key(Key::KEY_SPACE.code(), DOWN) {
            Analysis::ReplaceText { replacement, .. } => assert_eq!(replacement, "орёл"),
            other => panic!("expected ReplaceText, got {:?}", other),
        }
    }

    #[test]
    fn hotkey_should_select_transform_by_modifiers() {
        let mut analyzer = analyzer();
        let cases = [
            (vec![Key::KEY_LEFTCTRL, Key::KEY_LEFTSHIFT], Transform::Transliterate),
            (vec![Key::KEY_LEFTCTRL], Transform::InvertCase),
            (vec![Key::KEY_LEFTALT], Transform::NumberToWords),
            (vec![Key::KEY_LEFTSHIFT], Transform::InvertCase),
            (vec![], Transform::SwitchLayout),
        ];

        for (modifiers, expected) in cases {
            for m in &modifiers {
                analyzer.process_key(m.code(), DOWN);
            }
            let result = analyzer.process_key(Key::KEY_PAUSE.code(), DOWN);
            assert_eq!(
                result,
                Analysis::Manual {
                    transform: expected,
                    payload: None,
                }
            );
            for m in &modifiers {
                analyzer.process_key(m.code(), UP);
            }
        }
    }

    #[test]
    fn hotkey_should_attach_the_buffer_as_payload() {
        let mut analyzer = analyzer();
        type_word(&mut analyzer, &[Key::KEY_G, Key::KEY_H]);
        let result = analyzer.process_key(Key::KEY_PAUSE.code(), DOWN);
        assert_eq!(
            result,
            Analysis::Manual {
                transform: Transform::SwitchLayout,
                payload: Some(vec![Key::KEY_G.code(), Key::KEY_H.code()]),
            }
        );
    }

    #[test]
    fn unknown_scancodes_should_clear_the_buffer() {
        let mut analyzer = analyzer();
        type_word(&mut analyzer, &[Key::KEY_G, Key::KEY_H]);
        assert_eq!(analyzer.process_key(Key::KEY_1.code(), DOWN), Analysis::None);
        assert!(analyzer.buffer.is_empty());
    }

    #[test]
    fn set_paused_should_silence_processing_and_clear_buffer() {
        let mut analyzer = analyzer();
        type_word(&mut analyzer, &[Key::KEY_G, Key::KEY_H]);
        analyzer.set_paused(true);
        assert!(analyzer.buffer.is_empty());

        let keys = [
            Key::KEY_G,
            Key::KEY_H,
            Key::KEY_B,
            Key::KEY_D,
            Key::KEY_T,
            Key::KEY_N,
        ];
        for result in type_word(&mut analyzer, &keys) {
            assert_eq!(result, Analysis::None);
        }
        assert!(analyzer.buffer.is_empty());

        analyzer.set_paused(false);
        assert_eq!(analyzer.process_key(Key::KEY_G.code(), DOWN), Analysis::None);
        assert_eq!(analyzer.buffer, vec![Key::KEY_G.code()]);
    }

    #[test]
    fn buffered_scancodes_should_all_come_from_the_layout_table() {
        let table = LayoutTable::new();
        let mut analyzer = analyzer();
        for code in [
            Key::KEY_G.code(),
            Key::KEY_ESC.code(),
            Key::KEY_H.code(),
            Key::KEY_F1.code(),
            Key::KEY_B.code(),
        ] {
            analyzer.process_key(code, DOWN);
            assert!(analyzer.buffer.iter().all(|c| table.contains(*c)));
        }
    }
}
