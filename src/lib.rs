//! # relayout - keyboard layout correction daemon
//!
//! A background service for Linux that watches physical keyboards through
//! evdev, detects words typed with the wrong layout active (Latin QWERTY vs
//! Cyrillic ЙЦУКЕН), and silently rewrites them through a uinput virtual
//! keyboard. Dedicated hotkeys additionally trigger word autoreplacement,
//! transliteration, case inversion and number-to-words conversion on the
//! current selection.
//!
//! The pipeline is three components wired together by [`service::Service`]:
//! the [`input_tap::InputTap`] aggregates key events from every physical
//! keyboard (excluding the daemon's own virtual device), the
//! [`analyzer::Analyzer`] turns the event stream into typed recommendations,
//! and the [`injector::Injector`] realizes them as synthetic keystrokes.

pub mod analyzer;
pub mod clipboard;
pub mod config;
pub mod converters;
pub mod detector;
pub mod injector;
pub mod input_tap;
pub mod layout;
pub mod service;
pub mod sound;
pub mod window;

pub use analyzer::{Analysis, Analyzer, Transform};
pub use config::{Config, ConfigManager};
pub use injector::{InjectionError, Injector, VIRTUAL_KEYBOARD_NAME};
pub use input_tap::{InputTap, KeyEvent};
pub use layout::{Layout, LayoutTable};
pub use service::Service;
