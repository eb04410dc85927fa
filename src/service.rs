//! Wires the input tap, analyzer and injector into the running daemon.
//!
//! The service owns every component plus the two pieces of process-wide
//! state: the configuration snapshot and the shadow layout index. All
//! mutation happens on this single event loop, so no locking is needed
//! anywhere downstream. Signals and the config watcher feed the same loop
//! through channels: SIGHUP and directory changes reload the snapshot,
//! SIGINT/SIGTERM break the loop, which stops the tap and drops the virtual
//! keyboard on the way out.
use crate::analyzer::{Analysis, Analyzer, Transform};
use crate::clipboard::Clipboard;
use crate::config::{Config, ConfigManager};
use crate::converters;
use crate::injector::{InjectionError, Injector, VIRTUAL_KEYBOARD_NAME};
use crate::input_tap::{InputTap, KeyEvent};
use crate::layout::{Layout, LayoutTable};
use crate::sound::SoundPlayer;
use crate::window::WindowDetector;
use anyhow::{Context, Result};
use evdev::Key;
use futures::stream::StreamExt;
use log::{debug, error, info, warn};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const WINDOW_POLL_INTERVAL: Duration = Duration::from_secs(1);

// Delays around the clipboard round-trip: the focused application needs time
// to service the copy, and the clipboard tool needs time to take ownership
// before we paste.
const COPY_SETTLE: Duration = Duration::from_millis(300);
const PASTE_SETTLE: Duration = Duration::from_millis(100);

/// Long-lived daemon state and event loop.
pub struct Service {
    config_manager: ConfigManager,
    config: Arc<Config>,
    table: LayoutTable,
    analyzer: Analyzer,
    injector: Injector,
    input_tap: InputTap,
    clipboard: Clipboard,
    window_detector: WindowDetector,
    sound: SoundPlayer,
    current_layout: Layout,
}

impl Service {
    pub fn new() -> Result<Self> {
        Self::with_manager(ConfigManager::new()?)
    }

    pub fn with_config_dir(config_dir: PathBuf) -> Result<Self> {
        Self::with_manager(ConfigManager::with_dir(config_dir))
    }

    fn with_manager(config_manager: ConfigManager) -> Result<Self> {
        let config = Arc::new(
            config_manager
                .load()
                .context("Failed to load configuration.")?,
        );
        let table = LayoutTable::new();
        let injector =
            Injector::new(table.clone()).context("Virtual keyboard initialization failed.")?;
        let analyzer = build_analyzer(&table, &config);
        let sound = SoundPlayer::new(config.sound_enabled);

        Ok(Self {
            config_manager,
            config,
            analyzer,
            injector,
            input_tap: InputTap::new(VIRTUAL_KEYBOARD_NAME),
            clipboard: Clipboard::new(),
            window_detector: WindowDetector::new(),
            sound,
            table,
            // Not synchronized with the host at startup; a wrong guess
            // corrects itself after one rewritten word.
            current_layout: Layout::Primary,
        })
    }

    /// Runs until SIGINT or SIGTERM arrives.
    pub async fn run(&mut self) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<KeyEvent>(256);
        let (reload_tx, mut reload_rx) = mpsc::channel::<()>(4);

        let _watcher = match self.config_manager.start_watcher(reload_tx) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Config watcher unavailable: {:#}", e);
                None
            }
        };

        let mut signals =
            Signals::new([SIGHUP, SIGINT, SIGTERM]).context("Failed to register signal handlers.")?;
        let signals_handle = signals.handle();

        self.input_tap.start(event_tx);

        let mut window_tick = tokio::time::interval(WINDOW_POLL_INTERVAL);
        window_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("Service started.");

        loop {
            tokio::select! {
                Some(event) = event_rx.recv() => self.on_input_event(event).await,
                Some(()) = reload_rx.recv() => self.reload_config(),
                Some(signal) = signals.next() => match signal {
                    SIGHUP => self.reload_config(),
                    SIGINT | SIGTERM => {
                        info!("Received signal {}, shutting down daemon...", signal);
                        break;
                    }
                    _ => {}
                },
                _ = window_tick.tick() => self.check_active_window().await,
            }
        }

        self.input_tap.stop();
        signals_handle.close();
        info!("Service shutdown complete.");
        Ok(())
    }

    async fn on_input_event(&mut self, event: KeyEvent) {
        match self.analyzer.process_key(event.code, event.value) {
            Analysis::None => {}
            Analysis::LayoutChanged => {
                self.current_layout = self.current_layout.other();
                info!("Layout changed manually. New state: {:?}", self.current_layout);
            }
            Analysis::SwitchLayout {
                target,
                payload,
                confidence,
            } => {
                if !self.config.auto_switch_enabled {
                    debug!("Auto-switch disabled; ignoring wrong-layout detection.");
                } else if target != self.current_layout {
                    info!(
                        "Auto-switching layout to {:?} (confidence {:.2}).",
                        target, confidence
                    );
                    self.rewrite_word(&payload);
                } else {
                    debug!("Skipping switch, already in layout {:?}.", self.current_layout);
                }
            }
            Analysis::ReplaceText {
                payload,
                replacement,
            } => {
                info!("Auto-replacing word -> {}", replacement);
                if let Err(e) = self.replace_word(payload.len(), &replacement) {
                    error!("Replacement abandoned: {}", e);
                    self.analyzer.reset();
                }
            }
            Analysis::Manual {
                transform,
                payload: Some(codes),
            } => {
                if transform == Transform::SwitchLayout {
                    self.rewrite_word(&codes);
                } else {
                    warn!("Advanced word modification not implemented, try selecting text.");
                }
            }
            Analysis::Manual {
                transform,
                payload: None,
            } => self.correct_selection(transform).await,
        }
    }

    /// Erases the buffered word, sends the host switch chord, retypes the
    /// same scancodes and flips the shadow layout. The last physical key is
    /// already on screen, so the word length equals the erase count.
    fn rewrite_word(&mut self, codes: &[u16]) {
        if let Err(e) = self.try_rewrite_word(codes) {
            error!("Word rewrite abandoned: {}", e);
        }
        self.analyzer.reset();
    }

    fn try_rewrite_word(&mut self, codes: &[u16]) -> Result<(), InjectionError> {
        self.injector.backspace(codes.len())?;
        self.injector.switch_layout_chord(&self.config.switch_chord)?;
        self.injector.type_sequence(codes)?;
        self.current_layout = self.current_layout.other();
        self.sound.play("switch");
        Ok(())
    }

    /// Erases the word plus the boundary key that triggered the match, then
    /// types the replacement.
    fn replace_word(&mut self, word_len: usize, replacement: &str) -> Result<(), InjectionError> {
        self.injector.backspace(word_len + 1)?;
        self.injector.type_string(replacement)
    }

    /// Clipboard-mediated transform of the user's selected text.
    async fn correct_selection(&mut self, transform: Transform) {
        info!("Correction of selection requested: {:?}", transform);

        let ctrl = [Key::KEY_LEFTCTRL.code()];
        if let Err(e) = self.injector.send_combo(&ctrl, Key::KEY_C.code()) {
            error!("Copy combo abandoned: {}", e);
            self.analyzer.reset();
            return;
        }
        tokio::time::sleep(COPY_SETTLE).await;

        let Some(text) = self.clipboard.get_text().await else {
            warn!("Clipboard empty or access failed.");
            return;
        };

        let new_text = match transform {
            Transform::SwitchLayout => converters::switch_layout(&text, &self.table),
            Transform::Transliterate => converters::transliterate(&text),
            Transform::InvertCase => converters::invert_case(&text),
            Transform::NumberToWords => {
                converters::number_to_words(&text).unwrap_or_else(|| text.clone())
            }
        };

        if new_text == text {
            info!("Selection transform produced no change.");
            return;
        }

        if !self.clipboard.set_text(&new_text).await {
            return;
        }
        tokio::time::sleep(PASTE_SETTLE).await;

        if let Err(e) = self.injector.send_combo(&ctrl, Key::KEY_V.code()) {
            error!("Paste combo abandoned: {}", e);
            self.analyzer.reset();
        }
    }

    /// Pauses the analyzer while an excluded window has focus.
    async fn check_active_window(&mut self) {
        let Some(info) = self.window_detector.get_active_window_info().await else {
            return;
        };

        let exceptions = &self.config.exceptions;
        let excluded = exceptions
            .window_titles
            .iter()
            .any(|t| !t.is_empty() && info.title.contains(t))
            || exceptions
                .processes
                .iter()
                .any(|p| !p.is_empty() && info.class.contains(p));

        self.analyzer.set_paused(excluded);
    }

    /// Swaps in a fresh snapshot and rebuilds the analyzer. On failure the
    /// existing snapshot stays in effect.
    fn reload_config(&mut self) {
        info!("Reloading configuration...");
        match self.config_manager.load() {
            Ok(config) => {
                self.config = Arc::new(config);
                self.sound.set_enabled(self.config.sound_enabled);
                // Rebuilding discards the word buffer; acceptable on reload.
                self.analyzer = build_analyzer(&self.table, &self.config);
                info!("Configuration reloaded successfully.");
            }
            Err(e) => error!("Failed to reload config: {:#}", e),
        }
    }
}

fn build_analyzer(table: &LayoutTable, config: &Config) -> Analyzer {
    Analyzer::new(
        table.clone(),
        config.switch_chord.clone(),
        config.autocorrect.clone(),
        config.autoreplace.clone(),
    )
}
