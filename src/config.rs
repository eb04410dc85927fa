//! Loading, saving and live reloading of the configuration snapshot.
//!
//! The snapshot is split across four JSON files in the user's config
//! directory: the base settings, the autocorrect and autoreplace tables, and
//! the exclusion lists. Defaults are written on first run. A `notify`
//! watcher on the directory feeds the same reload path as SIGHUP; either way
//! the service swaps in a whole new snapshot and rebuilds the analyzer, so
//! readers never observe a half-updated configuration.
use anyhow::{bail, Context, Result};
use evdev::Key;
use log::{error, info};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const CONFIG_FILE: &str = "config.json";
const AUTOCORRECT_FILE: &str = "autocorrect.json";
const AUTOREPLACE_FILE: &str = "autoreplace.json";
const EXCEPTIONS_FILE: &str = "exceptions.json";

const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// Window-title and process substrings that pause the analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exceptions {
    pub processes: Vec<String>,
    pub window_titles: Vec<String>,
}

/// Immutable configuration snapshot consumed by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub auto_switch_enabled: bool,
    pub sound_enabled: bool,
    /// Ordered scancodes of the host's layout-switch chord. Empty disables
    /// manual switch detection.
    pub switch_chord: Vec<u16>,
    pub autocorrect: HashMap<String, String>,
    pub autoreplace: HashMap<String, String>,
    pub exceptions: Exceptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_switch_enabled: true,
            sound_enabled: true,
            switch_chord: vec![Key::KEY_LEFTMETA.code(), Key::KEY_SPACE.code()],
            autocorrect: HashMap::new(),
            autoreplace: HashMap::new(),
            exceptions: Exceptions::default(),
        }
    }
}

// The base file carries everything except the replacement tables and
// exclusion lists, which live in their own files.
#[derive(Serialize, Deserialize)]
struct BaseConfig {
    auto_switch_enabled: bool,
    sound_enabled: bool,
    switch_chord: Vec<u16>,
}

/// Reads and writes configuration snapshots under one directory.
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Could not determine user config directory.")?
            .join("relayout");
        Ok(Self { config_dir })
    }

    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Loads the snapshot, writing defaults on first run.
    ///
    /// A present base file with missing companion files is an error rather
    /// than a silent fallback: it usually means a broken manual edit.
    pub fn load(&self) -> Result<Config> {
        fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("Failed to create config dir {:?}", self.config_dir))?;

        let config_path = self.config_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            let config = Config::default();
            self.save(&config)?;
            info!("Wrote default configuration to {:?}", self.config_dir);
            return Ok(config);
        }

        for name in [AUTOCORRECT_FILE, AUTOREPLACE_FILE, EXCEPTIONS_FILE] {
            let path = self.config_dir.join(name);
            if !path.exists() {
                bail!("Missing configuration file: {:?}", path);
            }
        }

        let base: BaseConfig = read_json(&config_path)?;
        let autocorrect = read_json(&self.config_dir.join(AUTOCORRECT_FILE))?;
        let autoreplace = read_json(&self.config_dir.join(AUTOREPLACE_FILE))?;
        let exceptions = read_json(&self.config_dir.join(EXCEPTIONS_FILE))?;

        Ok(Config {
            auto_switch_enabled: base.auto_switch_enabled,
            sound_enabled: base.sound_enabled,
            switch_chord: base.switch_chord,
            autocorrect,
            autoreplace,
            exceptions,
        })
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("Failed to create config dir {:?}", self.config_dir))?;

        let base = BaseConfig {
            auto_switch_enabled: config.auto_switch_enabled,
            sound_enabled: config.sound_enabled,
            switch_chord: config.switch_chord.clone(),
        };
        write_json(&self.config_dir.join(CONFIG_FILE), &base)?;
        write_json(&self.config_dir.join(AUTOCORRECT_FILE), &config.autocorrect)?;
        write_json(&self.config_dir.join(AUTOREPLACE_FILE), &config.autoreplace)?;
        write_json(&self.config_dir.join(EXCEPTIONS_FILE), &config.exceptions)?;
        Ok(())
    }

    /// Watches the config directory, sending one reload request per change
    /// burst. The returned watcher must be kept alive by the caller.
    pub fn start_watcher(&self, reload_tx: mpsc::Sender<()>) -> Result<RecommendedWatcher> {
        let mut last_reload = Instant::now() - RELOAD_DEBOUNCE;

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if !event.kind.is_modify() && !event.kind.is_create() {
                        return;
                    }
                    if last_reload.elapsed() < RELOAD_DEBOUNCE {
                        return;
                    }
                    last_reload = Instant::now();
                    // The receiver lives on the event loop; dropped receiver
                    // just means we are shutting down.
                    let _ = reload_tx.blocking_send(());
                }
                Err(e) => error!("Configuration watch error: {:?}", e),
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&self.config_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config dir {:?}", self.config_dir))?;

        info!(
            "Watching configuration directory for changes: {:?}",
            self.config_dir
        );
        Ok(watcher)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {:?}", path))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file at {:?}", path))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let encoded = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to encode config for {:?}", path))?;
    fs::write(path, encoded + "\n")
        .with_context(|| format!("Failed to write config file {:?}", path))
}
