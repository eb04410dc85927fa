//! Fire-and-forget event sounds through paplay or aplay.
use crate::clipboard::find_in_path;
use log::{debug, info};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Best-effort sound collaborator. Playback runs on a detached task and is
/// never awaited by the event loop.
pub struct SoundPlayer {
    enabled: bool,
    player: Option<&'static str>,
    assets_dir: Option<PathBuf>,
}

impl SoundPlayer {
    pub fn new(enabled: bool) -> Self {
        let player = if find_in_path("paplay") {
            Some("paplay")
        } else if find_in_path("aplay") {
            Some("aplay")
        } else {
            None
        };
        let assets_dir = dirs::data_dir().map(|dir| dir.join("relayout").join("sounds"));
        info!("Sound player initialized: {:?}", player);
        Self {
            enabled,
            player,
            assets_dir,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Plays the sound for `event_name` ("click", "switch" or "error") if a
    /// matching wav file is installed.
    pub fn play(&self, event_name: &str) {
        if !self.enabled {
            return;
        }
        let (Some(player), Some(assets_dir)) = (self.player, self.assets_dir.as_ref()) else {
            return;
        };

        let path = assets_dir.join(format!("{}.wav", event_name));
        if !path.is_file() {
            debug!("Sound file not found: {:?}", path);
            return;
        }

        let mut command = Command::new(player);
        command
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        tokio::spawn(async move {
            if let Ok(mut child) = command.spawn() {
                let _ = child.wait().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn play_should_be_a_noop_when_disabled() {
        let player = SoundPlayer::new(false);
        // Must not panic or block without a player or sound files.
        player.play("switch");
    }
}
