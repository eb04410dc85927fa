//! Active-window lookup used for exclusion rules.
//!
//! Works through `xdotool`, so it is effectively X11-only; on Wayland the
//! lookup returns `None` and the daemon simply never pauses.
use crate::clipboard::find_in_path;
use log::info;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const QUERY_TIMEOUT: Duration = Duration::from_millis(500);

/// Title and class of the focused window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub title: String,
    pub class: String,
}

/// Best-effort active-window collaborator.
pub struct WindowDetector {
    available: bool,
}

impl WindowDetector {
    pub fn new() -> Self {
        let available = find_in_path("xdotool");
        if !available {
            info!("xdotool not found; window exclusions are disabled.");
        }
        Self { available }
    }

    /// Returns the focused window's title and class, or `None` when the
    /// display server offers no way to ask.
    pub async fn get_active_window_info(&self) -> Option<WindowInfo> {
        if !self.available {
            return None;
        }

        let window_id = run_xdotool(&["getactivewindow"]).await?;
        let title = run_xdotool(&["getwindowname", &window_id]).await?;

        // xdotool has no reliable class query; exclusion rules match on the
        // title.
        Some(WindowInfo {
            title,
            class: String::new(),
        })
    }
}

impl Default for WindowDetector {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_xdotool(args: &[&str]) -> Option<String> {
    let output = timeout(
        QUERY_TIMEOUT,
        Command::new("xdotool")
            .args(args)
            .stdin(Stdio::null())
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
