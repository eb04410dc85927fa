//! Clipboard access through the external wl-clipboard or xclip tools.
//!
//! Both operations shell out to whichever tool the session provides, with a
//! one second timeout so a wedged clipboard manager can never stall the
//! event loop. A missed deadline or a failed subprocess surfaces as "no
//! text", which makes the selection round-trip abort silently.
use log::{debug, error, info, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

const CLIPBOARD_TIMEOUT: Duration = Duration::from_secs(1);

/// Returns true when `program` resolves through the `PATH`.
pub(crate) fn find_in_path(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Wayland,
    X11,
    None,
}

/// Opaque clipboard collaborator; the backend is probed once at startup.
pub struct Clipboard {
    backend: Backend,
}

impl Clipboard {
    pub fn new() -> Self {
        let backend = if find_in_path("wl-copy") && find_in_path("wl-paste") {
            Backend::Wayland
        } else if find_in_path("xclip") {
            Backend::X11
        } else {
            Backend::None
        };
        info!("Clipboard initialized with backend: {:?}", backend);
        Self { backend }
    }

    /// Reads the current primary-selection text, or `None` on failure.
    pub async fn get_text(&self) -> Option<String> {
        let mut command = match self.backend {
            Backend::Wayland => {
                let mut c = Command::new("wl-paste");
                c.arg("--no-newline");
                c
            }
            Backend::X11 => {
                let mut c = Command::new("xclip");
                c.args(["-selection", "primary", "-o"]);
                c
            }
            Backend::None => return None,
        };
        command.stdin(Stdio::null());

        match timeout(CLIPBOARD_TIMEOUT, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                String::from_utf8(output.stdout).ok()
            }
            Ok(Ok(output)) => {
                debug!("Clipboard read exited with {}", output.status);
                None
            }
            Ok(Err(e)) => {
                error!("Failed to read clipboard: {}", e);
                None
            }
            Err(_) => {
                warn!("Clipboard read timed out.");
                None
            }
        }
    }

    /// Writes `text` to the clipboard. Returns false when the write failed.
    pub async fn set_text(&self, text: &str) -> bool {
        match self.backend {
            Backend::Wayland => pipe_to("wl-copy", &[], text).await,
            Backend::X11 => {
                // Set both selections so paste works regardless of which one
                // the target application reads.
                let clipboard = pipe_to("xclip", &["-selection", "clipboard", "-i"], text).await;
                let primary = pipe_to("xclip", &["-selection", "primary", "-i"], text).await;
                clipboard && primary
            }
            Backend::None => false,
        }
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns `program`, feeds `text` on stdin and waits for it to exit.
async fn pipe_to(program: &str, args: &[&str], text: &str) -> bool {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            error!("Failed to spawn {}: {}", program, e);
            return false;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(text.as_bytes()).await {
            error!("Failed to write clipboard text to {}: {}", program, e);
            return false;
        }
        // Dropping stdin closes the pipe so the tool sees EOF.
    }

    match timeout(CLIPBOARD_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) if status.success() => true,
        Ok(Ok(status)) => {
            debug!("{} exited with {}", program, status);
            false
        }
        Ok(Err(e)) => {
            error!("Failed to wait for {}: {}", program, e);
            false
        }
        Err(_) => {
            warn!("Clipboard write timed out.");
            false
        }
    }
}
