//! Discovers physical keyboards and multiplexes their key events.
//!
//! A supervisor task re-enumerates `/dev/input` every five seconds (and once
//! at startup), spawning one reader task per keyboard-capable device. Readers
//! forward raw `(scancode, value)` pairs into the caller's channel; a device
//! counts as a keyboard when it advertises both a letter key and ENTER, which
//! filters out mice, lid switches and the like. Devices carrying our own
//! virtual-keyboard name are skipped so synthetic output never re-enters the
//! pipeline. Read errors kill only the affected reader; the next sweep
//! re-adds the device if it comes back.
use evdev::{Device, EventType, Key};
use futures::stream::StreamExt;
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Raw key event from one of the monitored keyboards.
///
/// `value` follows the kernel convention: 0 up, 1 down, 2 repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub value: i32,
}

type ReaderMap = Arc<Mutex<HashMap<PathBuf, JoinHandle<()>>>>;

/// Multi-device keyboard aggregator.
pub struct InputTap {
    excluded_name: String,
    readers: ReaderMap,
    supervisor: Option<JoinHandle<()>>,
}

impl InputTap {
    /// `excluded_name` is the virtual-keyboard device name to skip during
    /// discovery.
    pub fn new(excluded_name: impl Into<String>) -> Self {
        Self {
            excluded_name: excluded_name.into(),
            readers: Arc::new(Mutex::new(HashMap::new())),
            supervisor: None,
        }
    }

    /// Begins discovery and monitoring, delivering every key event to `sink`.
    pub fn start(&mut self, sink: mpsc::Sender<KeyEvent>) {
        let readers = Arc::clone(&self.readers);
        let excluded_name = self.excluded_name.clone();

        info!("Starting input tap...");
        self.supervisor = Some(tokio::spawn(async move {
            loop {
                scan_devices(&readers, &sink, &excluded_name);
                tokio::time::sleep(SCAN_INTERVAL).await;
            }
        }));
    }

    /// Cancels the supervisor and every device reader, dropping all handles.
    /// Safe to call repeatedly; later calls are no-ops.
    pub fn stop(&mut self) {
        let supervisor = self.supervisor.take();
        let mut readers = self
            .readers
            .lock()
            .expect("reader registry lock poisoned");
        if supervisor.is_none() && readers.is_empty() {
            return;
        }

        if let Some(supervisor) = supervisor {
            supervisor.abort();
        }
        for (path, reader) in readers.drain() {
            reader.abort();
            debug!("Stopped monitoring {:?}", path);
        }
        info!("Input tap stopped.");
    }
}

impl Drop for InputTap {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One discovery sweep: reap finished readers, open new keyboards, drop
/// readers whose device path disappeared.
fn scan_devices(readers: &ReaderMap, sink: &mpsc::Sender<KeyEvent>, excluded_name: &str) {
    let mut present: HashSet<PathBuf> = HashSet::new();

    for (path, device) in evdev::enumerate() {
        present.insert(path.clone());

        {
            let mut map = readers.lock().expect("reader registry lock poisoned");
            match map.get(&path).map(|reader| reader.is_finished()) {
                // The reader died (read error, unplug); let the sweep
                // re-open the device below.
                Some(true) => {
                    map.remove(&path);
                }
                Some(false) => continue,
                None => {}
            }
        }

        if !is_keyboard(&device) {
            continue;
        }
        if device.name() == Some(excluded_name) {
            debug!("Skipping our own virtual keyboard at {:?}", path);
            continue;
        }

        info!(
            "Found keyboard: {} at {:?}",
            device.name().unwrap_or("unknown"),
            path
        );
        let reader = tokio::spawn(read_device(device, path.clone(), sink.clone()));
        readers
            .lock()
            .expect("reader registry lock poisoned")
            .insert(path, reader);
    }

    let mut map = readers.lock().expect("reader registry lock poisoned");
    map.retain(|path, reader| {
        if present.contains(path) {
            true
        } else {
            reader.abort();
            info!("Device disconnected: {:?}", path);
            false
        }
    });
}

/// A keyboard must advertise an alphabetic key and ENTER.
fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .map_or(false, |keys| keys.contains(Key::KEY_A) && keys.contains(Key::KEY_ENTER))
}

/// Forwards key events from one device until it errors or the sink closes.
async fn read_device(device: Device, path: PathBuf, sink: mpsc::Sender<KeyEvent>) {
    let mut stream = match device.into_event_stream() {
        Ok(stream) => stream,
        Err(e) => {
            // Permission problems and mid-scan unplugs are retried on the
            // next sweep once this reader is reaped.
            warn!("Could not open event stream for {:?}: {}", path, e);
            return;
        }
    };

    while let Some(event) = stream.next().await {
        match event {
            Ok(ev) => {
                if ev.event_type() != EventType::KEY {
                    continue;
                }
                let key_event = KeyEvent {
                    code: ev.code(),
                    value: ev.value(),
                };
                if sink.send(key_event).await.is_err() {
                    debug!("Event sink closed, stopping reader for {:?}", path);
                    return;
                }
            }
            Err(e) => {
                warn!("Read error on {:?}: {}", path, e);
                return;
            }
        }
    }
    error!("Event stream ended for {:?}", path);
}
