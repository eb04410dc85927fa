//! Realizes recommendations as synthetic keystrokes through uinput.
//!
//! The injector owns the virtual keyboard for the lifetime of the process.
//! The device carries a reserved name so the input tap can recognize and skip
//! it during discovery; that single rule is the whole feedback-loop defense.
//! Every press/release pair is synchronized individually, which keeps the
//! synthetic stream well-formed even if an emission in the middle of a
//! rewrite fails.
use crate::layout::LayoutTable;
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use log::{info, warn};
use thiserror::Error;

/// Device name the input tap excludes to avoid feeding our own output back
/// into the analyzer.
pub const VIRTUAL_KEYBOARD_NAME: &str = "relayout-virtual-keyboard";

// The virtual keyboard advertises every key up to this code.
const MAX_KEY_CODE: u16 = 248;

/// Failures raised while creating or driving the virtual keyboard.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// Fatal at startup; the service exits with a non-zero code.
    #[error("failed to create the virtual keyboard: {0}")]
    Init(#[source] std::io::Error),
    /// Transient; the current action is abandoned and the word buffer reset.
    #[error("virtual keyboard write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Sink for raw key events. The production implementation writes to uinput;
/// tests substitute a recording sink.
pub trait KeyEmitter {
    fn emit_key(&mut self, code: u16, value: i32) -> Result<(), InjectionError>;
}

/// uinput-backed emitter wrapping the scoped virtual device handle.
pub struct UinputEmitter {
    device: VirtualDevice,
}

impl UinputEmitter {
    pub fn new() -> Result<Self, InjectionError> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 1..=MAX_KEY_CODE {
            keys.insert(Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(InjectionError::Init)?
            .name(VIRTUAL_KEYBOARD_NAME)
            .with_keys(&keys)
            .map_err(InjectionError::Init)?
            .build()
            .map_err(InjectionError::Init)?;

        info!("Virtual keyboard '{}' initialized.", VIRTUAL_KEYBOARD_NAME);
        Ok(Self { device })
    }
}

impl KeyEmitter for UinputEmitter {
    fn emit_key(&mut self, code: u16, value: i32) -> Result<(), InjectionError> {
        // emit() appends a SYN_REPORT, so every call is an individually
        // synchronized frame.
        self.device
            .emit(&[InputEvent::new(EventType::KEY, code, value)])
            .map_err(InjectionError::Write)
    }
}

/// Keystroke-level executor for analyzer recommendations.
pub struct Injector<E: KeyEmitter = UinputEmitter> {
    emitter: E,
    table: LayoutTable,
}

impl Injector<UinputEmitter> {
    /// Creates the named virtual keyboard. Failure here is fatal.
    pub fn new(table: LayoutTable) -> Result<Self, InjectionError> {
        Ok(Self {
            emitter: UinputEmitter::new()?,
            table,
        })
    }
}

impl<E: KeyEmitter> Injector<E> {
    pub fn with_emitter(emitter: E, table: LayoutTable) -> Self {
        Self { emitter, table }
    }

    fn send_key(&mut self, code: u16, press: bool, release: bool) -> Result<(), InjectionError> {
        if press {
            self.emitter.emit_key(code, 1)?;
        }
        if release {
            self.emitter.emit_key(code, 0)?;
        }
        Ok(())
    }

    /// Emits `count` press-release pairs of the backspace key.
    pub fn backspace(&mut self, count: usize) -> Result<(), InjectionError> {
        for _ in 0..count {
            self.send_key(Key::KEY_BACKSPACE.code(), true, true)?;
        }
        Ok(())
    }

    /// Presses the modifiers in order, taps the key, then releases the
    /// modifiers in reverse order.
    pub fn send_combo(&mut self, modifiers: &[u16], key: u16) -> Result<(), InjectionError> {
        for m in modifiers {
            self.send_key(*m, true, false)?;
        }
        self.send_key(key, true, true)?;
        for m in modifiers.iter().rev() {
            self.send_key(*m, false, true)?;
        }
        Ok(())
    }

    /// Presses every key of an already-ordered chord, then releases them in
    /// reverse order. Used for the host's layout-switch sequence.
    pub fn switch_layout_chord(&mut self, chord: &[u16]) -> Result<(), InjectionError> {
        for k in chord {
            self.send_key(*k, true, false)?;
        }
        for k in chord.iter().rev() {
            self.send_key(*k, false, true)?;
        }
        Ok(())
    }

    /// Emits a press-release pair for each scancode in order.
    pub fn type_sequence(&mut self, codes: &[u16]) -> Result<(), InjectionError> {
        for code in codes {
            self.send_key(*code, true, true)?;
        }
        Ok(())
    }

    /// Types a string by resolving each character through the layout table.
    ///
    /// Shift is held across a character iff it was uppercase. Characters no
    /// key produces are skipped with a warning.
    pub fn type_string(&mut self, text: &str) -> Result<(), InjectionError> {
        for ch in text.chars() {
            match self.table.key_for_char(ch) {
                Some((code, needs_shift)) => {
                    if needs_shift {
                        self.send_key(Key::KEY_LEFTSHIFT.code(), true, false)?;
                    }
                    self.send_key(code, true, true)?;
                    if needs_shift {
                        self.send_key(Key::KEY_LEFTSHIFT.code(), false, true)?;
                    }
                }
                None => warn!("Cannot type '{}': no key produces it.", ch),
            }
        }
        Ok(())
    }
}
