//! Input tracker
//!
//! Reconstructs the in-flight typed command line from the raw keystroke
//! stream headed to the remote device, despite line editing and control
//! bytes. Emits submission and cancel events; the visual effect of every
//! byte is the terminal emulator's business, not ours.

use tracing::trace;

/// Events recognized in the keystroke stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Enter pressed with a non-empty line: `command` is trimmed
    Submit(String),
    /// Ctrl+C
    Interrupt,
}

#[derive(Clone, Copy, Default, PartialEq)]
enum EscState {
    #[default]
    Ground,
    /// ESC received, next byte decides
    Escape,
    /// Inside a CSI sequence, consuming until a final byte
    Csi,
    /// ESC O received, one final byte follows (arrows under DECCKM, F1-F4)
    Ss3,
}

/// Keystroke-stream state machine
///
/// Escape sequences (arrow keys and friends) are skipped entirely: local
/// line editing they trigger happens device-side and would corrupt the
/// reconstruction if their bytes were appended literally.
pub struct InputTracker {
    /// Accumulated typed command
    line: String,
    esc: EscState,
    /// Partial UTF-8 sequence split across chunks
    pending: Vec<u8>,
    pending_len: usize,
}

impl Default for InputTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl InputTracker {
    pub fn new() -> Self {
        Self {
            line: String::new(),
            esc: EscState::Ground,
            pending: Vec::with_capacity(4),
            pending_len: 0,
        }
    }

    /// The command line as typed so far
    pub fn current_line(&self) -> &str {
        &self.line
    }

    /// Feed one chunk of keystrokes, returning the events it produced
    pub fn process(&mut self, chunk: &[u8]) -> Vec<InputEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if let Some(event) = self.feed(byte) {
                events.push(event);
            }
        }
        events
    }

    fn feed(&mut self, byte: u8) -> Option<InputEvent> {
        match self.esc {
            EscState::Escape => {
                self.esc = match byte {
                    b'[' => EscState::Csi,
                    b'O' => EscState::Ss3,
                    // Single-character escape, consumed as a whole
                    _ => EscState::Ground,
                };
                return None;
            }
            EscState::Csi => {
                // Final bytes of a CSI sequence are 0x40..=0x7e
                if (0x40..=0x7e).contains(&byte) {
                    self.esc = EscState::Ground;
                }
                return None;
            }
            EscState::Ss3 => {
                self.esc = EscState::Ground;
                return None;
            }
            EscState::Ground => {}
        }

        match byte {
            0x1b => {
                self.pending.clear();
                self.esc = EscState::Escape;
                None
            }
            b'\r' | b'\n' => {
                self.pending.clear();
                let command = self.line.trim().to_string();
                self.line.clear();
                if command.is_empty() {
                    None
                } else {
                    trace!(command = %command, "Command submitted");
                    Some(InputEvent::Submit(command))
                }
            }
            // Backspace / DEL drop the last character
            0x08 | 0x7f => {
                self.pending.clear();
                self.line.pop();
                None
            }
            // Ctrl+C cancels the line and the block in flight
            0x03 => {
                self.pending.clear();
                self.line.clear();
                Some(InputEvent::Interrupt)
            }
            // Ctrl+U clears the line only
            0x15 => {
                self.pending.clear();
                self.line.clear();
                None
            }
            b if b < 0x20 => None,
            b if b < 0x80 => {
                self.pending.clear();
                self.line.push(b as char);
                None
            }
            b => {
                self.push_utf8(b);
                None
            }
        }
    }

    /// Accumulate multi-byte UTF-8, which may arrive split across chunks.
    /// Invalid sequences are dropped rather than appended.
    fn push_utf8(&mut self, byte: u8) {
        if self.pending.is_empty() {
            self.pending_len = if byte & 0xE0 == 0xC0 {
                2
            } else if byte & 0xF0 == 0xE0 {
                3
            } else if byte & 0xF8 == 0xF0 {
                4
            } else {
                // Stray continuation byte
                return;
            };
        }
        self.pending.push(byte);

        if self.pending.len() >= self.pending_len {
            if let Ok(s) = std::str::from_utf8(&self.pending) {
                self.line.push_str(s);
            }
            self.pending.clear();
        }
    }
}
