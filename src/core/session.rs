//! Per-session engine façade
//!
//! Wires the input tracker and the block lifecycle machine to the
//! marker store for one session, tracks the device's CLI view, and
//! handles VRP pagination. The host delivers the two byte streams and a
//! periodic tick; within a session every call must arrive in causal
//! order (input before the output it provokes), which is also the order
//! the terminal's own line positions depend on.

use std::time::Instant;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::core::capture::{BlockLifecycle, CompletedBlock};
use crate::core::input::{InputEvent, InputTracker};
use crate::markers::{BlockStatus, MarkerStore};
use crate::patterns::{PatternSet, View};

/// Read-only capability handed in by the terminal emulator: the
/// absolute buffer line the cursor is currently on. The engine never
/// sees the emulator's internal structures, only this narrow query.
pub trait CursorLine {
    fn current_line(&self) -> u64;
}

/// Notifications for the host and presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    BlockStarted {
        marker_id: u64,
    },
    BlockCompleted {
        marker_id: u64,
        status: BlockStatus,
    },
    ViewChanged {
        view: View,
        hostname: String,
    },
    Pagination {
        auto_handled: bool,
    },
}

/// Segmentation engine for one session
///
/// The marker store is shared across sessions and injected per call so
/// a host can keep a single store behind whatever partitioning it uses.
pub struct SessionEngine {
    session_id: String,
    input: InputTracker,
    lifecycle: BlockLifecycle,
    patterns: PatternSet,
    cursor: Box<dyn CursorLine>,
    /// Trailing partial output line, for view and pagination detection
    line_buffer: String,
    current_view: View,
    hostname: String,
    auto_pagination: bool,
}

impl SessionEngine {
    pub fn new(session_id: &str, config: &EngineConfig, cursor: Box<dyn CursorLine>) -> Self {
        Self {
            session_id: session_id.to_string(),
            input: InputTracker::new(),
            lifecycle: BlockLifecycle::new(config),
            patterns: PatternSet::with_custom(
                &config.custom_prompt_patterns,
                &config.custom_error_patterns,
            ),
            cursor,
            line_buffer: String::new(),
            current_view: View::Unknown,
            hostname: String::new(),
            auto_pagination: config.auto_pagination,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_capturing(&self) -> bool {
        self.lifecycle.is_capturing()
    }

    /// Last CLI view recognized in the output stream
    pub fn current_view(&self) -> View {
        self.current_view
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Feed a chunk of user keystrokes headed for the device
    pub fn process_input(&mut self, chunk: &[u8], store: &mut MarkerStore) -> Vec<EngineEvent> {
        self.process_input_at(chunk, store, Instant::now())
    }

    pub fn process_input_at(
        &mut self,
        chunk: &[u8],
        store: &mut MarkerStore,
        now: Instant,
    ) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for event in self.input.process(chunk) {
            match event {
                InputEvent::Submit(command) => {
                    // A submission mid-capture finalizes the in-flight
                    // block first, so at most one block is ever active.
                    if let Some(done) = self.lifecycle.supersede() {
                        events.push(self.apply_completion(done, store));
                    }
                    let start_line = self.cursor.current_line();
                    let marker_id = store.create(&self.session_id, &command, start_line);
                    self.lifecycle.begin(marker_id, start_line, now);
                    events.push(EngineEvent::BlockStarted { marker_id });
                }
                InputEvent::Interrupt => {
                    if let Some(done) = self.lifecycle.interrupt() {
                        events.push(self.apply_completion(done, store));
                    }
                }
            }
        }
        events
    }

    /// Feed a chunk of device output, in buffer order.
    ///
    /// Returns the events produced plus bytes the host should send back
    /// to the device (the auto-answer for a pagination prompt).
    pub fn process_output(
        &mut self,
        chunk: &[u8],
        store: &mut MarkerStore,
    ) -> (Vec<EngineEvent>, Option<Vec<u8>>) {
        self.process_output_at(chunk, store, Instant::now())
    }

    pub fn process_output_at(
        &mut self,
        chunk: &[u8],
        store: &mut MarkerStore,
        now: Instant,
    ) -> (Vec<EngineEvent>, Option<Vec<u8>>) {
        let mut events = Vec::new();
        let mut auto_response = None;

        let text = String::from_utf8_lossy(chunk);
        self.line_buffer.push_str(&text);

        if self.patterns.has_pagination(&self.line_buffer) {
            events.push(EngineEvent::Pagination {
                auto_handled: self.auto_pagination,
            });
            if self.auto_pagination {
                // Space asks the device for the next page
                auto_response = Some(b" ".to_vec());
            }
            self.line_buffer = self.patterns.strip_pagination(&self.line_buffer);
        }

        if let Some(event) = self.detect_view_change() {
            events.push(event);
        }

        if let Some(done) =
            self.lifecycle
                .on_output(&text, self.cursor.current_line(), now, &self.patterns)
        {
            events.push(self.apply_completion(done, store));
        }

        // Keep only the trailing partial line for the next chunk
        if let Some(last_newline) = self.line_buffer.rfind('\n') {
            self.line_buffer.drain(..=last_newline);
        }

        (events, auto_response)
    }

    /// Check the fallback deadline; the host calls this periodically
    pub fn tick(&mut self, store: &mut MarkerStore) -> Vec<EngineEvent> {
        self.tick_at(store, Instant::now())
    }

    pub fn tick_at(&mut self, store: &mut MarkerStore, now: Instant) -> Vec<EngineEvent> {
        match self.lifecycle.tick(now) {
            Some(done) => vec![self.apply_completion(done, store)],
            None => Vec::new(),
        }
    }

    /// Finalize any in-flight block, e.g. at session teardown.
    /// Leaving it running is equally valid; this is host policy.
    pub fn force_complete_active(&mut self, store: &mut MarkerStore) -> Option<EngineEvent> {
        let done = self.lifecycle.force_complete()?;
        Some(self.apply_completion(done, store))
    }

    fn apply_completion(&mut self, done: CompletedBlock, store: &mut MarkerStore) -> EngineEvent {
        store.complete(done.marker_id, done.end_line, done.status);
        EngineEvent::BlockCompleted {
            marker_id: done.marker_id,
            status: done.status,
        }
    }

    /// Track the device view from the prompt at the buffer tail
    fn detect_view_change(&mut self) -> Option<EngineEvent> {
        let prompt = self.patterns.match_prompt(&self.line_buffer, 1)?;
        let hostname = prompt.hostname?;
        if prompt.view == self.current_view && hostname == self.hostname {
            return None;
        }
        self.current_view = prompt.view;
        self.hostname = hostname.clone();
        debug!(
            session_id = %self.session_id,
            view = ?prompt.view,
            hostname = %hostname,
            "View changed"
        );
        Some(EngineEvent::ViewChanged {
            view: prompt.view,
            hostname,
        })
    }
}
