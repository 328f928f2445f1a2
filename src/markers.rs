//! Block markers and the per-session marker store
//!
//! A marker is one captured command-and-output unit: the command text,
//! a line range into the terminal's scrollback, and a status. The store
//! owns every marker for the lifetime of a session and is the only
//! writer; the terminal buffer itself is never touched, markers refer
//! to it by line number only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::history::{self, HistoryStrategy};

/// Outcome of a captured block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    /// Output is still being attributed to this block
    Running,
    Success,
    Error,
}

/// One captured command-and-output unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marker {
    /// Store-assigned opaque id
    pub id: u64,
    /// Owning session
    pub session_id: String,
    /// Command text as submitted, trimmed
    pub command: String,
    /// Unix timestamp in milliseconds
    pub created_at: u64,
    pub status: BlockStatus,
    pub collapsed: bool,
    /// Absolute buffer line of the command, immutable after creation
    pub start_line: u64,
    /// Absolute buffer line of the terminating prompt; None while running
    pub end_line: Option<u64>,
}

impl Marker {
    /// Whether `line` falls inside this marker's range.
    /// A running marker (no end yet) claims every line at or after its start.
    pub fn contains_line(&self, line: u64) -> bool {
        if line < self.start_line {
            return false;
        }
        match self.end_line {
            Some(end) => line <= end,
            None => true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == BlockStatus::Running
    }

    /// Lines strictly between the command line and the prompt line
    pub fn hidden_line_count(&self) -> u64 {
        match self.end_line {
            Some(end) if end > self.start_line + 1 => end - self.start_line - 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize markers: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to parse markers: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-disk shape for one session's marker history
#[derive(Debug, Serialize, Deserialize)]
struct MarkerFile {
    markers: Vec<Marker>,
}

/// Per-session ordered marker collections
///
/// Constructed and injected by the host; there is no ambient global
/// store. All mutation goes through the operations below, which are
/// total: unknown ids and out-of-range lines degrade to logged no-ops,
/// retention pressure to silent oldest-first eviction.
pub struct MarkerStore {
    sessions: HashMap<String, Vec<Marker>>,
    next_id: u64,
    ceiling: usize,
}

impl MarkerStore {
    /// Create a store retaining at most `ceiling` markers per session
    pub fn new(ceiling: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
            ceiling,
        }
    }

    /// Append a new running marker and return its id.
    /// Evicts the oldest markers once the session exceeds the ceiling.
    pub fn create(&mut self, session_id: &str, command: &str, start_line: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let markers = self.sessions.entry(session_id.to_string()).or_default();
        markers.push(Marker {
            id,
            session_id: session_id.to_string(),
            command: command.trim().to_string(),
            created_at: unix_ms(),
            status: BlockStatus::Running,
            collapsed: false,
            start_line,
            end_line: None,
        });

        while markers.len() > self.ceiling {
            markers.remove(0);
        }

        debug!(session_id = %session_id, marker_id = id, start_line, "Block started");
        id
    }

    /// Transition a running marker to a terminal status.
    ///
    /// Only the `Running -> {Success, Error}` transition is honored;
    /// completing an already-completed or unknown marker is a no-op, so
    /// double completion can never rewrite a stored range.
    pub fn complete(&mut self, marker_id: u64, end_line: u64, status: BlockStatus) {
        if status == BlockStatus::Running {
            warn!(marker_id, "Ignoring completion with non-terminal status");
            return;
        }

        let Some(marker) = self.get_mut(marker_id) else {
            warn!(marker_id, "Ignoring completion for unknown marker");
            return;
        };
        if marker.status != BlockStatus::Running {
            return;
        }

        // A prompt can't terminate a block above the command line; clamp
        // rather than leave the marker stuck running.
        let end_line = end_line.max(marker.start_line);
        marker.end_line = Some(end_line);
        marker.status = status;
        debug!(
            marker_id,
            end_line,
            status = ?status,
            "Block completed"
        );
    }

    pub fn toggle_collapse(&mut self, marker_id: u64) {
        if let Some(marker) = self.get_mut(marker_id) {
            marker.collapsed = !marker.collapsed;
        }
    }

    pub fn collapse_all(&mut self, session_id: &str) {
        for marker in self.sessions.get_mut(session_id).into_iter().flatten() {
            marker.collapsed = true;
        }
    }

    pub fn expand_all(&mut self, session_id: &str) {
        for marker in self.sessions.get_mut(session_id).into_iter().flatten() {
            marker.collapsed = false;
        }
    }

    /// Deduplicated, ranked command history for suggestion features.
    /// Rebuilt on demand; nothing is stored besides the markers.
    pub fn command_history(
        &self,
        session_id: &str,
        strategy: HistoryStrategy,
        limit: usize,
    ) -> Vec<String> {
        history::ranked_commands(self.markers(session_id), strategy, limit, unix_ms())
    }

    /// The marker whose line range contains `line`, if any.
    /// Prefers the most recently created marker when ranges abut.
    pub fn find_by_line(&self, session_id: &str, line: u64) -> Option<&Marker> {
        self.markers(session_id)
            .iter()
            .rev()
            .find(|m| m.contains_line(line))
    }

    /// All markers for a session, oldest first
    pub fn markers(&self, session_id: &str) -> &[Marker] {
        self.sessions
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, marker_id: u64) -> Option<&Marker> {
        self.sessions
            .values()
            .flatten()
            .find(|m| m.id == marker_id)
    }

    fn get_mut(&mut self, marker_id: u64) -> Option<&mut Marker> {
        self.sessions
            .values_mut()
            .flatten()
            .find(|m| m.id == marker_id)
    }

    /// Drop all markers for a session
    pub fn remove_session(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Serialize a session's marker history to a TOML file
    pub fn save_session(&self, session_id: &str, path: &Path) -> Result<(), PersistError> {
        let file = MarkerFile {
            markers: self.markers(session_id).to_vec(),
        };
        let content = toml::to_string_pretty(&file)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Restore a session's marker history from a TOML file.
    ///
    /// Markers are assigned fresh ids. A marker persisted while still
    /// running cannot be resumed (its capture context is gone), so it is
    /// restored as completed with status `Error` and a zero-length range.
    /// Returns the number of markers loaded.
    pub fn load_session(&mut self, path: &Path) -> Result<usize, PersistError> {
        let content = fs::read_to_string(path)?;
        let file: MarkerFile = toml::from_str(&content)?;
        let count = file.markers.len();

        for mut marker in file.markers {
            if marker.status == BlockStatus::Running {
                warn!(
                    command = %marker.command,
                    "Restoring running marker as error"
                );
                marker.status = BlockStatus::Error;
                marker.end_line = Some(marker.start_line);
            }
            marker.id = self.next_id;
            self.next_id += 1;

            let markers = self.sessions.entry(marker.session_id.clone()).or_default();
            markers.push(marker);
            while markers.len() > self.ceiling {
                markers.remove(0);
            }
        }
        Ok(count)
    }
}

/// Current unix time in milliseconds
pub(crate) fn unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MarkerStore {
        MarkerStore::new(500)
    }

    #[test]
    fn test_create_and_complete() {
        let mut store = store();
        let id = store.create("s1", "display version", 10);

        let marker = store.get(id).unwrap();
        assert_eq!(marker.status, BlockStatus::Running);
        assert_eq!(marker.start_line, 10);
        assert_eq!(marker.end_line, None);

        store.complete(id, 15, BlockStatus::Success);
        let marker = store.get(id).unwrap();
        assert_eq!(marker.status, BlockStatus::Success);
        assert_eq!(marker.end_line, Some(15));
    }

    #[test]
    fn test_completion_is_idempotent() {
        let mut store = store();
        let id = store.create("s1", "ls", 0);

        store.complete(id, 5, BlockStatus::Success);
        store.complete(id, 99, BlockStatus::Error);

        let marker = store.get(id).unwrap();
        assert_eq!(marker.status, BlockStatus::Success);
        assert_eq!(marker.end_line, Some(5));
    }

    #[test]
    fn test_complete_unknown_marker_is_noop() {
        let mut store = store();
        store.complete(42, 5, BlockStatus::Success);
        assert!(store.get(42).is_none());
    }

    #[test]
    fn test_end_line_clamped_to_start() {
        let mut store = store();
        let id = store.create("s1", "ls", 10);
        store.complete(id, 3, BlockStatus::Success);
        assert_eq!(store.get(id).unwrap().end_line, Some(10));
    }

    #[test]
    fn test_eviction_at_ceiling() {
        let mut store = MarkerStore::new(3);
        for i in 0..5 {
            store.create("s1", &format!("cmd{}", i), i);
        }
        let markers = store.markers("s1");
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].command, "cmd2");
        assert_eq!(markers[2].command, "cmd4");
    }

    #[test]
    fn test_collapse_round_trip() {
        let mut store = store();
        let id = store.create("s1", "ls", 0);

        store.toggle_collapse(id);
        assert!(store.get(id).unwrap().collapsed);
        store.toggle_collapse(id);
        assert!(!store.get(id).unwrap().collapsed);

        store.collapse_all("s1");
        assert!(store.markers("s1").iter().all(|m| m.collapsed));
        store.expand_all("s1");
        assert!(store.markers("s1").iter().all(|m| !m.collapsed));
    }

    #[test]
    fn test_find_by_line() {
        let mut store = store();
        let a = store.create("s1", "first", 0);
        store.complete(a, 5, BlockStatus::Success);
        let b = store.create("s1", "second", 6);

        assert_eq!(store.find_by_line("s1", 3).unwrap().id, a);
        assert_eq!(store.find_by_line("s1", 5).unwrap().id, a);
        // Running marker matches any line at or after its start
        assert_eq!(store.find_by_line("s1", 100).unwrap().id, b);
        assert!(store.find_by_line("s2", 3).is_none());
    }

    #[test]
    fn test_sessions_are_partitioned() {
        let mut store = store();
        store.create("s1", "ls", 0);
        store.create("s2", "pwd", 0);

        assert_eq!(store.markers("s1").len(), 1);
        assert_eq!(store.markers("s2").len(), 1);
        store.remove_session("s1");
        assert!(store.markers("s1").is_empty());
        assert_eq!(store.markers("s2").len(), 1);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = std::env::temp_dir().join("termblocks-test-persist");
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("s1.toml");

        let mut store = store();
        let a = store.create("s1", "display version", 0);
        store.complete(a, 4, BlockStatus::Success);
        // Left running on purpose: must not be restored as running
        store.create("s1", "display interface", 5);
        store.save_session("s1", &path).unwrap();

        let mut restored = MarkerStore::new(500);
        let count = restored.load_session(&path).unwrap();
        assert_eq!(count, 2);

        let markers = restored.markers("s1");
        assert_eq!(markers[0].status, BlockStatus::Success);
        assert_eq!(markers[0].command, "display version");
        assert_eq!(markers[1].status, BlockStatus::Error);
        assert_eq!(markers[1].end_line, Some(5));

        let _ = fs::remove_file(&path);
    }
}
