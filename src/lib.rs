//! termblocks - command block segmentation for device terminal sessions
//!
//! termblocks watches the bidirectional byte stream of an SSH/Telnet
//! session to a router or embedded Linux board and reconstructs discrete
//! "blocks": one submitted command plus the output it produced, with a
//! line range into the terminal's scrollback and a success/error status.
//! The scrollback itself belongs to the terminal emulator and is never
//! modified; blocks refer to it by line number only.
//!
//! # Features
//!
//! - **Input tracking**: command reconstruction from raw keystrokes,
//!   including backspace editing, Ctrl+U, Ctrl+C, and escape sequences
//! - **Prompt detection**: Huawei VRP view prompts (`<host>`, `[host]`,
//!   `[host-interface]`) and POSIX shell prompts, extensible via config
//! - **Error classification**: phrase-based success/error status
//! - **Fallback timer**: a block never stays running past the configured
//!   silence window, even when no prompt is ever recognized
//! - **Marker store**: bounded per-session history with ranked command
//!   suggestions, collapse/expand, and TOML persistence
//! - **Presentation support**: collapsed-range projection and viewport
//!   geometry for drawing markers in registration with the terminal
//!
//! # Quick Start
//!
//! ```no_run
//! use termblocks::{CursorLine, EngineConfig, MarkerStore, SessionEngine};
//!
//! struct Cursor;
//! impl CursorLine for Cursor {
//!     fn current_line(&self) -> u64 {
//!         0 // query the terminal emulator here
//!     }
//! }
//!
//! let config = EngineConfig::load();
//! let mut store = MarkerStore::new(config.marker_ceiling);
//! let mut engine = SessionEngine::new("router-1", &config, Box::new(Cursor));
//!
//! engine.process_input(b"display version\r", &mut store);
//! let (events, auto) = engine.process_output(b"...\n<Huawei>", &mut store);
//! ```

pub mod config;
pub mod core;
pub mod history;
pub mod markers;
pub mod patterns;
pub mod ui;

pub use config::EngineConfig;
pub use core::{CursorLine, EngineEvent, SessionEngine};
pub use history::HistoryStrategy;
pub use markers::{BlockStatus, Marker, MarkerStore};
pub use patterns::{PatternSet, PromptMatch, View};
pub use ui::{collapsed_ranges, CollapsedRange, Geometry};
