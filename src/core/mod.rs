//! Core engine functionality
//!
//! Input tracking, block capture lifecycle, and the per-session engine
//! façade that binds them to the marker store.

pub mod capture;
pub mod input;
pub mod session;

pub use capture::{BlockLifecycle, CompletedBlock};
pub use input::{InputEvent, InputTracker};
pub use session::{CursorLine, EngineEvent, SessionEngine};
