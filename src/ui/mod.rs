//! Presentation-layer support
//!
//! Derived geometry and collapsed-range data the host's UI reads each
//! frame. Nothing here writes into the engine or the terminal.

pub mod geometry;
pub mod ranges;

pub use geometry::{marker_at_y, Geometry, GeometrySnapshot};
pub use ranges::{collapsed_ranges, CollapsedRange};
