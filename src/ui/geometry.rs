//! Viewport geometry synchronization
//!
//! Tracks the terminal's cell size, viewport height, and scroll offset
//! so marker decorations can be drawn in registration with the live
//! terminal. The terminal collaborator notifies us on scroll, resize,
//! and render; we only convert between buffer lines and screen pixels.

use crate::markers::{Marker, MarkerStore};

/// Snapshot handed to the presentation layer each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometrySnapshot {
    pub scroll_top_px: f32,
    pub cell_width: f32,
    pub cell_height: f32,
    pub viewport_rows: usize,
}

/// Scroll/resize-tracked geometry state for one terminal
#[derive(Debug, Clone)]
pub struct Geometry {
    cell_width: f32,
    cell_height: f32,
    viewport_rows: usize,
    scroll_top_px: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Geometry {
    pub fn new() -> Self {
        Self {
            cell_width: 0.0,
            cell_height: 0.0,
            viewport_rows: 0,
            scroll_top_px: 0.0,
        }
    }

    /// Resize notification: cell metrics in device pixels plus the
    /// visible row count
    pub fn on_resize(&mut self, cell_width: f32, cell_height: f32, viewport_rows: usize) {
        self.cell_width = cell_width;
        self.cell_height = cell_height;
        self.viewport_rows = viewport_rows;
    }

    /// Scroll notification: new scroll offset in device pixels
    pub fn on_scroll(&mut self, scroll_top_px: f32) {
        self.scroll_top_px = scroll_top_px.max(0.0);
    }

    /// Render notification. The emulator scrolls on its own when output
    /// arrives while pinned to the bottom, so each frame carries the
    /// current offset to re-synchronize against.
    pub fn on_render(&mut self, scroll_top_px: f32) {
        self.on_scroll(scroll_top_px);
    }

    pub fn cell_height(&self) -> f32 {
        self.cell_height
    }

    pub fn scroll_top_px(&self) -> f32 {
        self.scroll_top_px
    }

    /// Buffer line currently at the top of the viewport
    pub fn top_line(&self) -> u64 {
        if self.cell_height <= 0.0 {
            return 0;
        }
        (self.scroll_top_px / self.cell_height) as u64
    }

    /// Screen Y coordinate of a buffer line's top edge
    pub fn line_to_y(&self, line: u64) -> f32 {
        line as f32 * self.cell_height - self.scroll_top_px
    }

    /// Buffer line under a screen Y coordinate
    pub fn y_to_line(&self, y: f32) -> u64 {
        if self.cell_height <= 0.0 {
            return 0;
        }
        let abs = (y + self.scroll_top_px) / self.cell_height;
        if abs <= 0.0 {
            0
        } else {
            abs as u64
        }
    }

    /// Whether a buffer line is currently inside the viewport
    pub fn line_visible(&self, line: u64) -> bool {
        let y = self.line_to_y(line);
        y >= 0.0 && y < self.viewport_rows as f32 * self.cell_height
    }

    pub fn snapshot(&self) -> GeometrySnapshot {
        GeometrySnapshot {
            scroll_top_px: self.scroll_top_px,
            cell_width: self.cell_width,
            cell_height: self.cell_height,
            viewport_rows: self.viewport_rows,
        }
    }
}

/// Hit-test a click at screen Y against a session's markers
pub fn marker_at_y<'a>(
    geometry: &Geometry,
    store: &'a MarkerStore,
    session_id: &str,
    y: f32,
) -> Option<&'a Marker> {
    store.find_by_line(session_id, geometry.y_to_line(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::BlockStatus;

    fn geometry() -> Geometry {
        let mut g = Geometry::new();
        g.on_resize(9.0, 20.0, 40);
        g
    }

    #[test]
    fn test_line_to_y_follows_scroll() {
        let mut g = geometry();
        assert_eq!(g.line_to_y(5), 100.0);

        g.on_scroll(60.0);
        assert_eq!(g.line_to_y(5), 40.0);
        assert_eq!(g.top_line(), 3);
    }

    #[test]
    fn test_y_to_line_round_trip() {
        let mut g = geometry();
        g.on_scroll(200.0);

        for line in [0u64, 10, 123] {
            let y = g.line_to_y(line);
            assert_eq!(g.y_to_line(y), line);
        }
    }

    #[test]
    fn test_render_resyncs_scroll() {
        let mut g = geometry();
        g.on_scroll(40.0);

        // Output arrived while pinned to the bottom; the render
        // notification carries the offset the emulator moved to
        g.on_render(120.0);
        assert_eq!(g.top_line(), 6);
        assert_eq!(g.line_to_y(6), 0.0);
    }

    #[test]
    fn test_visibility_window() {
        let mut g = geometry();
        g.on_scroll(20.0 * 10.0); // top line = 10

        assert!(!g.line_visible(9));
        assert!(g.line_visible(10));
        assert!(g.line_visible(49));
        assert!(!g.line_visible(50));
    }

    #[test]
    fn test_marker_hit_test() {
        let mut store = MarkerStore::new(500);
        let id = store.create("s1", "display version", 10);
        store.complete(id, 14, BlockStatus::Success);

        let mut g = geometry();
        g.on_scroll(20.0 * 10.0);

        // Click on the first viewport row, which shows line 10
        let hit = marker_at_y(&g, &store, "s1", 5.0).unwrap();
        assert_eq!(hit.id, id);
        // Line 15 is past the marker's range
        assert!(marker_at_y(&g, &store, "s1", 20.0 * 5.0 + 5.0).is_none());
    }
}
