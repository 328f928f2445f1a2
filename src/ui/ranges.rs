//! Collapsed-range projection
//!
//! Maps collapsed markers to the line intervals the presentation layer
//! should cover. The underlying scrollback is never modified; hidden
//! spans are drawn over, so full-buffer selection and search keep
//! working.

use serde::{Deserialize, Serialize};

use crate::markers::Marker;

/// A span of buffer lines hidden by a collapsed marker.
/// `first_line..=last_line` lies strictly between the command line and
/// the terminating prompt line, both of which stay visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapsedRange {
    pub marker_id: u64,
    pub first_line: u64,
    pub last_line: u64,
    pub hidden_lines: u64,
}

/// Project a session's markers onto their hidden ranges.
///
/// Only collapsed, completed markers with at least one line between
/// command and prompt produce a range; a block whose output fit on the
/// prompt line has nothing to hide. Pure function, recomputed whenever
/// markers change.
pub fn collapsed_ranges(markers: &[Marker]) -> Vec<CollapsedRange> {
    markers
        .iter()
        .filter(|m| m.collapsed)
        .filter_map(|m| {
            let end = m.end_line?;
            if end <= m.start_line + 1 {
                return None;
            }
            Some(CollapsedRange {
                marker_id: m.id,
                first_line: m.start_line + 1,
                last_line: end - 1,
                hidden_lines: end - m.start_line - 1,
            })
        })
        .collect()
}
