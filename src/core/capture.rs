//! Block lifecycle state machine
//!
//! Owns the per-session capture state: once a command is submitted, a
//! block is open and every output chunk is attributed to it until a
//! prompt is recognized, the user interrupts, a newer submission
//! supersedes it, or the fallback deadline expires. Whatever happens,
//! a block always converges to a terminal status; the machine has no
//! path that leaves one running forever past the fallback delay.

use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::markers::BlockStatus;
use crate::patterns::{PatternSet, PromptMatch};

/// Upper bound on the accumulated pattern-test window. Output beyond
/// this is dropped from the front; an error phrase seen before trimming
/// is remembered in `error_seen`, so classification survives long
/// listings.
const WINDOW_LIMIT: usize = 64 * 1024;

/// A block that just reached a terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedBlock {
    pub marker_id: u64,
    pub end_line: u64,
    pub status: BlockStatus,
    /// The prompt that terminated the block, when one was recognized
    pub prompt: Option<PromptMatch>,
}

/// Ephemeral capture state, reset on every completion
#[derive(Default)]
struct CaptureState {
    /// Marker currently being captured
    active_marker: Option<u64>,
    /// Accumulated output, used only for pattern testing
    window: String,
    /// Error phrase observed in any chunk so far
    error_seen: bool,
    /// Last cursor line the terminal reported for this block
    current_line: u64,
    /// Fallback deadline, pushed forward on every output chunk
    deadline: Option<Instant>,
}

/// `Idle` / `Capturing` machine driving marker completion
pub struct BlockLifecycle {
    state: CaptureState,
    window_lines: usize,
    fallback: Duration,
}

impl BlockLifecycle {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: CaptureState::default(),
            window_lines: config.prompt_window_lines,
            fallback: config.fallback_delay(),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.state.active_marker.is_some()
    }

    pub fn active_marker(&self) -> Option<u64> {
        self.state.active_marker
    }

    /// `Idle -> Capturing`: a marker was created for a fresh submission.
    /// Any previously active block must already be finalized; callers
    /// use [`supersede`](Self::supersede) for that.
    pub fn begin(&mut self, marker_id: u64, start_line: u64, now: Instant) {
        debug_assert!(self.state.active_marker.is_none());
        self.state = CaptureState {
            active_marker: Some(marker_id),
            window: String::new(),
            error_seen: false,
            current_line: start_line,
            deadline: Some(now + self.fallback),
        };
    }

    /// `Capturing -> Capturing | Idle`: attribute an output chunk.
    ///
    /// Appends to the bounded pattern window, advances the tracked tail
    /// line, re-arms the fallback deadline, then tests for completion.
    pub fn on_output(
        &mut self,
        text: &str,
        current_line: u64,
        now: Instant,
        patterns: &PatternSet,
    ) -> Option<CompletedBlock> {
        self.state.active_marker?;

        self.state.window.push_str(text);
        self.trim_window();
        self.state.current_line = current_line.max(self.state.current_line);
        self.state.deadline = Some(now + self.fallback);

        if patterns.has_error(&self.state.window) {
            self.state.error_seen = true;
        }

        let prompt = patterns.match_prompt(&self.state.window, self.window_lines)?;
        trace!(view = ?prompt.view, "Prompt recognized, completing block");
        Some(self.finish(Some(prompt)))
    }

    /// `Capturing -> Idle` on Ctrl+C: immediate error, timer ignored
    pub fn interrupt(&mut self) -> Option<CompletedBlock> {
        self.state.active_marker?;
        debug!("Block interrupted");
        let mut done = self.finish(None);
        done.status = BlockStatus::Error;
        Some(done)
    }

    /// `Capturing -> Idle` when a newer submission arrives: the
    /// in-flight block is finalized as success before the new one
    /// starts, so at most one block is ever active.
    pub fn supersede(&mut self) -> Option<CompletedBlock> {
        self.state.active_marker?;
        debug!("Block superseded by new submission");
        let mut done = self.finish(None);
        done.status = BlockStatus::Success;
        Some(done)
    }

    /// Check the fallback deadline. Fires at most once per capture:
    /// devices that never emit a recognizable prompt still converge.
    pub fn tick(&mut self, now: Instant) -> Option<CompletedBlock> {
        self.state.active_marker?;
        let deadline = self.state.deadline?;
        if now < deadline {
            return None;
        }
        debug!("Fallback deadline expired, force-completing block");
        Some(self.finish(None))
    }

    /// `Capturing -> Idle` without waiting for the deadline, keeping
    /// the classification accumulated so far. Used at session teardown
    /// when the host wants no marker left running.
    pub fn force_complete(&mut self) -> Option<CompletedBlock> {
        self.state.active_marker?;
        debug!("Block force-completed");
        Some(self.finish(None))
    }

    /// The fallback deadline currently armed, if capturing
    pub fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    /// Finalize the active block and reset to idle
    fn finish(&mut self, prompt: Option<PromptMatch>) -> CompletedBlock {
        let status = if self.state.error_seen {
            BlockStatus::Error
        } else {
            BlockStatus::Success
        };
        let done = CompletedBlock {
            marker_id: self.state.active_marker.take().unwrap_or_default(),
            end_line: self.state.current_line,
            status,
            prompt,
        };
        self.state = CaptureState::default();
        done
    }

    /// Keep the window bounded, trimming whole chars from the front
    fn trim_window(&mut self) {
        if self.state.window.len() <= WINDOW_LIMIT {
            return;
        }
        let excess = self.state.window.len() - WINDOW_LIMIT;
        let mut cut = excess;
        while !self.state.window.is_char_boundary(cut) {
            cut += 1;
        }
        self.state.window.drain(..cut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::View;

    fn lifecycle() -> (BlockLifecycle, PatternSet, Instant) {
        let config = EngineConfig::default();
        (
            BlockLifecycle::new(&config),
            PatternSet::new(),
            Instant::now(),
        )
    }

    #[test]
    fn test_prompt_completes_with_success() {
        let (mut lc, patterns, now) = lifecycle();
        lc.begin(1, 10, now);

        assert!(lc.on_output("VRP (R) software\n", 11, now, &patterns).is_none());
        let done = lc.on_output("<Huawei>", 12, now, &patterns).unwrap();

        assert_eq!(done.marker_id, 1);
        assert_eq!(done.end_line, 12);
        assert_eq!(done.status, BlockStatus::Success);
        assert_eq!(done.prompt.unwrap().view, View::User);
        assert!(!lc.is_capturing());
    }

    #[test]
    fn test_error_phrase_classifies_error() {
        let (mut lc, patterns, now) = lifecycle();
        lc.begin(1, 0, now);

        let done = lc
            .on_output("% Unrecognized command\n<Huawei>", 2, now, &patterns)
            .unwrap();
        assert_eq!(done.status, BlockStatus::Error);
    }

    #[test]
    fn test_prompt_split_across_chunks() {
        let (mut lc, patterns, now) = lifecycle();
        lc.begin(1, 0, now);

        assert!(lc.on_output("output\n<Hua", 1, now, &patterns).is_none());
        let done = lc.on_output("wei>", 1, now, &patterns).unwrap();
        assert_eq!(done.status, BlockStatus::Success);
    }

    #[test]
    fn test_timeout_convergence() {
        let (mut lc, patterns, now) = lifecycle();
        lc.begin(1, 5, now);
        lc.on_output("no prompt here\n", 6, now, &patterns);

        // Before the deadline nothing fires
        assert!(lc.tick(now + Duration::from_millis(100)).is_none());

        let done = lc.tick(now + Duration::from_millis(600)).unwrap();
        assert_eq!(done.marker_id, 1);
        assert_eq!(done.end_line, 6);
        assert_eq!(done.status, BlockStatus::Success);

        // Exactly once: the machine is idle afterwards
        assert!(lc.tick(now + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_output_rearms_deadline() {
        let (mut lc, patterns, now) = lifecycle();
        lc.begin(1, 0, now);

        let later = now + Duration::from_millis(400);
        lc.on_output("still going\n", 1, later, &patterns);

        // Old deadline has passed but the chunk pushed it forward
        assert!(lc.tick(now + Duration::from_millis(500)).is_none());
        assert!(lc.tick(later + Duration::from_millis(500)).is_some());
    }

    #[test]
    fn test_timeout_with_error_output() {
        let (mut lc, patterns, now) = lifecycle();
        lc.begin(1, 0, now);
        lc.on_output("sh: bogus: command not found\n", 1, now, &patterns);

        let done = lc.tick(now + Duration::from_secs(1)).unwrap();
        assert_eq!(done.status, BlockStatus::Error);
    }

    #[test]
    fn test_interrupt_is_immediate_error() {
        let (mut lc, patterns, now) = lifecycle();
        lc.begin(1, 3, now);
        lc.on_output("pinging...\n", 4, now, &patterns);

        let done = lc.interrupt().unwrap();
        assert_eq!(done.status, BlockStatus::Error);
        assert_eq!(done.end_line, 4);
        assert!(!lc.is_capturing());
        assert!(lc.interrupt().is_none());
    }

    #[test]
    fn test_supersede_is_success() {
        let (mut lc, patterns, now) = lifecycle();
        lc.begin(1, 0, now);
        lc.on_output("partial", 0, now, &patterns);

        let done = lc.supersede().unwrap();
        assert_eq!(done.marker_id, 1);
        assert_eq!(done.status, BlockStatus::Success);
    }

    #[test]
    fn test_custom_fallback_delay() {
        let config = EngineConfig {
            fallback_delay_ms: 50,
            ..Default::default()
        };
        let mut lc = BlockLifecycle::new(&config);
        let now = Instant::now();
        lc.begin(1, 0, now);

        assert!(lc.tick(now + Duration::from_millis(49)).is_none());
        assert!(lc.tick(now + Duration::from_millis(50)).is_some());
    }

    #[test]
    fn test_idle_ignores_output() {
        let (mut lc, patterns, now) = lifecycle();
        assert!(lc.on_output("<Huawei>", 0, now, &patterns).is_none());
        assert!(lc.tick(now + Duration::from_secs(1)).is_none());
    }
}
