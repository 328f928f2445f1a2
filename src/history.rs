//! Command history ranking
//!
//! Derives a deduplicated command history from a session's markers for
//! suggestion features. Nothing here is stored independently; the view
//! is rebuilt on demand from the marker store.

use std::collections::HashMap;

use crate::markers::Marker;

/// Ordering strategy for history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStrategy {
    /// Most recently used first
    Recent,
    /// Most frequently used first, ties kept stable
    Frequency,
    /// Frequency weighted by recency decay
    Combined,
}

/// One distinct command, aggregated over all its submissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub command: String,
    /// Unix ms of the most recent submission
    pub last_used: u64,
    /// Submissions of this command within the retained history
    pub count: usize,
}

impl HistoryEntry {
    /// Combined ranking score: frequency damped by hours since last use
    fn score(&self, now_ms: u64) -> f64 {
        let hours = now_ms.saturating_sub(self.last_used) as f64 / 3_600_000.0;
        self.count as f64 / (1.0 + hours)
    }
}

/// Deduplicate markers by command text, newest first.
/// Each command keeps its most recent timestamp and a submit count.
pub fn entries(markers: &[Marker]) -> Vec<HistoryEntry> {
    let mut result: Vec<HistoryEntry> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for marker in markers.iter().rev() {
        let command = marker.command.trim();
        if command.is_empty() {
            continue;
        }
        match seen.get(command) {
            Some(&idx) => result[idx].count += 1,
            None => {
                seen.insert(command, result.len());
                result.push(HistoryEntry {
                    command: command.to_string(),
                    last_used: marker.created_at,
                    count: 1,
                });
            }
        }
    }

    result
}

/// Distinct command strings ordered by `strategy`, at most `limit` long
pub fn ranked_commands(
    markers: &[Marker],
    strategy: HistoryStrategy,
    limit: usize,
    now_ms: u64,
) -> Vec<String> {
    let mut entries = entries(markers);

    match strategy {
        HistoryStrategy::Recent => {}
        HistoryStrategy::Frequency => {
            entries.sort_by(|a, b| b.count.cmp(&a.count));
        }
        HistoryStrategy::Combined => {
            entries.sort_by(|a, b| {
                b.score(now_ms)
                    .partial_cmp(&a.score(now_ms))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }

    entries
        .into_iter()
        .take(limit)
        .map(|e| e.command)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::BlockStatus;

    fn marker(command: &str, created_at: u64) -> Marker {
        Marker {
            id: 0,
            session_id: "s1".to_string(),
            command: command.to_string(),
            created_at,
            status: BlockStatus::Success,
            collapsed: false,
            start_line: 0,
            end_line: Some(0),
        }
    }

    #[test]
    fn test_recent_ordering() {
        // Submitted in order A, B, A, C
        let markers = vec![
            marker("A", 1000),
            marker("B", 2000),
            marker("A", 3000),
            marker("C", 4000),
        ];
        let history = ranked_commands(&markers, HistoryStrategy::Recent, 10, 5000);
        assert_eq!(history, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_frequency_ordering() {
        let markers = vec![
            marker("A", 1000),
            marker("B", 2000),
            marker("A", 3000),
            marker("C", 4000),
        ];
        let history = ranked_commands(&markers, HistoryStrategy::Frequency, 10, 5000);
        assert_eq!(history[0], "A");
        // Ties stay in recent order
        assert_eq!(&history[1..], &["C", "B"]);
    }

    #[test]
    fn test_combined_favors_frequency_when_recent() {
        let hour = 3_600_000u64;
        let now = 100 * hour;
        // A submitted three times an hour ago, C once just now
        let markers = vec![
            marker("A", now - hour),
            marker("A", now - hour),
            marker("A", now - hour),
            marker("C", now),
        ];
        let history = ranked_commands(&markers, HistoryStrategy::Combined, 10, now);
        assert_eq!(history[0], "A");
    }

    #[test]
    fn test_combined_decays_stale_commands() {
        let hour = 3_600_000u64;
        let now = 100 * hour;
        // A submitted twice ten hours ago scores 2/11; C just now scores 1
        let markers = vec![
            marker("A", now - 10 * hour),
            marker("A", now - 10 * hour),
            marker("C", now),
        ];
        let history = ranked_commands(&markers, HistoryStrategy::Combined, 10, now);
        assert_eq!(history[0], "C");
    }

    #[test]
    fn test_limit_and_empty_commands() {
        let markers = vec![
            marker("A", 1000),
            marker("", 1500),
            marker("B", 2000),
            marker("C", 3000),
        ];
        let history = ranked_commands(&markers, HistoryStrategy::Recent, 2, 5000);
        assert_eq!(history, vec!["C", "B"]);
    }
}
