//! Prompt and error pattern set
//!
//! Recognizer patterns for dialect-specific command prompts and error
//! phrases. Prompt detection drives block completion; error detection
//! decides the block status. The built-in set covers Huawei VRP view
//! prompts and generic POSIX shells; additional regexes can be appended
//! at runtime so new device dialects don't require code changes.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::warn;

/// Router CLI view modes, inferred from the prompt shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// `<Huawei>` - user view
    User,
    /// `[Huawei]` - system view
    System,
    /// `[Huawei-GigabitEthernet0/0/1]` - interface view
    Interface,
    /// POSIX shell prompt (`$`, `#`, `%`)
    Shell,
    /// Matched a custom pattern, or not yet determined
    Unknown,
}

/// A successful prompt match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMatch {
    /// Which view the prompt shape belongs to
    pub view: View,
    /// Host identifier extracted from the prompt, if the shape carries one
    pub hostname: Option<String>,
}

// Built-in shapes, compiled once
static USER_VIEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>]+)>\s*$").unwrap());

static SYSTEM_VIEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]\s*$").unwrap());

// bash/zsh style: user@host:~/dir$
static USER_HOST_SHELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.-]+@[\w.-]+:[^\n]*[$#%]\s*$").unwrap());

// Bare shell or switch prompt: "$ ", "# ", "Switch#". Anchored to the
// line start so output that merely ends in one of these characters
// (e.g. "usage 95%") doesn't read as a prompt.
static BARE_SHELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[~/\w.-]{0,32}[$#%]\s*$").unwrap());

static PAGINATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"----\s*More\s*----").unwrap());

// A lone caret line is how VRP points at the rejected token
static CARET_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\^\s*$").unwrap());

/// Case-insensitive phrases that classify a block as failed
const ERROR_PHRASES: &[&str] = &[
    "command not found",
    "permission denied",
    "% unrecognized command",
    "% wrong parameter",
    "% incomplete command",
    "% too many parameters",
    "unknown command",
    "invalid input",
    "syntax error",
    "connection refused",
    "no such file or directory",
];

/// Extensible prompt/error recognizer set
///
/// The built-in shapes are always active; custom regexes from
/// configuration are evaluated after them. Any single prompt match
/// signals completion, any single error match classifies the block
/// as failed.
pub struct PatternSet {
    custom_prompts: Vec<Regex>,
    custom_errors: Vec<Regex>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSet {
    /// Built-in shapes only
    pub fn new() -> Self {
        Self {
            custom_prompts: Vec::new(),
            custom_errors: Vec::new(),
        }
    }

    /// Built-in shapes plus custom regexes (typically from config).
    /// Patterns that fail to compile are skipped with a warning.
    pub fn with_custom(prompts: &[String], errors: &[String]) -> Self {
        let mut set = Self::new();
        for pattern in prompts {
            match Regex::new(pattern) {
                Ok(re) => set.custom_prompts.push(re),
                Err(e) => warn!(pattern = %pattern, error = %e, "Invalid prompt pattern, skipped"),
            }
        }
        for pattern in errors {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => set.custom_errors.push(re),
                Err(e) => warn!(pattern = %pattern, error = %e, "Invalid error pattern, skipped"),
            }
        }
        set
    }

    /// Test the last `window_lines` lines of `text` for a prompt.
    ///
    /// Only the tail of the output is examined so prompt-like substrings
    /// earlier in a long listing can't terminate the block. Lines are
    /// scanned newest-first; the first matching shape wins.
    pub fn match_prompt(&self, text: &str, window_lines: usize) -> Option<PromptMatch> {
        let mut lines: Vec<&str> = text.lines().rev().take(window_lines.max(1)).collect();
        if lines.is_empty() {
            lines.push(text);
        }
        lines.iter().find_map(|line| self.match_prompt_line(line))
    }

    /// Test a single line against all prompt shapes
    pub fn match_prompt_line(&self, line: &str) -> Option<PromptMatch> {
        // Pagination continuation looks nothing like a prompt, but guard
        // anyway: it must never complete a block.
        if PAGINATION_RE.is_match(line) {
            return None;
        }

        if let Some(caps) = USER_VIEW_RE.captures(line) {
            let hostname = caps.get(1).map(|m| m.as_str().to_string());
            return Some(PromptMatch {
                view: View::User,
                hostname,
            });
        }

        if let Some(caps) = SYSTEM_VIEW_RE.captures(line) {
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            // Interface views carry a hyphenated suffix: [Huawei-Gi0/0/1]
            return Some(if let Some((host, _)) = inner.split_once('-') {
                PromptMatch {
                    view: View::Interface,
                    hostname: Some(host.to_string()),
                }
            } else {
                PromptMatch {
                    view: View::System,
                    hostname: Some(inner.to_string()),
                }
            });
        }

        if USER_HOST_SHELL_RE.is_match(line) || BARE_SHELL_RE.is_match(line) {
            return Some(PromptMatch {
                view: View::Shell,
                hostname: None,
            });
        }

        for re in &self.custom_prompts {
            if re.is_match(line) {
                return Some(PromptMatch {
                    view: View::Unknown,
                    hostname: None,
                });
            }
        }

        None
    }

    /// Whether the accumulated output contains any error signal.
    /// Unlike prompt detection this scans the whole text.
    pub fn has_error(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if ERROR_PHRASES.iter().any(|p| lower.contains(p)) {
            return true;
        }
        if CARET_LINE_RE.is_match(text) {
            return true;
        }
        self.custom_errors.iter().any(|re| re.is_match(text))
    }

    /// Whether the text contains the VRP pagination continuation marker
    pub fn has_pagination(&self, text: &str) -> bool {
        PAGINATION_RE.is_match(text)
    }

    /// Strip pagination markers from a buffered line
    pub fn strip_pagination(&self, text: &str) -> String {
        PAGINATION_RE.replace_all(text, "").to_string()
    }
}
