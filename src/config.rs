//! Engine configuration
//!
//! This module provides TOML configuration loading from
//! `~/.termblocks/config.toml`. All values are optional and degrade to
//! the built-in defaults; a missing or malformed file is never an error.
//!
//! # Configuration File
//!
//! ```toml
//! # Lines of output tail scanned for a prompt
//! prompt_window_lines = 3
//!
//! # Silence (ms) after which a running block is force-completed
//! fallback_delay_ms = 500
//!
//! # Retained markers per session (oldest evicted beyond this)
//! marker_ceiling = 500
//!
//! # Maximum entries returned by command history queries
//! history_limit = 50
//!
//! # Answer VRP "---- More ----" pagination automatically
//! auto_pagination = true
//!
//! # Extra recognizers for dialects the built-in set doesn't cover
//! custom_prompt_patterns = ['RP/0/RP0/CPU0:\S+#\s*$']
//! custom_error_patterns = ['%Error']
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    NoConfigPath,
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write config: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine tunables
///
/// The prompt window and fallback delay are empirically tuned heuristics,
/// not load-bearing constants; both are exposed here so hosts can adjust
/// them per device family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lines of output tail scanned for a prompt
    pub prompt_window_lines: usize,
    /// Silence after which a running block is force-completed, in ms
    pub fallback_delay_ms: u64,
    /// Retained markers per session
    pub marker_ceiling: usize,
    /// Maximum entries returned by command history queries
    pub history_limit: usize,
    /// Answer pagination continuation prompts automatically
    pub auto_pagination: bool,
    /// Extra prompt regexes evaluated after the built-in shapes
    pub custom_prompt_patterns: Vec<String>,
    /// Extra case-insensitive error regexes
    pub custom_error_patterns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prompt_window_lines: 3,
            fallback_delay_ms: 500,
            marker_ceiling: 500,
            history_limit: 50,
            auto_pagination: true,
            custom_prompt_patterns: Vec::new(),
            custom_error_patterns: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::get_config_path().ok_or(ConfigError::NoConfigPath)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Fallback delay as a `Duration`
    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let dir = home.join(".termblocks");
            if !dir.exists() {
                let _ = fs::create_dir_all(&dir);
            }
            return Some(dir.join("config.toml"));
        }
        None
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.prompt_window_lines, 3);
        assert_eq!(config.fallback_delay(), Duration::from_millis(500));
        assert_eq!(config.marker_ceiling, 500);
        assert!(config.auto_pagination);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str("fallback_delay_ms = 250").unwrap();
        assert_eq!(config.fallback_delay_ms, 250);
        assert_eq!(config.prompt_window_lines, 3);
    }
}
