//! Configuration file parser for ~/.config/roost/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Reject pathological config files before parsing (64 KiB is generous).
const MAX_CONFIG_SIZE: u64 = 64 * 1024;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file path override. Empty = default location under the
    /// config directory.
    pub database_path: String,

    /// Skin to load when the settings store has no selection yet.
    pub default_skin: String,

    /// Whether the proxy hides feeds with zero unread messages by default.
    pub hide_read_feeds: bool,

    /// Whether destructive operations (clear, delete account) require
    /// confirmation when invoked without `--yes`.
    pub confirm_destructive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: String::new(),
            default_skin: crate::skin::DEFAULT_SKIN.to_string(),
            hide_read_feeds: false,
            confirm_destructive: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file. A missing file is not an
    /// error; it yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let size = std::fs::metadata(path)?.len();
        if size > MAX_CONFIG_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "{} bytes (limit {})",
                size, MAX_CONFIG_SIZE
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(config.confirm_destructive);
        assert!(!config.hide_read_feeds);
        assert_eq!(config.default_skin, crate::skin::DEFAULT_SKIN);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str("hide_read_feeds = true").unwrap();
        assert!(config.hide_read_feeds);
        assert!(config.confirm_destructive);
    }

    #[test]
    fn unknown_keys_ignored() {
        let config: Config = toml::from_str("not_a_real_key = 1").unwrap();
        assert_eq!(config.database_path, "");
    }
}
