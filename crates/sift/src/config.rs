//! Engine configuration.

use std::path::PathBuf;

use sift_protocol::plan::PLAN_TOOL_NAME;

/// Placeholder title for a session that has not been named yet.
pub const SENTINEL_TITLE: &str = "New Chat";

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the persisted session entries.
    pub storage_dir: PathBuf,

    /// Tool name whose call payloads carry automation plans.
    pub plan_tool_name: String,

    /// Placeholder title assigned to new sessions.
    pub sentinel_title: String,

    /// Maximum derived-title length in characters before truncation.
    pub title_max_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            plan_tool_name: PLAN_TOOL_NAME.to_string(),
            sentinel_title: SENTINEL_TITLE.to_string(),
            title_max_chars: 50,
        }
    }
}

impl Config {
    /// Configuration rooted at an explicit storage directory.
    pub fn with_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sift")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sentinel_title, "New Chat");
        assert_eq!(config.title_max_chars, 50);
        assert_eq!(config.plan_tool_name, "progressive_todos");
        assert!(config.storage_dir.ends_with("sift"));
    }

    #[test]
    fn test_with_storage_dir() {
        let config = Config::with_storage_dir("/tmp/sift-test");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/sift-test"));
        assert_eq!(config.sentinel_title, "New Chat");
    }
}
