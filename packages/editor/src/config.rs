use crate::block::BlockType;
use crate::clipboard::PasteAllowList;
use crate::persistence::DEFAULT_AUTOSAVE_MAX_RETRIES;
use crate::styles::Breakpoint;
use crate::undo_stack::{DEFAULT_DEBOUNCE, DEFAULT_MAX_ENTRIES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "blockframe.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Quiet period before a content/style edit becomes an undo entry
    #[serde(default = "default_history_debounce_ms")]
    pub history_debounce_ms: u64,

    /// Undo entries kept (0 = unlimited)
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,

    /// Consecutive autosave failures before autosave pauses
    #[serde(default = "default_autosave_max_retries")]
    pub autosave_max_retries: u32,

    /// Block types accepted from the text clipboard
    #[serde(default)]
    pub paste_allow_list: PasteAllowList,

    #[serde(default)]
    pub default_breakpoint: Breakpoint,
}

fn default_history_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_max_history_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_autosave_max_retries() -> u32 {
    DEFAULT_AUTOSAVE_MAX_RETRIES
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults if the file
    /// is missing
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            Self::from_file(&config_path)
        } else {
            tracing::debug!("No {} in {}, using defaults", DEFAULT_CONFIG_NAME, dir.as_ref().display());
            Ok(Self::default())
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn history_debounce(&self) -> Duration {
        Duration::from_millis(self.history_debounce_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_debounce_ms: default_history_debounce_ms(),
            max_history_entries: default_max_history_entries(),
            autosave_max_retries: default_autosave_max_retries(),
            paste_allow_list: PasteAllowList::new(BlockType::ALL),
            default_breakpoint: Breakpoint::Desktop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "historyDebounceMs": 250,
            "pasteAllowList": ["text", "image"],
            "defaultBreakpoint": "mobile"
        }"#;

        let config: EditorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.history_debounce(), Duration::from_millis(250));
        assert_eq!(config.max_history_entries, 100);
        assert_eq!(config.autosave_max_retries, 3);
        assert!(config.paste_allow_list.allows(BlockType::Image));
        assert!(!config.paste_allow_list.allows(BlockType::Video));
        assert_eq!(config.default_breakpoint, Breakpoint::Mobile);
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.history_debounce_ms, 500);
        assert_eq!(config.default_breakpoint, Breakpoint::Desktop);
        assert!(BlockType::ALL
            .iter()
            .all(|block_type| config.paste_allow_list.allows(*block_type)));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(EditorConfig::load(dir.path()).unwrap(), EditorConfig::default());
    }

    #[test]
    fn test_load_written_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig {
            autosave_max_retries: 5,
            ..EditorConfig::default()
        };
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), config.to_json_pretty().unwrap()).unwrap();

        assert_eq!(EditorConfig::load(dir.path()).unwrap(), config);
    }
}
