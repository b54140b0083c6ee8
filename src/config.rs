//! Editor configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Tunable editor behavior, loadable from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Emit the audible bell on unbound keys, failed searches and ambiguous
    /// completions.
    pub bell: bool,
    /// Capacity of the default history ring.
    pub history_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bell: true,
            history_lines: 500,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from the default location, or fall back to the
    /// defaults.
    pub fn load_or_default() -> Self {
        if let Some(config_dir) = dirs_config_path() {
            let config_path = config_dir.join("config.json");
            if config_path.exists() {
                if let Ok(config) = Self::load(&config_path) {
                    return config;
                }
            }
        }
        Self::default()
    }
}

/// Get the configuration directory path.
fn dirs_config_path() -> Option<std::path::PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| std::path::PathBuf::from(home).join(".config").join("keyline"))
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.bell);
        assert_eq!(config.history_lines, 500);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            bell: false,
            history_lines: 42,
        };
        config.save(&path).unwrap();
        let restored = Config::load(&path).unwrap();
        assert!(!restored.bell);
        assert_eq!(restored.history_lines, 42);
    }

    #[test]
    fn test_config_load_missing_file() {
        assert!(Config::load(Path::new("/nonexistent/config.json")).is_err());
    }
}
