//! Configuration management for Hopper.
//!
//! Configuration is loaded from the platform config directory with defaults for
//! every field, so a partial file (or no file at all) is valid.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Hopper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Watch directory layout
    pub watch: WatchConfig,

    /// Event queue and scheduling
    pub pipeline: PipelineConfig,

    /// Slack sink settings
    pub sink: SinkConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.hopper.hopper/config.toml
    /// - Linux: ~/.config/hopper/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\hopper\config\config.toml
    ///
    /// Falls back to ~/.hopper/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "hopper", "hopper")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".hopper").join("config.toml")
            })
    }

    /// Resolved watch directory (with ~ expansion).
    pub fn watch_dir(&self) -> PathBuf {
        expand_tilde(&self.watch.dir)
    }

    /// Resolved processed directory, defaulting to a sibling of the watch directory.
    pub fn processed_dir(&self) -> PathBuf {
        self.terminal_dir(&self.watch.processed_dir, "processed")
    }

    /// Resolved discard directory, defaulting to a sibling of the watch directory.
    pub fn discard_dir(&self) -> PathBuf {
        self.terminal_dir(&self.watch.discard_dir, "discard")
    }

    /// Resolved credentials directory (with ~ expansion).
    pub fn credentials_dir(&self) -> PathBuf {
        expand_tilde(&self.watch.credentials_dir)
    }

    fn terminal_dir(&self, configured: &Path, name: &str) -> PathBuf {
        if !configured.as_os_str().is_empty() {
            return expand_tilde(configured);
        }
        let watch_dir = self.watch_dir();
        watch_dir.parent().unwrap_or(&watch_dir).join(name)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.buffer_size, 100);
        assert_eq!(config.pipeline.ordering, OrderingMode::Strict);
        assert_eq!(config.pipeline.on_upload_failure, UploadFailurePolicy::Leave);
        assert_eq!(config.sink.timeout_ms, 30_000);
        assert_eq!(config.sink.retry_attempts, 0);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[watch]"));
        assert!(toml.contains("[pipeline]"));
        assert!(toml.contains("ordering = \"strict\""));
    }

    #[test]
    fn test_terminal_dirs_default_to_siblings() {
        let mut config = Config::default();
        config.watch.dir = PathBuf::from("/srv/drop/incoming");
        assert_eq!(config.processed_dir(), PathBuf::from("/srv/drop/processed"));
        assert_eq!(config.discard_dir(), PathBuf::from("/srv/drop/discard"));
    }

    #[test]
    fn test_terminal_dirs_honour_overrides() {
        let mut config = Config::default();
        config.watch.dir = PathBuf::from("/srv/drop/incoming");
        config.watch.processed_dir = PathBuf::from("/archive/done");
        assert_eq!(config.processed_dir(), PathBuf::from("/archive/done"));
        assert_eq!(config.discard_dir(), PathBuf::from("/srv/drop/discard"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            ordering = "best_effort"
            on_upload_failure = "discard"
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.ordering, OrderingMode::BestEffort);
        assert_eq!(config.pipeline.on_upload_failure, UploadFailurePolicy::Discard);
        assert_eq!(config.pipeline.buffer_size, 100);
        assert_eq!(config.sink.token, "${SLACK_TOKEN}");
    }

    #[test]
    fn test_resolve_env_var() {
        assert_eq!(resolve_env_var("xoxb-plain"), Some("xoxb-plain".to_string()));
        assert_eq!(resolve_env_var(""), None);
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_HOPPER_123}"), None);
    }
}
