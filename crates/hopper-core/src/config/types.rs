//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Watch directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory observed for new arrivals
    pub dir: PathBuf,

    /// Terminal directory for handled descriptors.
    /// Empty means `<dir>/../processed`.
    pub processed_dir: PathBuf,

    /// Terminal directory for rejected descriptors.
    /// Empty means `<dir>/../discard`.
    pub discard_dir: PathBuf,

    /// Directory holding one `<key>.toml` per author key
    pub credentials_dir: PathBuf,

    /// Enqueue descriptor files already present when watching starts
    pub scan_existing: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("~/hopper/incoming"),
            processed_dir: PathBuf::new(),
            discard_dir: PathBuf::new(),
            credentials_dir: PathBuf::from("~/.hopper/credentials"),
            scan_existing: false,
        }
    }
}

/// How arrival events are scheduled onto the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// One event at a time, in the order events were queued
    #[default]
    Strict,
    /// A task per event; tasks take turns on the exclusivity token
    BestEffort,
}

/// What happens to a descriptor whose upload failed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailurePolicy {
    /// Leave the descriptor in the watch directory for manual retry
    #[default]
    Leave,
    /// Move the descriptor to the discard directory
    Discard,
}

/// What happens when the destination already holds a file with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Pick the first free `name_N.ext`
    #[default]
    Suffix,
    /// Fail the relocation
    Reject,
}

/// Event queue and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max arrival events buffered before the watcher blocks
    pub buffer_size: usize,

    /// Scheduling mode
    pub ordering: OrderingMode,

    /// Max spawned handler tasks in best-effort mode
    pub max_in_flight: usize,

    /// Fate of a descriptor whose upload failed
    pub on_upload_failure: UploadFailurePolicy,

    /// Name collision handling in terminal directories
    pub collision: CollisionPolicy,

    /// A descriptor must keep a non-zero, unchanged size this long before it
    /// is read. 0 reads immediately.
    pub settle_ms: u64,

    /// Upper bound on the settle wait; the descriptor is read regardless after this
    pub settle_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            ordering: OrderingMode::Strict,
            max_in_flight: 16,
            on_upload_failure: UploadFailurePolicy::Leave,
            collision: CollisionPolicy::Suffix,
            settle_ms: 250,
            settle_timeout_ms: 5_000,
        }
    }
}

/// Slack sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Bot token (supports ${ENV_VAR} syntax)
    pub token: String,

    /// Target channel ID (supports ${ENV_VAR} syntax)
    pub channel: String,

    /// Web API base URL
    pub api_base: String,

    /// Per-upload timeout in milliseconds
    pub timeout_ms: u64,

    /// Extra attempts for transient failures
    pub retry_attempts: u32,

    /// Backoff base delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            token: "${SLACK_TOKEN}".to_string(),
            channel: "${SLACK_CHANNEL}".to_string(),
            api_base: "https://slack.com/api".to_string(),
            timeout_ms: 30_000,
            retry_attempts: 0,
            retry_delay_ms: 1000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
