//! Waits for a freshly created descriptor to finish being written.
//!
//! A creation event fires as soon as the file exists, usually before the
//! writer has flushed its content. The handler polls the file's size and
//! modification time and only reads it once both have been unchanged (and the
//! size non-zero) for a quiet window.

use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

use crate::config::PipelineConfig;

const MIN_POLL: Duration = Duration::from_millis(5);
const MAX_POLL: Duration = Duration::from_millis(50);

/// Quiet window and upper bound for the settle wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleOptions {
    pub quiet: Duration,
    pub timeout: Duration,
}

impl SettleOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            quiet: Duration::from_millis(config.settle_ms),
            timeout: Duration::from_millis(config.settle_timeout_ms),
        }
    }

    /// Read files as soon as they arrive.
    pub fn immediate() -> Self {
        Self {
            quiet: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }
}

impl Default for SettleOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// How the settle wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Size and mtime held still for the quiet window
    Stable,
    /// The file disappeared while waiting
    Vanished,
    /// Still empty or changing when the timeout ran out
    TimedOut,
}

/// Poll `path` until it settles, vanishes or the timeout elapses.
pub async fn wait_until_settled(path: &Path, options: &SettleOptions) -> Settled {
    if options.quiet.is_zero() {
        return Settled::Stable;
    }
    let poll = (options.quiet / 5).clamp(MIN_POLL, MAX_POLL);
    let deadline = Instant::now() + options.timeout;
    let mut last: Option<(u64, Option<SystemTime>)> = None;
    let mut unchanged_since = Instant::now();

    loop {
        let Ok(meta) = tokio::fs::metadata(path).await else {
            return Settled::Vanished;
        };
        let snapshot = (meta.len(), meta.modified().ok());
        let now = Instant::now();
        if last != Some(snapshot) {
            last = Some(snapshot);
            unchanged_since = now;
        } else if snapshot.0 > 0 && now.duration_since(unchanged_since) >= options.quiet {
            return Settled::Stable;
        }
        if now >= deadline {
            return Settled::TimedOut;
        }
        tokio::time::sleep(poll).await;
    }
}
