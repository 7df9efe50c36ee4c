//! Core data types shared by the watcher, the handler and the relocator.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};

use crate::config::Config;
use crate::error::WatchError;

/// A directory under observation together with its terminal directories.
///
/// Built once at startup and never mutated. [`WatchTarget::prepare`] must run
/// before any event is handled so that the terminal directories exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    dir: PathBuf,
    processed_dir: PathBuf,
    discard_dir: PathBuf,
}

impl WatchTarget {
    /// Describe a target without touching the filesystem.
    pub fn new(
        dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        discard_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dir: dir.into(),
            processed_dir: processed_dir.into(),
            discard_dir: discard_dir.into(),
        }
    }

    /// Use the sibling `processed/` and `discard/` directories of `dir`.
    pub fn with_siblings(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let parent = dir.parent().unwrap_or(&dir).to_path_buf();
        Self {
            processed_dir: parent.join("processed"),
            discard_dir: parent.join("discard"),
            dir,
        }
    }

    /// Build the target described by the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.watch_dir(),
            config.processed_dir(),
            config.discard_dir(),
        )
    }

    /// Create the watch directory and both terminal directories if absent,
    /// then canonicalize every path.
    pub fn prepare(self) -> Result<Self, WatchError> {
        let mut resolved = Vec::with_capacity(3);
        for path in [&self.dir, &self.processed_dir, &self.discard_dir] {
            std::fs::create_dir_all(path).map_err(|source| WatchError::Prepare {
                path: path.clone(),
                source,
            })?;
            let canonical = std::fs::canonicalize(path).map_err(|source| WatchError::Prepare {
                path: path.clone(),
                source,
            })?;
            resolved.push(canonical);
        }
        let discard_dir = resolved.pop().unwrap_or_default();
        let processed_dir = resolved.pop().unwrap_or_default();
        let dir = resolved.pop().unwrap_or_default();
        tracing::debug!(
            dir = %dir.display(),
            processed = %processed_dir.display(),
            discard = %discard_dir.display(),
            "Watch target prepared"
        );
        Ok(Self {
            dir,
            processed_dir,
            discard_dir,
        })
    }

    /// The observed directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a terminal directory.
    pub fn terminal_dir(&self, terminal: Terminal) -> &Path {
        match terminal {
            Terminal::Processed => &self.processed_dir,
            Terminal::Discard => &self.discard_dir,
        }
    }

    /// Whether `path` lies inside the watch directory (lexically).
    pub fn contains(&self, path: &Path) -> bool {
        normalize(path).starts_with(&self.dir)
    }
}

/// Kind of filesystem arrival. Only creation triggers processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalKind {
    Created,
}

/// A single file arrival, consumed by exactly one handler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalEvent {
    pub path: PathBuf,
    pub kind: ArrivalKind,
}

impl ArrivalEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArrivalKind::Created,
        }
    }
}

/// A terminal directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Processed,
    Discard,
}

impl std::fmt::Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Terminal::Processed => write!(f, "processed"),
            Terminal::Discard => write!(f, "discard"),
        }
    }
}

/// Where a relocated file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationOutcome {
    pub terminal: Terminal,
    pub destination: PathBuf,
}

/// Resolve `.` and `..` components without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
