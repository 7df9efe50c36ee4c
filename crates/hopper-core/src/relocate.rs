//! Moves handled files into the terminal directories.
//!
//! Once a file leaves the watch directory the watcher can no longer see it,
//! so a later duplicate notification for the same name finds nothing to do.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub use crate::config::CollisionPolicy;
use crate::error::RelocationError;
use crate::types::{RelocationOutcome, Terminal, WatchTarget};

/// Moves files from the watch directory into `processed` or `discard`.
#[derive(Debug, Clone)]
pub struct Relocator {
    target: WatchTarget,
    collision: CollisionPolicy,
}

impl Relocator {
    pub fn new(target: WatchTarget, collision: CollisionPolicy) -> Self {
        Self { target, collision }
    }

    /// Move `path` into the `terminal` directory, keeping its file name.
    ///
    /// The destination directory is created on demand. Name collisions are
    /// resolved according to the configured [`CollisionPolicy`]; an existing
    /// file is never overwritten.
    pub async fn relocate(
        &self,
        path: &Path,
        terminal: Terminal,
    ) -> Result<RelocationOutcome, RelocationError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| RelocationError::SourceMissing(path.to_path_buf()))?;

        if !exists(path).await {
            return Err(RelocationError::SourceMissing(path.to_path_buf()));
        }

        let dest_dir = self.target.terminal_dir(terminal);
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| RelocationError::CreateDir {
                path: dest_dir.to_path_buf(),
                source,
            })?;

        let destination = self.reserve_destination(path, dest_dir, file_name).await?;
        if let Err(e) = move_file(path, &destination).await {
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(e);
        }

        tracing::debug!(
            from = %path.display(),
            to = %destination.display(),
            "Relocated to {terminal}"
        );
        Ok(RelocationOutcome {
            terminal,
            destination,
        })
    }

    /// Claim a free name in `dest_dir` by creating an empty placeholder, which
    /// the move then replaces. A file that appears concurrently is never
    /// overwritten.
    async fn reserve_destination(
        &self,
        source: &Path,
        dest_dir: &Path,
        file_name: &OsStr,
    ) -> Result<PathBuf, RelocationError> {
        let direct = dest_dir.join(file_name);
        if claim(source, &direct).await? {
            return Ok(direct);
        }
        if self.collision == CollisionPolicy::Reject {
            return Err(RelocationError::DestinationExists(direct));
        }

        let name = Path::new(file_name);
        let stem = name
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("file");
        let ext = name.extension().and_then(OsStr::to_str).unwrap_or("");
        let mut n = 1u32;
        loop {
            let candidate = if ext.is_empty() {
                format!("{stem}_{n}")
            } else {
                format!("{stem}_{n}.{ext}")
            };
            let alt = dest_dir.join(candidate);
            if claim(source, &alt).await? {
                return Ok(alt);
            }
            n += 1;
        }
    }
}

/// Create `path` only if nothing is there. `Ok(false)` when it is taken.
async fn claim(source: &Path, path: &Path) -> Result<bool, RelocationError> {
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(RelocationError::Move {
            from: source.to_path_buf(),
            to: path.to_path_buf(),
            source: e,
        }),
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

/// Rename, falling back to copy-and-remove when the terminal directory sits
/// on another filesystem.
async fn move_file(from: &Path, to: &Path) -> Result<(), RelocationError> {
    let rename_err = match tokio::fs::rename(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound && !exists(from).await => {
            return Err(RelocationError::SourceMissing(from.to_path_buf()));
        }
        Err(e) => e,
    };

    if tokio::fs::copy(from, to).await.is_err() {
        return Err(RelocationError::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: rename_err,
        });
    }
    if let Err(source) = tokio::fs::remove_file(from).await {
        // Keep a single copy of the file.
        let _ = tokio::fs::remove_file(to).await;
        return Err(RelocationError::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        });
    }
    Ok(())
}
