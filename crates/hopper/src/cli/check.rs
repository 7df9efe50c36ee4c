//! The `hopper check` command: offline descriptor validation.

use anyhow::Context;
use clap::Args;
use hopper_core::{classify, descriptor, FileKind, ImageDescriptor, WatchTarget};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Descriptor file to validate
    pub descriptor: PathBuf,

    /// Watch directory the image must live in (defaults to the descriptor's directory)
    #[arg(long)]
    pub watch_dir: Option<PathBuf>,
}

/// What `check` prints on success.
#[derive(Debug, Serialize)]
struct CheckReport {
    #[serde(flatten)]
    descriptor: ImageDescriptor,
    image_exists: bool,
}

/// Execute the check command.
///
/// Nothing is uploaded or moved.
pub async fn execute(args: CheckArgs) -> anyhow::Result<()> {
    let report = check(&args.descriptor, args.watch_dir.as_deref()).await?;
    if !report.image_exists {
        tracing::warn!(
            "Image {} does not exist yet; an upload would fail",
            report.descriptor.image_path.display()
        );
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn check(path: &Path, watch_dir: Option<&Path>) -> anyhow::Result<CheckReport> {
    if classify(path) != FileKind::Descriptor {
        anyhow::bail!(
            "Not a descriptor file: {:?}\n\n  Hint: descriptors end in .json.",
            path
        );
    }
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("Cannot open descriptor {}", path.display()))?;

    let dir = match watch_dir {
        Some(dir) => dir.to_path_buf(),
        None => path
            .parent()
            .map(Path::to_path_buf)
            .context("Descriptor has no parent directory")?,
    };
    let dir = std::fs::canonicalize(&dir)
        .with_context(|| format!("Cannot open watch directory {}", dir.display()))?;

    let target = WatchTarget::with_siblings(dir);
    let descriptor = descriptor::validate(&path, &target).await?;
    let image_exists = descriptor.image_path.is_file();
    Ok(CheckReport {
        descriptor,
        image_exists,
    })
}
