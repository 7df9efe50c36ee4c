//! Descriptor parsing and validation.
//!
//! A descriptor is a JSON object sitting next to an image in the watch
//! directory:
//!
//! ```json
//! { "ImagePath": "cat.png", "Caption": "hi", "AuthorKey": "alice" }
//! ```
//!
//! `ApiKey` is accepted as an alias for `AuthorKey`; unknown fields are
//! ignored. Validation never moves the file: the arrival handler decides
//! where a rejected descriptor goes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::types::{normalize, WatchTarget};

/// Comment posted with an upload when the descriptor has no caption.
pub const DEFAULT_CAPTION: &str = "New image uploaded to Slack!";

/// A parsed, structurally valid descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDescriptor {
    /// The descriptor file this record was read from
    pub source: PathBuf,

    /// Image path, resolved against the descriptor's directory
    pub image_path: PathBuf,

    /// Caption to post alongside the image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Key used to look up the display author
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_key: Option<String>,
}

impl ImageDescriptor {
    /// Caption to post, falling back to [`DEFAULT_CAPTION`].
    pub fn comment(&self) -> &str {
        match self.caption.as_deref() {
            Some(caption) if !caption.trim().is_empty() => caption,
            _ => DEFAULT_CAPTION,
        }
    }
}

/// On-disk shape.
#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(rename = "ImagePath")]
    image_path: String,

    #[serde(rename = "Caption", default)]
    caption: Option<String>,

    #[serde(rename = "AuthorKey", alias = "ApiKey", default)]
    author_key: Option<String>,
}

/// Read and validate the descriptor at `path`.
///
/// Returns [`ValidationError::UnreadableFile`] if the file cannot be read,
/// [`ValidationError::InvalidDescriptor`] for malformed or mis-shaped content,
/// and [`ValidationError::OutsideWatchTarget`] if the image path escapes the
/// watch directory, either lexically or through a symlink. The image itself
/// need not exist yet.
pub async fn validate(path: &Path, target: &WatchTarget) -> Result<ImageDescriptor, ValidationError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|source| ValidationError::UnreadableFile {
            path: path.to_path_buf(),
            source,
        })?;
    let descriptor = parse(path, &content, target)?;
    ensure_resolved_inside(&descriptor, target).await?;
    Ok(descriptor)
}

/// Re-check containment on the image's real path. A missing image passes;
/// the upload reports it.
async fn ensure_resolved_inside(
    descriptor: &ImageDescriptor,
    target: &WatchTarget,
) -> Result<(), ValidationError> {
    match tokio::fs::canonicalize(&descriptor.image_path).await {
        Ok(real) if !real.starts_with(target.dir()) => Err(ValidationError::OutsideWatchTarget {
            path: descriptor.source.clone(),
            image: real,
        }),
        _ => Ok(()),
    }
}

/// Validate descriptor content that has already been read.
pub fn parse(path: &Path, content: &[u8], target: &WatchTarget) -> Result<ImageDescriptor, ValidationError> {
    let invalid = |message: String| ValidationError::InvalidDescriptor {
        path: path.to_path_buf(),
        message,
    };

    // Structs deserialize from JSON arrays too; require an object up front.
    let value: serde_json::Value =
        serde_json::from_slice(content).map_err(|e| invalid(e.to_string()))?;
    if !value.is_object() {
        return Err(invalid("expected a JSON object".to_string()));
    }
    let raw: RawDescriptor = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;

    if raw.image_path.trim().is_empty() {
        return Err(invalid("ImagePath is empty".to_string()));
    }

    let image_path = resolve_image_path(path, Path::new(&raw.image_path));
    if !target.contains(&image_path) {
        return Err(ValidationError::OutsideWatchTarget {
            path: path.to_path_buf(),
            image: image_path,
        });
    }

    Ok(ImageDescriptor {
        source: path.to_path_buf(),
        image_path,
        caption: raw.caption,
        author_key: raw.author_key.filter(|k| !k.trim().is_empty()),
    })
}

fn resolve_image_path(descriptor: &Path, image: &Path) -> PathBuf {
    if image.is_absolute() {
        normalize(image)
    } else {
        let base = descriptor.parent().unwrap_or_else(|| Path::new(""));
        normalize(&base.join(image))
    }
}
