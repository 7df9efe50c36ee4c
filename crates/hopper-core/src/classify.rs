//! File-type classification by name suffix.

use std::path::Path;

/// Suffixes recognised as images.
pub const IMAGE_SUFFIXES: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Suffixes recognised as metadata descriptors.
pub const DESCRIPTOR_SUFFIXES: &[&str] = &[".json"];

/// What kind of file an arrival is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Descriptor,
    Unknown,
}

/// Classify a path by its case-insensitive file-name suffix. No I/O.
pub fn classify(path: &Path) -> FileKind {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return FileKind::Unknown;
    };
    let name = name.to_lowercase();

    if IMAGE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        FileKind::Image
    } else if DESCRIPTOR_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        FileKind::Descriptor
    } else {
        FileKind::Unknown
    }
}
