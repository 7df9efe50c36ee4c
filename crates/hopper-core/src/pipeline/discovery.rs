//! Startup scan for descriptors that arrived while nothing was watching.

use std::path::PathBuf;
use walkdir::WalkDir;

use crate::classify::{classify, FileKind};
use crate::types::WatchTarget;

/// List descriptor files sitting directly in the watch directory.
///
/// Sorted by path for deterministic ordering. Subdirectories are not
/// descended into, matching the non-recursive subscription.
pub fn pending_descriptors(target: &WatchTarget) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(target.dir())
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| classify(p) == FileKind::Descriptor)
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finds_only_top_level_descriptors() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("incoming"))
            .prepare()
            .unwrap();
        let dir = target.dir();
        std::fs::write(dir.join("b.json"), "{}").unwrap();
        std::fs::write(dir.join("a.JSON"), "{}").unwrap();
        std::fs::write(dir.join("cat.png"), "x").unwrap();
        std::fs::write(dir.join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/c.json"), "{}").unwrap();

        let found = pending_descriptors(&target);

        assert_eq!(found, vec![dir.join("a.JSON"), dir.join("b.json")]);
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let target = WatchTarget::with_siblings(tmp.path().join("never-created"));
        assert!(pending_descriptors(&target).is_empty());
    }
}
