use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};

/// Top-level mapset entries that belong to the mapset itself (region,
/// variables, search path, scratch space) and are never merged.
pub const MAPSET_PRIVATE_ENTRIES: &[&str] = &["WIND", "VAR", "SEARCH_PATH", ".tmp"];

/// What a tree copy did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Copy the content of `source` into `target`.
///
/// Directories are created as needed and files with the same relative path
/// are overwritten. Top-level [`MAPSET_PRIVATE_ENTRIES`] are skipped.
pub fn copy_tree(source: &Path, target: &Path) -> StoreResult<CopyStats> {
    if !source.is_dir() {
        return Err(StoreError::MapsetNotFound(source.to_path_buf()));
    }
    if !target.is_dir() {
        return Err(StoreError::MapsetNotFound(target.to_path_buf()));
    }

    let mut stats = CopyStats::default();
    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_private(entry.depth(), entry.file_name()));

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
            stats.directories += 1;
        } else {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            stats.bytes += fs::copy(entry.path(), &destination)?;
            stats.files += 1;
        }
    }

    debug!(
        source = %source.display(),
        target = %target.display(),
        files = stats.files,
        bytes = stats.bytes,
        "mapset tree copied"
    );
    Ok(stats)
}

fn is_private(depth: usize, name: &std::ffi::OsStr) -> bool {
    depth == 1
        && name
            .to_str()
            .is_some_and(|name| MAPSET_PRIVATE_ENTRIES.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn copies_nested_tree() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("dst");
        fs::create_dir_all(&target).unwrap();
        write(&source.join("cell").join("elevation"), "raster");
        write(&source.join("vector").join("roads").join("coor"), "lines");

        let stats = copy_tree(&source, &target).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.directories, 3);
        assert_eq!(stats.bytes, 11);
        assert_eq!(
            fs::read_to_string(target.join("vector/roads/coor")).unwrap(),
            "lines"
        );
    }

    #[test]
    fn overwrites_existing_files_and_keeps_others() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("dst");
        write(&source.join("cell").join("a"), "new");
        write(&target.join("cell").join("a"), "old");
        write(&target.join("cell").join("b"), "kept");

        copy_tree(&source, &target).unwrap();
        assert_eq!(fs::read_to_string(target.join("cell/a")).unwrap(), "new");
        assert_eq!(fs::read_to_string(target.join("cell/b")).unwrap(), "kept");
    }

    #[test]
    fn skips_private_entries_at_top_level_only() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("dst");
        fs::create_dir_all(&target).unwrap();
        write(&source.join("WIND"), "region");
        write(&source.join(".tmp").join("scratch"), "x");
        write(&source.join("cell").join("WIND"), "data named WIND");

        let stats = copy_tree(&source, &target).unwrap();
        assert_eq!(stats.files, 1);
        assert!(!target.join("WIND").exists());
        assert!(!target.join(".tmp").exists());
        assert!(target.join("cell/WIND").is_file());
    }

    #[test]
    fn missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("dst");
        fs::create_dir_all(&target).unwrap();
        assert!(matches!(
            copy_tree(&dir.path().join("nope"), &target),
            Err(StoreError::MapsetNotFound(_))
        ));
    }
}
