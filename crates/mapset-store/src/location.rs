use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mapset_merge::{BackendError, MapsetCatalog, MergeExecutor};
use mapset_types::{LocationName, MapsetName};
use tracing::info;

use crate::copy::copy_tree;
use crate::error::{StoreError, StoreResult};

/// A database root holding locations and their mapsets on disk.
#[derive(Clone, Debug)]
pub struct FsLocation {
    root: PathBuf,
}

impl FsLocation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location_path(&self, location: &LocationName) -> PathBuf {
        self.root.join(location.as_str())
    }

    pub fn mapset_path(&self, location: &LocationName, mapset: &MapsetName) -> PathBuf {
        self.location_path(location).join(mapset.as_str())
    }

    /// Create an empty mapset directory.
    pub fn create_mapset(&self, location: &LocationName, mapset: &MapsetName) -> StoreResult<PathBuf> {
        let path = self.mapset_path(location, mapset);
        fs::create_dir_all(self.location_path(location))?;
        match fs::create_dir(&path) {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::MapsetExists(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all mapset directories in a location, sorted.
    ///
    /// Directories whose names are not valid mapset names are ignored.
    pub fn list_mapsets(&self, location: &LocationName) -> StoreResult<Vec<MapsetName>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.location_path(location))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(mapset) = MapsetName::new(name) {
                    names.push(mapset);
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl MapsetCatalog for FsLocation {
    async fn exists(&self, location: &LocationName, mapset: &MapsetName) -> Result<bool, BackendError> {
        match tokio::fs::metadata(self.mapset_path(location, mapset)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MergeExecutor for FsLocation {
    async fn merge_into(
        &self,
        location: &LocationName,
        source: &MapsetName,
        target: &MapsetName,
    ) -> Result<(), BackendError> {
        let source_path = self.mapset_path(location, source);
        let target_path = self.mapset_path(location, target);
        let stats = tokio::task::spawn_blocking(move || copy_tree(&source_path, &target_path))
            .await
            .map_err(StoreError::from)??;
        info!(
            location = %location,
            source = %source,
            target = %target,
            files = stats.files,
            bytes = stats.bytes,
            "mapset merged"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loc() -> LocationName {
        LocationName::new("nc").unwrap()
    }

    fn mapset(name: &str) -> MapsetName {
        MapsetName::new(name).unwrap()
    }

    #[tokio::test]
    async fn exists_tracks_directories() {
        let dir = TempDir::new().unwrap();
        let store = FsLocation::new(dir.path());
        assert!(!store.exists(&loc(), &mapset("A")).await.unwrap());

        store.create_mapset(&loc(), &mapset("A")).unwrap();
        assert!(store.exists(&loc(), &mapset("A")).await.unwrap());

        fs::write(store.location_path(&loc()).join("file"), "x").unwrap();
        assert!(!store.exists(&loc(), &mapset("file")).await.unwrap());
    }

    #[test]
    fn create_twice_fails() {
        let dir = TempDir::new().unwrap();
        let store = FsLocation::new(dir.path());
        store.create_mapset(&loc(), &mapset("A")).unwrap();
        assert!(matches!(
            store.create_mapset(&loc(), &mapset("A")),
            Err(StoreError::MapsetExists(_))
        ));
    }

    #[test]
    fn list_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let store = FsLocation::new(dir.path());
        store.create_mapset(&loc(), &mapset("b")).unwrap();
        store.create_mapset(&loc(), &mapset("a")).unwrap();
        fs::create_dir(store.location_path(&loc()).join("bad name")).unwrap();

        assert_eq!(store.list_mapsets(&loc()).unwrap(), vec![mapset("a"), mapset("b")]);
    }

    #[tokio::test]
    async fn merge_copies_into_target() {
        let dir = TempDir::new().unwrap();
        let store = FsLocation::new(dir.path());
        let source = store.create_mapset(&loc(), &mapset("S")).unwrap();
        store.create_mapset(&loc(), &mapset("T")).unwrap();
        fs::create_dir(source.join("cell")).unwrap();
        fs::write(source.join("cell").join("dem"), "dem").unwrap();

        store.merge_into(&loc(), &mapset("S"), &mapset("T")).await.unwrap();
        let copied = store.mapset_path(&loc(), &mapset("T")).join("cell").join("dem");
        assert_eq!(fs::read_to_string(copied).unwrap(), "dem");
    }

    #[tokio::test]
    async fn merge_from_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let store = FsLocation::new(dir.path());
        store.create_mapset(&loc(), &mapset("T")).unwrap();
        let err = store
            .merge_into(&loc(), &mapset("gone"), &mapset("T"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }
}
