//! Filesystem object store for result bodies and headers.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use probe::{ObjectStore, StorageError};
use tokio::fs;
use uuid::Uuid;

/// Objects are plain files under `root`, addressed by their relative path
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map an object path to a file, refusing anything that escapes the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let normal = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !normal {
            return Err(StorageError::blob(format!("invalid object path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(StorageError::blob)?;
        }

        // Readers never see a half written object
        let staging = target.with_extension(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&staging, data).await.map_err(StorageError::blob)?;
        fs::rename(&staging, &target).await.map_err(StorageError::blob)
    }

    async fn get_object(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.resolve(path)?).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::blob(e)),
        }
    }

    async fn delete_object(&self, path: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.resolve(path)?).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(StorageError::blob(e)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store.put_object("acc/mon/res/body", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get_object("acc/mon/res/body").await.unwrap(), Some(b"hello".to_vec()));

        store.put_object("acc/mon/res/body", b"again".to_vec()).await.unwrap();
        assert_eq!(store.get_object("acc/mon/res/body").await.unwrap(), Some(b"again".to_vec()));

        store.delete_object("acc/mon/res/body").await.unwrap();
        assert_eq!(store.get_object("acc/mon/res/body").await.unwrap(), None);
        store.delete_object("acc/mon/res/body").await.unwrap();
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("objects"));

        for path in ["../outside", "/etc/passwd", "acc/../../x", ""] {
            assert!(store.put_object(path, Vec::new()).await.is_err(), "{path} was accepted");
        }
    }
}
