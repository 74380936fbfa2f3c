//! Directory-backed object store.

use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::ObjectStore;
use crate::core::ensure_parent_dir;
use crate::errors::StorageError;

/// Stores each object at `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(bucket).join(key);
        let contained = !bucket.is_empty()
            && !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if contained {
            Ok(self.root.join(relative))
        } else {
            Err(StorageError::backend(bucket, key, "key escapes the storage root"))
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => StorageError::Io {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: e,
            },
        })
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        let io_err = |source| StorageError::Io {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        };
        ensure_parent_dir(&path).await.map_err(io_err)?;
        tokio::fs::write(&path, body).await.map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        store.put("b", "p/nested/a.txt", b"hello".to_vec()).await.unwrap();
        assert!(tmp.path().join("b/p/nested/a.txt").is_file());
        assert_eq!(store.get("b", "p/nested/a.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        let err = store.get("b", "p/missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        assert!(store.put("b", "../outside", b"x".to_vec()).await.is_err());
        assert!(store.get("", "k").await.is_err());
    }
}
