//! Object store port and its backends.
//!
//! The worker only ever needs two operations: fetch an object's bytes and
//! write an object's bytes. Everything else (credentials, regions,
//! endpoints) belongs to the backend.

mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use base64::Engine as _;
use md5::{Digest, Md5};
use std::sync::Arc;

use crate::config::StorageBackendConfig;
use crate::errors::StorageError;

#[cfg(test)]
use mockall::automock;

/// A bucket/key addressed object store.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches the object's bytes.
    ///
    /// A missing object is reported as [`StorageError::NotFound`].
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Writes the object, replacing any previous content.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError>;
}

/// Builds the key of `name` under `prefix`.
///
/// An empty prefix addresses `name` at the bucket root.
#[must_use]
pub fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Base64-encoded MD5 digest, the form object stores expect in `Content-MD5`.
#[must_use]
pub fn content_md5(body: &[u8]) -> String {
    let digest = Md5::digest(body);
    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// Constructs the configured backend.
pub async fn build_object_store(config: &StorageBackendConfig) -> Arc<dyn ObjectStore> {
    match config {
        StorageBackendConfig::Local { root } => Arc::new(LocalObjectStore::new(root)),
        #[cfg(feature = "s3")]
        StorageBackendConfig::S3 => Arc::new(S3ObjectStore::from_env().await),
        #[cfg(not(feature = "s3"))]
        StorageBackendConfig::S3 => {
            tracing::warn!("Built without S3 support, falling back to local storage in ./storage");
            Arc::new(LocalObjectStore::new("./storage"))
        }
    }
}
