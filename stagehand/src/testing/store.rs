//! In-memory object store with per-key latency and failure injection.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::StorageError;
use crate::storage::ObjectStore;

/// A map-backed [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
    delays: RwLock<HashMap<String, Duration>>,
    failing_puts: RwLock<HashSet<String>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object.
    #[must_use]
    pub fn with_object(self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.insert(bucket, key, body);
        self
    }

    /// Inserts or replaces an object.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    /// Delays every get and put of `key`.
    pub fn set_delay(&self, key: &str, delay: Duration) {
        self.delays.write().insert(key.to_string(), delay);
    }

    /// Makes every put of `key` fail.
    pub fn fail_puts_to(&self, key: &str) {
        self.failing_puts.write().insert(key.to_string());
    }

    /// Returns an object's bytes.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in `bucket`, sorted.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .read()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of get calls so far.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of put calls so far.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    async fn delay_for(&self, key: &str) {
        let delay = self.delays.read().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.delay_for(key).await;
        self.object(bucket, key).ok_or_else(|| StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.delay_for(key).await;
        if self.failing_puts.read().contains(key) {
            return Err(StorageError::backend(bucket, key, "injected put failure"));
        }
        self.insert(bucket, key, body);
        Ok(())
    }
}
