//! Object store abstraction.
//!
//! The pipeline only needs list/put/delete/get, so it talks to this trait
//! rather than the S3 SDK directly. Production uses [`crate::R2Client`];
//! tests use [`MemoryStore`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};

/// A stored object as returned by a prefix listing.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
}

/// Minimal object-store interface used by the pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoredObject>>;

    /// Write an object and return its public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// Delete the given keys. Returns the number of objects deleted.
    async fn delete(&self, keys: &[String]) -> StorageResult<u32>;

    /// Read an object's bytes.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;
}

/// In-memory object store for tests.
///
/// URLs are deterministic `memory://{bucket}/{key}` strings.
#[derive(Clone)]
pub struct MemoryStore {
    bucket: String,
    objects: Arc<RwLock<BTreeMap<String, (Vec<u8>, String)>>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of objects currently stored.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn url_for(&self, key: &str) -> String {
        format!("memory://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoredObject>> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (bytes, _))| StoredObject {
                key: k.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        let mut objects = self.objects.write().await;
        objects.insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(self.url_for(key))
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<u32> {
        let mut objects = self.objects.write().await;
        let mut deleted = 0;
        for key in keys {
            if objects.remove(key).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let objects = self.objects.read().await;
        objects
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new("test-bucket");
        let url = store
            .put("a/b/one.mp3", vec![1, 2, 3], "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(url, "memory://test-bucket/a/b/one.mp3");
        assert_eq!(store.get("a/b/one.mp3").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_memory_store_prefix_listing() {
        let store = MemoryStore::new("b");
        store.put("x/1", vec![0], "b").await.unwrap();
        store.put("x/2", vec![0, 1], "b").await.unwrap();
        store.put("y/1", vec![0], "b").await.unwrap();

        let listed = store.list("x/").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|o| o.key.starts_with("x/")));
    }

    #[tokio::test]
    async fn test_memory_store_delete_counts() {
        let store = MemoryStore::new("b");
        store.put("k1", vec![0], "b").await.unwrap();
        let deleted = store
            .delete(&["k1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.is_empty().await);
    }
}
