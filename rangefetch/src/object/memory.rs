//! In-memory object store.
//!
//! Holds whole objects in memory and serves chunks as zero-copy slices.
//! Besides embedding, it supports fault injection for tests: a per-object
//! fetch delay and chunks that always fail.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;

use super::{BoxFuture, Catalog, ChunkStore, ObjectMetadata, StoreError};

struct StoredObject {
    metadata: ObjectMetadata,
    data: Bytes,
    fetch_delay: Option<Duration>,
    failing_chunks: HashSet<u64>,
}

/// Object store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing any previous object at the same path.
    ///
    /// Returns the metadata the catalog will report for it.
    pub fn insert(
        &self,
        path: impl Into<String>,
        data: impl Into<Bytes>,
        chunk_size: u64,
    ) -> ObjectMetadata {
        let path = path.into();
        let data = data.into();
        let metadata = ObjectMetadata::new(path.clone(), data.len() as u64, chunk_size);
        self.objects.insert(
            path,
            StoredObject {
                metadata: metadata.clone(),
                data,
                fetch_delay: None,
                failing_chunks: HashSet::new(),
            },
        );
        metadata
    }

    /// Remove an object. Returns true if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.objects.remove(path).is_some()
    }

    /// Delay every chunk fetch of an object by `delay`.
    pub fn set_fetch_delay(&self, path: &str, delay: Duration) {
        if let Some(mut object) = self.objects.get_mut(path) {
            object.fetch_delay = Some(delay);
        }
    }

    /// Make every fetch of chunk `index` of an object fail.
    pub fn fail_chunk(&self, path: &str, index: u64) {
        if let Some(mut object) = self.objects.get_mut(path) {
            object.failing_chunks.insert(index);
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn lookup_delay(&self, path: &str) -> Option<Duration> {
        self.objects.get(path).and_then(|o| o.fetch_delay)
    }

    fn slice_chunk(&self, path: &str, index: u64) -> Result<Bytes, StoreError> {
        let object = self.objects.get(path).ok_or_else(|| StoreError::NotFound {
            path: path.to_string(),
        })?;

        let missing = || StoreError::ChunkMissing {
            path: path.to_string(),
            index,
        };
        if object.failing_chunks.contains(&index) || index >= object.metadata.chunk_count {
            return Err(missing());
        }

        let start = (index * object.metadata.chunk_size) as usize;
        let end = start + object.metadata.chunk_len(index) as usize;
        Ok(object.data.slice(start..end))
    }
}

impl Catalog for MemoryStore {
    fn resolve<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<ObjectMetadata, StoreError>> {
        Box::pin(async move {
            self.objects
                .get(path)
                .map(|o| o.metadata.clone())
                .ok_or_else(|| StoreError::NotFound {
                    path: path.to_string(),
                })
        })
    }
}

impl ChunkStore for MemoryStore {
    fn fetch_chunk<'a>(
        &'a self,
        path: &'a str,
        index: u64,
    ) -> BoxFuture<'a, Result<Bytes, StoreError>> {
        Box::pin(async move {
            // Map guards must not be held across the delay.
            if let Some(delay) = self.lookup_delay(path) {
                tokio::time::sleep(delay).await;
            }
            self.slice_chunk(path, index)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_and_fetch() {
        let store = MemoryStore::new();
        let meta = store.insert("docs/a.txt", b"hello world".to_vec(), 4);

        assert_eq!(meta.size, 11);
        assert_eq!(meta.chunk_count, 3);
        assert_eq!(store.resolve("docs/a.txt").await.unwrap(), meta);

        assert_eq!(&store.fetch_chunk("docs/a.txt", 0).await.unwrap()[..], b"hell");
        assert_eq!(&store.fetch_chunk("docs/a.txt", 2).await.unwrap()[..], b"rld");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.resolve("nope").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.fetch_chunk("nope", 0).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_chunk_out_of_range() {
        let store = MemoryStore::new();
        store.insert("a", vec![0u8; 10], 5);
        assert!(matches!(
            store.fetch_chunk("a", 2).await,
            Err(StoreError::ChunkMissing { index: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_fail_chunk() {
        let store = MemoryStore::new();
        store.insert("a", vec![0u8; 10], 5);
        store.fail_chunk("a", 1);

        assert!(store.fetch_chunk("a", 0).await.is_ok());
        assert!(store.fetch_chunk("a", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::new();
        store.insert("a", vec![1u8; 3], 2);
        assert_eq!(store.len(), 1);

        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.is_empty());
    }
}
