//! Object storage collaborator: takes a blob, returns a public URL.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("empty upload")]
    Empty,

    #[error("object storage unavailable: {0}")]
    Unavailable(String),
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `folder` and return the URL it is served from.
    async fn put(&self, folder: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, StorageError>;

    /// Remove the object served from `url`. Unknown URLs are not an error.
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Keeps uploads in memory; URLs are `<base_url>/<folder>/<uuid>`.
#[derive(Debug)]
pub struct InMemoryObjectStorage {
    base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl InMemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, url: &str) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(url).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put(&self, folder: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        let folder = folder.trim_matches('/');
        let url = format!("{}/{}/{}", self.base_url, folder, Uuid::now_v7());
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Unavailable("object map poisoned".into()))?;
        objects.insert(
            url.clone(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        tracing::debug!(%url, "object stored");
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Unavailable("object map poisoned".into()))?;
        if objects.remove(url).is_some() {
            tracing::debug!(%url, "object deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_returns_a_retrievable_url() {
        let storage = InMemoryObjectStorage::new("memory://uploads/");
        let url = storage.put("/gyms/", "image/png", vec![1, 2, 3]).await.unwrap();
        assert!(url.starts_with("memory://uploads/gyms/"));
        assert_eq!(storage.get(&url).unwrap().bytes, vec![1, 2, 3]);
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_object_and_ignores_unknown_urls() {
        let storage = InMemoryObjectStorage::new("memory://uploads");
        let url = storage.put("gyms", "image/png", vec![1]).await.unwrap();
        storage.delete(&url).await.unwrap();
        assert!(storage.get(&url).is_none());
        storage.delete(&url).await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn empty_blobs_are_rejected() {
        let storage = InMemoryObjectStorage::new("memory://uploads");
        assert_eq!(storage.put("gyms", "image/png", Vec::new()).await, Err(StorageError::Empty));
        assert!(storage.is_empty());
    }
}
