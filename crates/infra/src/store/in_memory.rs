use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use gymhub_core::ExpectedVersion;

use super::{DocumentStore, Filter, StoreError, StoredDocument};

type Key = (&'static str, Uuid);

/// In-memory document store for tests/dev.
///
/// A single lock guards every collection, so `insert_unless` and
/// revision-checked writes are trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<BTreeMap<Key, (u64, JsonValue)>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend {
        message: "in-memory store lock poisoned".to_string(),
        transient: false,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<StoredDocument>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&(collection, id)).map(|(revision, body)| StoredDocument {
            id,
            revision: *revision,
            body: body.clone(),
        }))
    }

    async fn find(&self, collection: &'static str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter(|((c, _), (_, body))| *c == collection && filter.matches(body))
            .map(|((_, id), (revision, body))| StoredDocument {
                id: *id,
                revision: *revision,
                body: body.clone(),
            })
            .collect())
    }

    async fn insert(&self, collection: &'static str, id: Uuid, body: JsonValue) -> Result<u64, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(&(collection, id)) {
            return Err(StoreError::Duplicate { collection });
        }
        map.insert((collection, id), (1, body));
        Ok(1)
    }

    async fn insert_unless(
        &self,
        collection: &'static str,
        id: Uuid,
        body: JsonValue,
        blocker: &Filter,
        conflict_message: &str,
    ) -> Result<u64, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let blocked = map
            .iter()
            .any(|((c, _), (_, existing))| *c == collection && blocker.matches(existing));
        if blocked {
            return Err(StoreError::Conflict(conflict_message.to_string()));
        }
        if map.contains_key(&(collection, id)) {
            return Err(StoreError::Duplicate { collection });
        }
        map.insert((collection, id), (1, body));
        Ok(1)
    }

    async fn replace(
        &self,
        collection: &'static str,
        id: Uuid,
        body: JsonValue,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some((revision, stored)) = map.get_mut(&(collection, id)) else {
            return Err(StoreError::NotFound { collection });
        };
        if !expected.matches(*revision) {
            return Err(StoreError::Concurrency {
                expected,
                actual: *revision,
            });
        }
        *revision += 1;
        *stored = body;
        Ok(*revision)
    }

    async fn delete(&self, collection: &'static str, id: Uuid, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some((revision, _)) = map.get(&(collection, id)) else {
            return Err(StoreError::NotFound { collection });
        };
        if !expected.matches(*revision) {
            return Err(StoreError::Concurrency {
                expected,
                actual: *revision,
            });
        }
        map.remove(&(collection, id));
        Ok(())
    }
}
