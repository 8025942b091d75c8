//! Document persistence.
//!
//! Documents are JSON bodies addressed by `(collection, id)` and carry a
//! store-managed `revision` that starts at 1 and increases by one on every
//! replace. Writes can be guarded by an [`ExpectedVersion`] so that concurrent
//! read-modify-write cycles on the same document are detected instead of
//! silently losing one side.
//!
//! Filters use JSON containment: a document matches when the filter object is
//! contained in its body (object fields recursively, array filters as
//! "contains all of"). This is exactly Postgres' `jsonb @>` semantics.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod retry;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use gymhub_core::{Entity, ExpectedVersion};

pub use in_memory::InMemoryDocumentStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDocumentStore;
pub use retry::RetryPolicy;

/// A raw stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: Uuid,
    pub revision: u64,
    pub body: JsonValue,
}

/// A typed document together with its store revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<E> {
    pub revision: u64,
    pub document: E,
}

/// JSON containment filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter(JsonValue);

impl Filter {
    /// Matches every document of the collection.
    pub fn all() -> Self {
        Self(JsonValue::Object(Default::default()))
    }

    /// Build a filter from any serializable pattern (usually `serde_json::json!`).
    pub fn new(pattern: JsonValue) -> Self {
        Self(pattern)
    }

    pub fn pattern(&self) -> &JsonValue {
        &self.0
    }

    pub fn matches(&self, body: &JsonValue) -> bool {
        contains(body, &self.0)
    }
}

/// `jsonb @>` containment.
fn contains(doc: &JsonValue, pattern: &JsonValue) -> bool {
    match (doc, pattern) {
        (JsonValue::Object(doc), JsonValue::Object(pattern)) => pattern
            .iter()
            .all(|(k, p)| doc.get(k).is_some_and(|d| contains(d, p))),
        (JsonValue::Array(doc), JsonValue::Array(pattern)) => pattern
            .iter()
            .all(|p| doc.iter().any(|d| contains(d, p))),
        // A scalar pattern is contained in an array holding that scalar.
        (JsonValue::Array(doc), p) if !p.is_object() => doc.iter().any(|d| d == p),
        (d, p) => d == p,
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{collection} document not found")]
    NotFound { collection: &'static str },

    #[error("duplicate document id in {collection}")]
    Duplicate { collection: &'static str },

    /// A conditional insert found a blocking document.
    #[error("{0}")]
    Conflict(String),

    #[error("stale revision (expected: {expected:?}, actual: {actual})")]
    Concurrency { expected: ExpectedVersion, actual: u64 },

    #[error("document (de)serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend error: {message}")]
    Backend { message: String, transient: bool },
}

impl StoreError {
    /// Whether a retry may succeed (connection-level failures only).
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend { transient: true, .. })
    }
}

/// Generic document CRUD with optimistic revisions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<StoredDocument>, StoreError>;

    /// Matching documents, ordered by id (ids are time-ordered v7 UUIDs).
    async fn find(&self, collection: &'static str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError>;

    /// Insert a new document at revision 1.
    async fn insert(&self, collection: &'static str, id: Uuid, body: JsonValue) -> Result<u64, StoreError>;

    /// Atomically insert unless a document matching `blocker` exists.
    async fn insert_unless(
        &self,
        collection: &'static str,
        id: Uuid,
        body: JsonValue,
        blocker: &Filter,
        conflict_message: &str,
    ) -> Result<u64, StoreError>;

    /// Replace an existing document, returning the new revision.
    async fn replace(
        &self,
        collection: &'static str,
        id: Uuid,
        body: JsonValue,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError>;

    async fn delete(&self, collection: &'static str, id: Uuid, expected: ExpectedVersion) -> Result<(), StoreError>;
}

/// Typed access to one collection.
pub struct Repository<E> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> Repository<E>
where
    E: Entity + Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn get(&self, id: E::Id) -> Result<Option<Versioned<E>>, StoreError> {
        match self.store.get(E::COLLECTION, id.into()).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find(&self, filter: &Filter) -> Result<Vec<Versioned<E>>, StoreError> {
        self.store
            .find(E::COLLECTION, filter)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn insert(&self, entity: E) -> Result<Versioned<E>, StoreError> {
        let revision = self.store.insert(E::COLLECTION, entity.id().into(), encode(&entity)?).await?;
        Ok(Versioned {
            revision,
            document: entity,
        })
    }

    pub async fn insert_unless(
        &self,
        entity: E,
        blocker: &Filter,
        conflict_message: &str,
    ) -> Result<Versioned<E>, StoreError> {
        let revision = self
            .store
            .insert_unless(E::COLLECTION, entity.id().into(), encode(&entity)?, blocker, conflict_message)
            .await?;
        Ok(Versioned {
            revision,
            document: entity,
        })
    }

    pub async fn replace(&self, entity: E, expected: ExpectedVersion) -> Result<Versioned<E>, StoreError> {
        let revision = self
            .store
            .replace(E::COLLECTION, entity.id().into(), encode(&entity)?, expected)
            .await?;
        Ok(Versioned {
            revision,
            document: entity,
        })
    }

    pub async fn delete(&self, id: E::Id, expected: ExpectedVersion) -> Result<(), StoreError> {
        self.store.delete(E::COLLECTION, id.into(), expected).await
    }
}

fn encode<E: Serialize>(entity: &E) -> Result<JsonValue, StoreError> {
    serde_json::to_value(entity).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<E: DeserializeOwned>(doc: StoredDocument) -> Result<Versioned<E>, StoreError> {
    let document = serde_json::from_value(doc.body).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Versioned {
        revision: doc.revision,
        document,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn containment_follows_jsonb_rules() {
        let doc = json!({
            "id": "g1",
            "members": ["a", "b"],
            "owner": {"id": "o", "role": "gym_owner"},
            "deleted": false
        });

        assert!(Filter::all().matches(&doc));
        assert!(Filter::new(json!({"members": ["a"]})).matches(&doc));
        assert!(Filter::new(json!({"members": ["b", "a"]})).matches(&doc));
        assert!(!Filter::new(json!({"members": ["c"]})).matches(&doc));
        assert!(Filter::new(json!({"owner": {"role": "gym_owner"}})).matches(&doc));
        assert!(!Filter::new(json!({"deleted": true})).matches(&doc));
        assert!(!Filter::new(json!({"missing": 1})).matches(&doc));
    }

    #[test]
    fn only_backend_errors_can_be_transient() {
        assert!(
            StoreError::Backend {
                message: "io".into(),
                transient: true
            }
            .is_transient()
        );
        assert!(!StoreError::Conflict("dup".into()).is_transient());
    }
}
