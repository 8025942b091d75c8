//! Postgres-backed document store.
//!
//! All collections share one JSONB table keyed by `(collection, id)`:
//!
//! | column     | type    | notes                               |
//! |------------|---------|-------------------------------------|
//! | collection | TEXT    | entity collection name              |
//! | id         | UUID    | document id                         |
//! | revision   | BIGINT  | starts at 1, +1 per replace          |
//! | body       | JSONB   | serialized entity, GIN-indexed       |
//!
//! Reads are retried on transient errors; writes run once (see
//! [`RetryPolicy::run_write`]).
//!
//! Revision checks are folded into the `UPDATE`/`DELETE` predicate, so a
//! concurrent writer makes the statement affect zero rows instead of
//! overwriting. Conditional inserts take a transaction-scoped advisory lock
//! on the collection before checking for a blocking document.
//!
//! ## Error mapping
//!
//! | SQLx error                          | StoreError                    |
//! |-------------------------------------|-------------------------------|
//! | Database, unique violation `23505`  | `Duplicate`                   |
//! | Io / PoolTimedOut / Tls             | `Backend { transient: true }` |
//! | anything else                       | `Backend { transient: false }`|

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use gymhub_core::ExpectedVersion;

use super::{DocumentStore, Filter, RetryPolicy, StoreError, StoredDocument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT   NOT NULL,
    id         UUID   NOT NULL,
    revision   BIGINT NOT NULL CHECK (revision > 0),
    body       JSONB  NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE INDEX IF NOT EXISTS documents_body_idx ON documents USING GIN (body jsonb_path_ops);
"#;

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Connect and make sure the documents table exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn current_revision(&self, collection: &'static str, id: Uuid) -> Result<Option<u64>, StoreError> {
        let pool = &self.pool;
        self.retry
            .run("current_revision", || async move {
                let row = sqlx::query("SELECT revision FROM documents WHERE collection = $1 AND id = $2")
                    .bind(collection)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| map_sqlx_error("current_revision", e))?;
                row.map(|r| revision_of(&r)).transpose()
            })
            .await
    }

    /// Explain why a guarded write touched no rows.
    async fn missed_write(
        &self,
        collection: &'static str,
        id: Uuid,
        expected: ExpectedVersion,
    ) -> StoreError {
        match self.current_revision(collection, id).await {
            Ok(Some(actual)) => StoreError::Concurrency { expected, actual },
            Ok(None) => StoreError::NotFound { collection },
            Err(e) => e,
        }
    }
}

fn expected_revision(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

fn revision_of(row: &sqlx::postgres::PgRow) -> Result<u64, StoreError> {
    let revision: i64 = row
        .try_get("revision")
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(revision as u64)
}

fn document_of(row: &sqlx::postgres::PgRow) -> Result<StoredDocument, StoreError> {
    let id: Uuid = row.try_get("id").map_err(|e| StoreError::Serialization(e.to_string()))?;
    let body: JsonValue = row.try_get("body").map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(StoredDocument {
        id,
        revision: revision_of(row)?,
        body,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    map_write_error("documents", operation, err)
}

/// The primary key is the only unique constraint, so `23505` means the id is taken.
fn map_write_error(collection: &'static str, operation: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Duplicate { collection }
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_) => StoreError::Backend {
            message: format!("{operation}: {err}"),
            transient: true,
        },
        _ => StoreError::Backend {
            message: format!("{operation}: {err}"),
            transient: false,
        },
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self), err)]
    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<StoredDocument>, StoreError> {
        let pool = &self.pool;
        self.retry
            .run("get", || async move {
                let row = sqlx::query("SELECT id, revision, body FROM documents WHERE collection = $1 AND id = $2")
                    .bind(collection)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| map_sqlx_error("get", e))?;
                row.as_ref().map(document_of).transpose()
            })
            .await
    }

    #[instrument(skip(self, filter), err)]
    async fn find(&self, collection: &'static str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        let pool = &self.pool;
        let pattern = filter.pattern();
        self.retry
            .run("find", || async move {
                let rows = sqlx::query(
                    "SELECT id, revision, body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY id",
                )
                .bind(collection)
                .bind(pattern.clone())
                .fetch_all(pool)
                .await
                .map_err(|e| map_sqlx_error("find", e))?;
                rows.iter().map(document_of).collect()
            })
            .await
    }

    #[instrument(skip(self, body), err)]
    async fn insert(&self, collection: &'static str, id: Uuid, body: JsonValue) -> Result<u64, StoreError> {
        let pool = &self.pool;
        let body = &body;
        self.retry
            .run_write("insert", async move {
                sqlx::query("INSERT INTO documents (collection, id, revision, body) VALUES ($1, $2, 1, $3)")
                    .bind(collection)
                    .bind(id)
                    .bind(body.clone())
                    .execute(pool)
                    .await
                    .map_err(|e| map_write_error(collection, "insert", e))?;
                Ok(1)
            })
            .await
    }

    #[instrument(skip(self, body, blocker), err)]
    async fn insert_unless(
        &self,
        collection: &'static str,
        id: Uuid,
        body: JsonValue,
        blocker: &Filter,
        conflict_message: &str,
    ) -> Result<u64, StoreError> {
        let pool = &self.pool;
        let body = &body;
        let pattern = blocker.pattern();
        self.retry
            .run_write("insert_unless", async move {
                let mut tx = pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;

                sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                    .bind(collection)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("lock", e))?;

                let blocked = sqlx::query("SELECT 1 FROM documents WHERE collection = $1 AND body @> $2 LIMIT 1")
                    .bind(collection)
                    .bind(pattern.clone())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("insert_unless", e))?;
                if blocked.is_some() {
                    return Err(StoreError::Conflict(conflict_message.to_string()));
                }

                sqlx::query("INSERT INTO documents (collection, id, revision, body) VALUES ($1, $2, 1, $3)")
                    .bind(collection)
                    .bind(id)
                    .bind(body.clone())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_write_error(collection, "insert_unless", e))?;

                tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
                Ok(1)
            })
            .await
    }

    #[instrument(skip(self, body), err)]
    async fn replace(
        &self,
        collection: &'static str,
        id: Uuid,
        body: JsonValue,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let pool = &self.pool;
        let body = &body;
        let expected_rev = expected_revision(expected);
        let row = self
            .retry
            .run_write("replace", async move {
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET body = $3, revision = revision + 1
                    WHERE collection = $1 AND id = $2 AND ($4::BIGINT IS NULL OR revision = $4)
                    RETURNING revision
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(body.clone())
                .bind(expected_rev)
                .fetch_optional(pool)
                .await
                .map_err(|e| map_sqlx_error("replace", e))
            })
            .await?;

        match row {
            Some(row) => revision_of(&row),
            None => Err(self.missed_write(collection, id, expected).await),
        }
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, collection: &'static str, id: Uuid, expected: ExpectedVersion) -> Result<(), StoreError> {
        let pool = &self.pool;
        let expected_rev = expected_revision(expected);
        let affected = self
            .retry
            .run_write("delete", async move {
                sqlx::query(
                    "DELETE FROM documents WHERE collection = $1 AND id = $2 AND ($3::BIGINT IS NULL OR revision = $3)",
                )
                .bind(collection)
                .bind(id)
                .bind(expected_rev)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(|e| map_sqlx_error("delete", e))
            })
            .await?;

        if affected == 0 {
            return Err(self.missed_write(collection, id, expected).await);
        }
        Ok(())
    }
}
