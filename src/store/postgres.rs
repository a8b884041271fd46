use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;

use super::batch::{stage, CommitReceipt, Staging, WriteBatch};
use super::document::{DocRef, Document, Fields};
use super::error::StoreError;
use super::query::Query;
use super::DocumentStore;

// ============================================================================
// PostgreSQL Document Store
// ============================================================================
//
// Documents live in one JSONB table keyed by (collection, id). A commit:
//
// 1. BEGIN
// 2. SELECT ... FOR UPDATE every touched document (sorted, so concurrent
//    batches lock in the same order)
// 3. stage the batch in memory, checking guards
// 4. insert / upsert / delete the written documents
// 5. COMMIT
//
// Row locks cannot cover a key that does not exist yet, so a document the
// batch creates is written with a plain INSERT. A concurrent creator then
// fails on the primary key (23505, `already-exists`) instead of overwriting.
//
// Any failure before step 5 rolls the transaction back when it is dropped.
//
// ============================================================================

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, id)
)";

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the documents table if needed
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Document table ready");
        Ok(())
    }
}

const INSERT: &str = "INSERT INTO documents (collection, id, data, updated_at)
    VALUES ($1, $2, $3, $4)";

const UPSERT: &str = "INSERT INTO documents (collection, id, data, updated_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (collection, id)
    DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at";

const DELETE: &str = "DELETE FROM documents WHERE collection = $1 AND id = $2";

/// How one written document is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    Insert,
    Upsert,
    Delete,
}

impl Persist {
    fn choose(created: bool, existed: bool, present_after: bool) -> Self {
        match (present_after, created && !existed) {
            (false, _) => Persist::Delete,
            (true, true) => Persist::Insert,
            (true, false) => Persist::Upsert,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Persist::Insert => INSERT,
            Persist::Upsert => UPSERT,
            Persist::Delete => DELETE,
        }
    }
}

fn into_fields(doc: &DocRef, value: Value) -> Result<Fields, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Internal(format!(
            "document {} is not an object: {}",
            doc, other
        ))),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>, StoreError> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(&doc.collection)
                .bind(&doc.id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(Json(data),)| Ok(Document::new(doc.id.clone(), into_fields(doc, data)?)))
            .transpose()
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<(String, Json<Value>)> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1")
                .bind(&query.collection)
                .fetch_all(&self.pool)
                .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for (id, Json(data)) in rows {
            let doc = DocRef::new(query.collection.clone(), id);
            let fields = into_fields(&doc, data)?;
            docs.push(Document::new(doc.id, fields));
        }

        tracing::debug!(
            collection = %query.collection,
            scanned = docs.len(),
            "Evaluating query against collection snapshot"
        );

        Ok(query.apply(docs))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, StoreError> {
        if batch.is_empty() {
            return Err(StoreError::InvalidArgument("cannot commit an empty batch".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let mut staging = Staging::new();
        let mut existing = BTreeSet::new();
        for doc in batch.touched() {
            let row: Option<(Json<Value>,)> = sqlx::query_as(
                "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
            )
            .bind(&doc.collection)
            .bind(&doc.id)
            .fetch_optional(&mut *tx)
            .await?;

            let current = row.map(|(Json(data),)| into_fields(&doc, data)).transpose()?;
            if current.is_some() {
                existing.insert(doc.clone());
            }
            staging.insert(doc, current);
        }

        let now = Utc::now();
        let staged = stage(&batch, staging, now)?;
        let created = batch.created();

        for doc in batch.written() {
            let data = staged.get(&doc).cloned().flatten();
            let persist = Persist::choose(
                created.contains(&doc),
                existing.contains(&doc),
                data.is_some(),
            );
            let statement = sqlx::query(persist.sql())
                .bind(&doc.collection)
                .bind(&doc.id);
            let statement = match data {
                Some(data) => statement.bind(Json(Value::Object(data))).bind(now),
                None => statement,
            };
            statement.execute(&mut *tx).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            write_count = batch.len(),
            documents = batch.written().len(),
            "Committed batch to PostgreSQL"
        );

        Ok(CommitReceipt {
            writes: batch.len(),
            committed_at: now,
        })
    }
}

// ============================================================================
// sqlx error mapping
// ============================================================================

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => StoreError::Aborted(err.to_string()),
                Some("23505") => StoreError::AlreadyExists(err.to_string()),
                _ => StoreError::Internal(err.to_string()),
            },
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}
