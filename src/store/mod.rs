// ============================================================================
// Document Store - Persistence for the admin application
// ============================================================================
//
// A transactional document store: JSON documents grouped in collections,
// client-evaluated queries, and all-or-nothing write batches with relative
// numeric mutations and guards.
//
// Two implementations:
// - InMemoryStore   (tests, demo, single-process deployments)
// - PgDocumentStore (PostgreSQL via sqlx, one JSONB table)
//
// ============================================================================

mod batch;
mod document;
mod error;
mod memory;
mod postgres;
mod query;

use async_trait::async_trait;

pub use batch::{
    stage, CommitReceipt, FieldMutation, FieldUpdates, Guard, Staging, Write, WriteBatch,
    SERVER_TIMESTAMP,
};
pub use document::{
    collections, compare_values, encode, lookup, timestamp_value, values_equal, DocRef, Document,
    Fields,
};
pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PgDocumentStore;
pub use query::{Direction, Filter, FilterOp, Query};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, query: &Query) -> Result<usize, StoreError> {
        Ok(self.query(query).await?.len())
    }

    /// Apply every write in the batch, or none of them
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, StoreError>;

    /// Client-side id for documents created inside a batch
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}
