use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::batch::{stage, CommitReceipt, Staging, WriteBatch};
use super::document::{DocRef, Document, Fields};
use super::error::StoreError;
use super::query::Query;
use super::DocumentStore;

// ============================================================================
// In-Memory Document Store
// ============================================================================
//
// Commits take the write lock for the whole stage-then-swap sequence, so
// batches are serialised and readers never observe a half-applied batch.
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    commit_attempts: AtomicUsize,
    writes_committed: AtomicUsize,
    injected_failure: Mutex<Option<StoreError>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing batches
    pub async fn insert(&self, doc: DocRef, data: Fields) {
        let mut collections = self.collections.write().await;
        collections
            .entry(doc.collection)
            .or_default()
            .insert(doc.id, data);
    }

    /// Number of `commit` calls, successful or not
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Number of individual writes that reached the store
    pub fn writes_committed(&self) -> usize {
        self.writes_committed.load(Ordering::SeqCst)
    }

    /// Make the next commit fail after its writes were staged
    pub fn fail_next_commit(&self, error: StoreError) {
        if let Ok(mut slot) = self.injected_failure.lock() {
            *slot = Some(error);
        }
    }

    fn take_injected_failure(&self) -> Option<StoreError> {
        self.injected_failure.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&doc.collection)
            .and_then(|c| c.get(&doc.id))
            .map(|data| Document::new(doc.id.clone(), data.clone())))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let snapshot = collections
            .get(&query.collection)
            .into_iter()
            .flat_map(|c| c.iter())
            .map(|(id, data)| Document::new(id.clone(), data.clone()));
        Ok(query.apply(snapshot))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, StoreError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);

        if batch.is_empty() {
            return Err(StoreError::InvalidArgument("cannot commit an empty batch".to_string()));
        }

        let mut collections = self.collections.write().await;

        let staging: Staging = batch
            .touched()
            .into_iter()
            .map(|doc| {
                let current = collections
                    .get(&doc.collection)
                    .and_then(|c| c.get(&doc.id))
                    .cloned();
                (doc, current)
            })
            .collect();

        let now = Utc::now();
        let staged = stage(&batch, staging, now)?;

        if let Some(error) = self.take_injected_failure() {
            tracing::warn!(error = %error, "Injected commit failure, discarding staged writes");
            return Err(error);
        }

        for doc in batch.written() {
            let collection = collections.entry(doc.collection.clone()).or_default();
            match staged.get(&doc).cloned().flatten() {
                Some(data) => {
                    collection.insert(doc.id.clone(), data);
                }
                None => {
                    collection.remove(&doc.id);
                }
            }
        }

        self.writes_committed.fetch_add(batch.len(), Ordering::SeqCst);

        tracing::debug!(
            write_count = batch.len(),
            documents = batch.written().len(),
            "Committed batch to in-memory store"
        );

        Ok(CommitReceipt {
            writes: batch.len(),
            committed_at: now,
        })
    }
}
