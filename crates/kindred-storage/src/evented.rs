//! Store wrapper that publishes document events after successful writes.
//!
//! This is the in-process trigger runtime: handlers registered as hooks see
//! every document created through the wrapper.
//!
//! ```ignore
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = EventedStore::new(MemoryStore::new(), broadcaster.clone());
//!
//! // Emits DocumentEvent::Created for interests/{id}
//! store.create("interests", None, fields).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use kindred_core::events::{DocumentEvent, EventBroadcaster};
use kindred_core::{Document, DocumentPath, Fields};
use tracing::debug;

use crate::error::StorageError;
use crate::traits::DocumentStore;
use crate::types::{Query, WriteBatch, WriteOp};

/// Delegates to `inner` and emits an event for each create and delete once
/// the write has been applied. Failed writes emit nothing.
///
/// When a subscriber's queue is full the write call waits for room before
/// returning, so no event of an applied write is lost.
pub struct EventedStore<S: DocumentStore> {
    inner: S,
    broadcaster: Arc<EventBroadcaster>,
}

impl<S: DocumentStore> EventedStore<S> {
    pub fn new(inner: S, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { inner, broadcaster }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    async fn emit(&self, event: DocumentEvent) {
        if !self.broadcaster.has_subscribers() {
            return;
        }
        let path = event.source_path();
        let event_type = event.event_type;
        let count = self.broadcaster.send(event).await;
        debug!(path = %path, event = %event_type, subscribers = count, "Emitted document event");
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for EventedStore<S> {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StorageError> {
        self.inner.get(path).await
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<Document, StorageError> {
        let doc = self.inner.create(collection, id, fields).await?;
        self.emit(DocumentEvent::from_created_document(&doc)).await;
        Ok(doc)
    }

    async fn set_merge(&self, path: &DocumentPath, fields: Fields) -> Result<(), StorageError> {
        self.inner.set_merge(path, fields).await
    }

    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        delta: i64,
    ) -> Result<i64, StorageError> {
        self.inner.increment(path, field, delta).await
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), StorageError> {
        self.inner.delete(path).await?;
        self.emit(DocumentEvent::deleted(path.collection(), path.id())).await;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StorageError> {
        self.inner.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let events: Vec<DocumentEvent> = if self.broadcaster.has_subscribers() {
            batch
                .ops()
                .iter()
                .filter_map(|op| match op {
                    WriteOp::Create { path, fields } => Some(DocumentEvent::created(
                        path.collection(),
                        path.id(),
                        fields.clone(),
                    )),
                    WriteOp::Delete { path } => {
                        Some(DocumentEvent::deleted(path.collection(), path.id()))
                    }
                    _ => None,
                })
                .collect()
        } else {
            Vec::new()
        };

        self.inner.commit(batch).await?;

        for event in events {
            self.emit(event).await;
        }
        Ok(())
    }

    fn max_batch_ops(&self) -> usize {
        self.inner.max_batch_ops()
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
