//! The document store contract.

use async_trait::async_trait;
use kindred_core::{Document, DocumentPath, Fields};

use crate::error::StorageError;
use crate::types::{MAX_BATCH_OPS, Query, WriteBatch};

/// A document-oriented store with atomic single-field increments and atomic
/// multi-document write batches.
///
/// Implementations must be thread-safe; one instance is created per process
/// and shared behind an `Arc`.
///
/// ```ignore
/// async fn bump(store: &dyn DocumentStore, user: &DocumentPath) -> Result<i64, StorageError> {
///     store.increment(user, "totalInterestsCount", 1).await
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document. `None` when it does not exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StorageError>;

    /// Creates a document. With `id = None` the store assigns one.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when a document with the given id exists.
    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<Document, StorageError>;

    /// Merges `fields` into the document, creating it when missing.
    async fn set_merge(&self, path: &DocumentPath, fields: Fields) -> Result<(), StorageError>;

    /// Atomically adds `delta` to an integer field and returns the new value.
    ///
    /// # Errors
    ///
    /// `NotFound` when the document does not exist, `FieldMissing` when the
    /// field does not, `InvalidDocument` when the field is not an integer.
    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        delta: i64,
    ) -> Result<i64, StorageError>;

    /// Deletes a document. Missing documents are not an error.
    async fn delete(&self, path: &DocumentPath) -> Result<(), StorageError>;

    /// Returns documents of `query.collection` matching every filter, up to
    /// `query.limit`.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StorageError>;

    /// Applies every operation of `batch` or none of them.
    ///
    /// # Errors
    ///
    /// `BatchTooLarge` when the batch exceeds [`DocumentStore::max_batch_ops`];
    /// otherwise the error of the first operation that could not apply.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Upper bound on operations per batch.
    fn max_batch_ops(&self) -> usize {
        MAX_BATCH_OPS
    }

    fn backend_name(&self) -> &'static str;
}
