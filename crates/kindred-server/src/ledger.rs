//! Denormalized counter updates on user documents.
//!
//! The store's atomic increment only works on a field that already exists.
//! The first increment for a user therefore falls back to a merge-increment,
//! which creates a missing field from 0 and still adds atomically, so two
//! racing first events both count.

use kindred_core::model::collections;
use kindred_core::{CoreError, Counter, DocumentPath, now_utc};
use kindred_storage::{DynStore, StorageError, WriteBatch};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::processed::ProcessedMarker;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Counter delta must be nonzero")]
    ZeroDelta,

    #[error(transparent)]
    InvalidPath(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StorageError),
}

/// What a ledger call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The existing counter was changed in place.
    Incremented,
    /// The counter was missing on the first attempt; the fallback
    /// merge-increment created it (or added to a concurrent creation).
    Initialized,
    /// The processed-event marker already existed; nothing was written.
    Duplicate,
    /// A decrement hit a missing counter; nothing was written.
    RejectedDecrement,
}

impl LedgerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOutcome::Incremented => "incremented",
            LedgerOutcome::Initialized => "initialized",
            LedgerOutcome::Duplicate => "duplicate",
            LedgerOutcome::RejectedDecrement => "rejected_decrement",
        }
    }
}

#[derive(Clone)]
pub struct CounterLedger {
    store: DynStore,
}

impl CounterLedger {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Adds `delta` to `counter` on `users/{user_id}`.
    ///
    /// Not idempotent: every call applies the delta again.
    pub async fn apply_delta(
        &self,
        user_id: &str,
        counter: Counter,
        delta: i64,
    ) -> Result<LedgerOutcome, LedgerError> {
        if delta == 0 {
            return Err(LedgerError::ZeroDelta);
        }
        let user = user_path(user_id)?;

        match self.store.increment(&user, counter.field(), delta).await {
            Ok(value) => {
                debug!(user_id, counter = %counter, delta, value, "Counter updated");
                Ok(LedgerOutcome::Incremented)
            }
            Err(e) if e.is_missing_target() => {
                if delta < 0 {
                    return Ok(reject_decrement(user_id, counter, delta));
                }
                let mut batch = WriteBatch::new();
                batch.merge_increment(user, counter.field(), delta);
                self.store.commit(batch).await?;
                info!(user_id, counter = %counter, delta, "Counter initialized");
                Ok(LedgerOutcome::Initialized)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`apply_delta`](Self::apply_delta), but records `marker` in the
    /// same atomic batch. A replay of the same event finds the marker, fails
    /// the whole batch and reports [`LedgerOutcome::Duplicate`].
    pub async fn apply_delta_once(
        &self,
        user_id: &str,
        counter: Counter,
        delta: i64,
        marker: &ProcessedMarker,
    ) -> Result<LedgerOutcome, LedgerError> {
        if delta == 0 {
            return Err(LedgerError::ZeroDelta);
        }
        let user = user_path(user_id)?;
        let marker_path = marker.path()?;

        // Marker first: on a replay the batch fails with AlreadyExists
        // regardless of the state of the user document.
        let mut batch = WriteBatch::new();
        batch
            .create(marker_path.clone(), marker.fields(now_utc()))
            .increment(user.clone(), counter.field(), delta);

        match self.store.commit(batch).await {
            Ok(()) => {
                debug!(user_id, counter = %counter, delta, key = %marker.key(), "Counter updated");
                return Ok(LedgerOutcome::Incremented);
            }
            Err(e) if e.is_already_exists() => return Ok(duplicate(marker)),
            Err(e) if e.is_missing_target() => {}
            Err(e) => return Err(e.into()),
        }

        if delta < 0 {
            return Ok(reject_decrement(user_id, counter, delta));
        }

        let mut batch = WriteBatch::new();
        batch
            .create(marker_path, marker.fields(now_utc()))
            .merge_increment(user, counter.field(), delta);

        match self.store.commit(batch).await {
            Ok(()) => {
                info!(user_id, counter = %counter, delta, key = %marker.key(), "Counter initialized");
                Ok(LedgerOutcome::Initialized)
            }
            Err(e) if e.is_already_exists() => Ok(duplicate(marker)),
            Err(e) => Err(e.into()),
        }
    }
}

fn user_path(user_id: &str) -> Result<DocumentPath, CoreError> {
    DocumentPath::new(collections::USERS, user_id)
}

fn reject_decrement(user_id: &str, counter: Counter, delta: i64) -> LedgerOutcome {
    error!(
        user_id,
        counter = %counter,
        delta,
        "Decrement against a missing counter; no write made"
    );
    LedgerOutcome::RejectedDecrement
}

fn duplicate(marker: &ProcessedMarker) -> LedgerOutcome {
    info!(key = %marker.key(), source = %marker.source(), "Event already processed");
    LedgerOutcome::Duplicate
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kindred_core::{Document, Fields, Value};
    use kindred_db_memory::MemoryStore;
    use kindred_storage::{DocumentStore, Query, WriteOp};
    use std::sync::Arc;
    use tokio::sync::Barrier;

    /// Rejects every batch holding a plain increment as if the counter were
    /// still missing, after all callers have reached the store. Both first
    /// events then race through the fallback.
    struct StaleCounterStore {
        inner: MemoryStore,
        barrier: Barrier,
    }

    #[async_trait]
    impl DocumentStore for StaleCounterStore {
        async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StorageError> {
            self.inner.get(path).await
        }

        async fn create(
            &self,
            collection: &str,
            id: Option<&str>,
            fields: Fields,
        ) -> Result<Document, StorageError> {
            self.inner.create(collection, id, fields).await
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
            self.inner.delete(path).await
        }

        async fn query(&self, query: &Query) -> Result<Vec<Document>, StorageError> {
            self.inner.query(query).await
        }

        async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
            let stale = batch.ops().iter().find_map(|op| match op {
                WriteOp::Increment { path, .. } => Some(path.clone()),
                _ => None,
            });
            if let Some(path) = stale {
                self.barrier.wait().await;
                return Err(StorageError::not_found(path));
            }
            self.inner.commit(batch).await
        }

        fn backend_name(&self) -> &'static str {
            "stale-counter"
        }
    }

    fn setup() -> (Arc<MemoryStore>, CounterLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = CounterLedger::new(store.clone());
        (store, ledger)
    }

    async fn counter_value(store: &MemoryStore, user: &str, counter: Counter) -> Option<i64> {
        use kindred_storage::DocumentStore;
        store
            .get(&DocumentPath::new("users", user).unwrap())
            .await
            .unwrap()
            .and_then(|doc| doc.get_i64(counter.field()))
    }

    #[tokio::test]
    async fn test_missing_field_is_set_to_delta() {
        let (store, ledger) = setup();
        use kindred_storage::DocumentStore;
        store
            .create("users", Some("B"), Fields::from([("displayName".into(), Value::from("Bob"))]))
            .await
            .unwrap();

        let outcome = ledger
            .apply_delta("B", Counter::TotalInterests, 3)
            .await
            .unwrap();
        assert_eq!(outcome, LedgerOutcome::Initialized);
        assert_eq!(counter_value(&store, "B", Counter::TotalInterests).await, Some(3));

        let outcome = ledger
            .apply_delta("B", Counter::TotalInterests, 1)
            .await
            .unwrap();
        assert_eq!(outcome, LedgerOutcome::Incremented);
        assert_eq!(counter_value(&store, "B", Counter::TotalInterests).await, Some(4));
    }

    #[tokio::test]
    async fn test_missing_user_document_is_created() {
        let (store, ledger) = setup();
        let outcome = ledger
            .apply_delta("ghost", Counter::TotalFriendRequests, 1)
            .await
            .unwrap();
        assert_eq!(outcome, LedgerOutcome::Initialized);
        assert_eq!(
            counter_value(&store, "ghost", Counter::TotalFriendRequests).await,
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_initial_decrement_is_rejected_without_write() {
        let (store, ledger) = setup();
        let outcome = ledger
            .apply_delta("B", Counter::TotalInterests, -1)
            .await
            .unwrap();
        assert_eq!(outcome, LedgerOutcome::RejectedDecrement);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_zero_delta_is_a_caller_error() {
        let (_, ledger) = setup();
        let err = ledger
            .apply_delta("B", Counter::TotalInterests, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ZeroDelta));
    }

    #[tokio::test]
    async fn test_apply_once_counts_a_replay_once() {
        let (store, ledger) = setup();
        let marker = ProcessedMarker::new("interest", DocumentPath::new("interests", "i1").unwrap());

        let first = ledger
            .apply_delta_once("B", Counter::TotalInterests, 1, &marker)
            .await
            .unwrap();
        assert_eq!(first, LedgerOutcome::Initialized);

        let replay = ledger
            .apply_delta_once("B", Counter::TotalInterests, 1, &marker)
            .await
            .unwrap();
        assert_eq!(replay, LedgerOutcome::Duplicate);
        assert_eq!(counter_value(&store, "B", Counter::TotalInterests).await, Some(1));
        assert_eq!(store.count("processed_events"), 1);

        let other = ProcessedMarker::new("interest", DocumentPath::new("interests", "i2").unwrap());
        let second = ledger
            .apply_delta_once("B", Counter::TotalInterests, 1, &other)
            .await
            .unwrap();
        assert_eq!(second, LedgerOutcome::Incremented);
        assert_eq!(counter_value(&store, "B", Counter::TotalInterests).await, Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_first_increments_both_count() {
        let store = Arc::new(StaleCounterStore {
            inner: MemoryStore::new(),
            barrier: Barrier::new(2),
        });
        let ledger = CounterLedger::new(store.clone());
        let first = ProcessedMarker::new("interest", DocumentPath::new("interests", "i1").unwrap());
        let second = ProcessedMarker::new("interest", DocumentPath::new("interests", "i2").unwrap());

        let (a, b) = tokio::join!(
            ledger.apply_delta_once("B", Counter::TotalInterests, 1, &first),
            ledger.apply_delta_once("B", Counter::TotalInterests, 1, &second),
        );
        assert_eq!(a.unwrap(), LedgerOutcome::Initialized);
        assert_eq!(b.unwrap(), LedgerOutcome::Initialized);
        assert_eq!(store.inner.count("processed_events"), 2);
        assert_eq!(
            counter_value(&store.inner, "B", Counter::TotalInterests).await,
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_concurrent_first_plain_deltas_both_count() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CounterLedger::new(store.clone());

        let (a, b) = tokio::join!(
            ledger.apply_delta("B", Counter::TotalFriendRequests, 1),
            ledger.apply_delta("B", Counter::TotalFriendRequests, 1),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(
            counter_value(&store, "B", Counter::TotalFriendRequests).await,
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_apply_once_store_failure_leaves_no_marker() {
        let (store, ledger) = setup();
        let user = DocumentPath::new("users", "B").unwrap();
        store.fail_writes_to(user);
        let marker = ProcessedMarker::new("interest", DocumentPath::new("interests", "i1").unwrap());

        let err = ledger
            .apply_delta_once("B", Counter::TotalInterests, 1, &marker)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Store(ref e) if e.is_transient()));
        assert_eq!(store.count("processed_events"), 0);
    }
}
