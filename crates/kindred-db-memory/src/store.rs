use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kindred_core::{Document, DocumentPath, Fields, Timestamp, Value, generate_id, now_utc};
use kindred_storage::{
    DocumentStore, MAX_BATCH_OPS, Query, StorageError, WriteBatch, WriteOp,
};
use papaya::{HashMap as PapayaHashMap, HashSet as PapayaHashSet};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::stats::{BatchStats, BatchStatsSnapshot};

/// Result of a write: the new state of every touched document (`None` when
/// it was deleted).
type Staged = HashMap<DocumentPath, Option<Document>>;

#[derive(Debug, Clone, Copy)]
pub struct MemoryStoreOptions {
    /// Batch limit; values above [`MAX_BATCH_OPS`] are clamped.
    pub max_batch_ops: usize,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        Self {
            max_batch_ops: MAX_BATCH_OPS,
        }
    }
}

/// In-memory document store using a papaya lock-free map.
///
/// - Lock-free reads and queries
/// - Writes serialized behind one async mutex; batches apply all-or-nothing
/// - Batch limit enforced on every commit
/// - Write failures can be injected per document for failure-path tests
pub struct MemoryStore {
    data: Arc<PapayaHashMap<DocumentPath, Document>>,
    write_lock: Mutex<()>,
    failing: PapayaHashSet<DocumentPath>,
    stats: BatchStats,
    max_batch_ops: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_options(MemoryStoreOptions::default())
    }

    pub fn with_options(options: MemoryStoreOptions) -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            write_lock: Mutex::new(()),
            failing: PapayaHashSet::new(),
            stats: BatchStats::default(),
            max_batch_ops: options.max_batch_ops.clamp(1, MAX_BATCH_OPS),
        }
    }

    pub fn batch_stats(&self) -> BatchStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_batch_stats(&self) {
        self.stats.reset();
    }

    /// Every later write touching `path` fails with `Unavailable`, including
    /// any batch that contains such a write.
    pub fn fail_writes_to(&self, path: DocumentPath) {
        self.failing.pin().insert(path);
    }

    pub fn clear_failures(&self) {
        self.failing.pin().clear();
    }

    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of documents directly in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        let guard = self.data.pin();
        guard
            .iter()
            .filter(|(path, _)| path.collection() == collection)
            .count()
    }

    pub fn contains(&self, path: &DocumentPath) -> bool {
        self.data.pin().contains_key(path)
    }

    async fn apply(&self, ops: &[WriteOp]) -> Result<Staged, StorageError> {
        let _write = self.write_lock.lock().await;
        self.apply_locked(ops, now_utc())
    }

    /// Stages `ops` in order against the current data and publishes the
    /// result only if every op applied. Caller must hold `write_lock`.
    fn apply_locked(&self, ops: &[WriteOp], now: Timestamp) -> Result<Staged, StorageError> {
        let data = self.data.pin();
        let failing = self.failing.pin();
        let mut staged = Staged::new();

        for op in ops {
            let path = op.path();
            if failing.contains(path) {
                return Err(StorageError::unavailable(format!(
                    "write to {path} rejected"
                )));
            }
            let current = match staged.get(path) {
                Some(doc) => doc.clone(),
                None => data.get(path).cloned(),
            };
            let next = apply_op(op, current, now)?;
            staged.insert(path.clone(), next);
        }

        for (path, doc) in &staged {
            match doc {
                Some(doc) => {
                    data.insert(path.clone(), doc.clone());
                }
                None => {
                    data.remove(path);
                }
            }
        }
        Ok(staged)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("documents", &self.len())
            .field("max_batch_ops", &self.max_batch_ops)
            .finish_non_exhaustive()
    }
}

fn apply_op(
    op: &WriteOp,
    current: Option<Document>,
    now: Timestamp,
) -> Result<Option<Document>, StorageError> {
    match op {
        WriteOp::Create { path, fields } => {
            if current.is_some() {
                return Err(StorageError::already_exists(path));
            }
            Ok(Some(new_document(path, fields.clone(), now)))
        }
        WriteOp::SetMerge { path, fields } => Ok(Some(match current {
            Some(mut doc) => {
                doc.fields.extend(fields.clone());
                doc.update_time = now;
                doc
            }
            None => new_document(path, fields.clone(), now),
        })),
        WriteOp::Increment { path, field, delta } => {
            let mut doc = current.ok_or_else(|| StorageError::not_found(path))?;
            let value = doc
                .fields
                .get_mut(field)
                .ok_or_else(|| StorageError::field_missing(path, field.as_str()))?;
            add_to(value, path, field, *delta)?;
            doc.update_time = now;
            Ok(Some(doc))
        }
        WriteOp::MergeIncrement { path, field, delta } => {
            let mut doc = current.unwrap_or_else(|| new_document(path, Fields::new(), now));
            let value = doc
                .fields
                .entry(field.clone())
                .or_insert(Value::Integer(0));
            add_to(value, path, field, *delta)?;
            doc.update_time = now;
            Ok(Some(doc))
        }
        WriteOp::Delete { .. } => Ok(None),
    }
}

fn add_to(
    value: &mut Value,
    path: &DocumentPath,
    field: &str,
    delta: i64,
) -> Result<(), StorageError> {
    match value {
        Value::Integer(n) => {
            *n = n.checked_add(delta).ok_or_else(|| {
                StorageError::invalid_document(format!("{path}.{field} overflows"))
            })?;
        }
        Value::Double(d) => *d += delta as f64,
        _ => {
            return Err(StorageError::invalid_document(format!(
                "{path}.{field} is not numeric"
            )));
        }
    }
    Ok(())
}

fn new_document(path: &DocumentPath, fields: Fields, now: Timestamp) -> Document {
    Document {
        path: path.clone(),
        fields,
        create_time: now,
        update_time: now,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StorageError> {
        let guard = self.data.pin();
        Ok(guard.get(path).cloned())
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<Document, StorageError> {
        let id = id.map(str::to_string).unwrap_or_else(generate_id);
        let path = DocumentPath::new(collection, id)?;
        let mut staged = self
            .apply(&[WriteOp::Create {
                path: path.clone(),
                fields,
            }])
            .await?;
        staged
            .remove(&path)
            .flatten()
            .ok_or_else(|| StorageError::internal(format!("created document {path} vanished")))
    }

    async fn set_merge(&self, path: &DocumentPath, fields: Fields) -> Result<(), StorageError> {
        self.apply(&[WriteOp::SetMerge {
            path: path.clone(),
            fields,
        }])
        .await?;
        Ok(())
    }

    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        delta: i64,
    ) -> Result<i64, StorageError> {
        let staged = self
            .apply(&[WriteOp::Increment {
                path: path.clone(),
                field: field.to_string(),
                delta,
            }])
            .await?;
        match staged.get(path).and_then(|doc| doc.as_ref()?.get(field).cloned()) {
            Some(Value::Integer(n)) => Ok(n),
            Some(Value::Double(d)) => Ok(d as i64),
            _ => Err(StorageError::internal(format!(
                "incremented field {path}.{field} vanished"
            ))),
        }
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), StorageError> {
        self.apply(&[WriteOp::Delete { path: path.clone() }]).await?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StorageError> {
        let guard = self.data.pin();
        let mut docs: Vec<Document> = guard
            .iter()
            .filter(|(_, doc)| query.matches(doc))
            .map(|(_, doc)| doc.clone())
            .collect();
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let size = batch.len();
        self.stats.record_submitted(size);

        if size > self.max_batch_ops {
            self.stats.record_failed();
            warn!(size, limit = self.max_batch_ops, "Rejected oversized write batch");
            return Err(StorageError::batch_too_large(size, self.max_batch_ops));
        }
        if size == 0 {
            return Ok(());
        }

        match self.apply(batch.ops()).await {
            Ok(_) => {
                self.stats.record_committed(size);
                debug!(size, "Committed write batch");
                Ok(())
            }
            Err(e) => {
                self.stats.record_failed();
                Err(e)
            }
        }
    }

    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
