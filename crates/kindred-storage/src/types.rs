//! Query and write-batch types.

use std::cmp::Ordering;

use kindred_core::{Document, DocumentPath, Fields, Value};

/// Largest number of operations a single atomic batch may carry.
pub const MAX_BATCH_OPS: usize = 500;

// ============================================================================
// Queries
// ============================================================================

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Lt,
    Le,
    Eq,
    Gt,
    Ge,
}

impl FilterOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Le => ordering != Ordering::Greater,
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// `field <op> value`. A document lacking the field, or holding a value of an
/// incomparable kind, never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        fields
            .get(&self.field)
            .and_then(|v| v.compare(&self.value))
            .is_some_and(|ordering| self.op.accepts(ordering))
    }
}

/// Predicate query over one collection. All filters must match.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            limit: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.path.collection() == self.collection
            && self.filters.iter().all(|f| f.matches(&doc.fields))
    }
}

// ============================================================================
// Write batches
// ============================================================================

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Fails the batch with `AlreadyExists` if the document exists.
    Create { path: DocumentPath, fields: Fields },
    /// Merges `fields` into the document, creating it if needed.
    SetMerge { path: DocumentPath, fields: Fields },
    /// Adds `delta` to an existing integer field. Fails the batch with
    /// `NotFound`/`FieldMissing` when the target does not exist.
    Increment {
        path: DocumentPath,
        field: String,
        delta: i64,
    },
    /// Adds `delta` to an integer field, creating the document and the field
    /// (starting from 0) when either is missing.
    MergeIncrement {
        path: DocumentPath,
        field: String,
        delta: i64,
    },
    /// Removes the document. Deleting a missing document is not an error.
    Delete { path: DocumentPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Create { path, .. }
            | WriteOp::SetMerge { path, .. }
            | WriteOp::Increment { path, .. }
            | WriteOp::MergeIncrement { path, .. }
            | WriteOp::Delete { path } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Create { .. } => "create",
            WriteOp::SetMerge { .. } => "set_merge",
            WriteOp::Increment { .. } => "increment",
            WriteOp::MergeIncrement { .. } => "merge_increment",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

/// Ordered list of writes committed atomically: all apply or none do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn create(&mut self, path: DocumentPath, fields: Fields) -> &mut Self {
        self.push(WriteOp::Create { path, fields })
    }

    pub fn set_merge(&mut self, path: DocumentPath, fields: Fields) -> &mut Self {
        self.push(WriteOp::SetMerge { path, fields })
    }

    pub fn increment(
        &mut self,
        path: DocumentPath,
        field: impl Into<String>,
        delta: i64,
    ) -> &mut Self {
        self.push(WriteOp::Increment {
            path,
            field: field.into(),
            delta,
        })
    }

    pub fn merge_increment(
        &mut self,
        path: DocumentPath,
        field: impl Into<String>,
        delta: i64,
    ) -> &mut Self {
        self.push(WriteOp::MergeIncrement {
            path,
            field: field.into(),
            delta,
        })
    }

    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.push(WriteOp::Delete { path })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}
