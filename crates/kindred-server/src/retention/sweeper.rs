//! One retention pass over one collection.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use futures_util::future::join_all;
use kindred_core::model::{collections, fields};
use kindred_core::{
    Counter, Document, DocumentPath, Friendship, FriendshipStatus, Interest, Timestamp, now_utc,
};
use kindred_storage::{DynStore, Filter, Query, StorageError, WriteBatch};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::planner::{FamilyPlan, FamilyUnit, FlatRecord, plan_families, plan_flat};
use crate::metrics;

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("Unknown retention target: {0}")]
    UnknownTarget(String),

    #[error("Batch limit {limit} is too small; a record and its counter update need 2 operations")]
    BatchLimit { limit: usize },

    #[error(transparent)]
    Store(#[from] StorageError),
}

/// A retained collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepTarget {
    Interests,
    Friendships,
    ChatBatches,
    ProcessedEvents,
}

impl SweepTarget {
    pub const ALL: [SweepTarget; 4] = [
        SweepTarget::Interests,
        SweepTarget::Friendships,
        SweepTarget::ChatBatches,
        SweepTarget::ProcessedEvents,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            SweepTarget::Interests => collections::INTERESTS,
            SweepTarget::Friendships => collections::FRIENDSHIPS,
            SweepTarget::ChatBatches => collections::CHAT_BATCHES,
            SweepTarget::ProcessedEvents => collections::PROCESSED_EVENTS,
        }
    }

    /// Field the expiry window is measured against.
    fn age_field(&self) -> &'static str {
        match self {
            SweepTarget::Interests | SweepTarget::Friendships => fields::CREATED_AT,
            SweepTarget::ChatBatches => fields::START_TIMESTAMP,
            SweepTarget::ProcessedEvents => fields::PROCESSED_AT,
        }
    }

    /// Counter a deleted record had contributed to.
    pub fn counter(&self) -> Option<Counter> {
        match self {
            SweepTarget::Interests => Some(Counter::TotalInterests),
            SweepTarget::Friendships => Some(Counter::TotalFriendRequests),
            SweepTarget::ChatBatches | SweepTarget::ProcessedEvents => None,
        }
    }
}

impl fmt::Display for SweepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for SweepTarget {
    type Err = RetentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SweepTarget::ALL
            .into_iter()
            .find(|t| t.collection() == s)
            .ok_or_else(|| RetentionError::UnknownTarget(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SweepPolicy {
    /// Records older than this are expired.
    pub window: time::Duration,
    /// Decrement the target's counter for each deleted record.
    pub compensate: bool,
}

/// Totals of one sweep. In a dry run the counts are what would have been
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub collection: String,
    pub dry_run: bool,
    pub matched: usize,
    pub deleted: usize,
    pub children_deleted: usize,
    pub counters_decremented: i64,
    pub chunks_committed: usize,
    pub chunks_failed: usize,
    /// Parents left in place because their children could not be listed.
    pub parents_skipped: usize,
}

/// Deletes expired records of one collection in size-bounded atomic batches.
pub struct RetentionSweeper {
    store: DynStore,
    target: SweepTarget,
    policy: SweepPolicy,
    batch_limit: usize,
    dry_run: bool,
}

impl RetentionSweeper {
    pub fn new(store: DynStore, target: SweepTarget, policy: SweepPolicy, batch_limit: usize) -> Self {
        Self {
            store,
            target,
            policy,
            batch_limit,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn target(&self) -> SweepTarget {
        self.target
    }

    /// Configured limit, never above what the store accepts.
    pub fn batch_limit(&self) -> usize {
        self.batch_limit.min(self.store.max_batch_ops())
    }

    pub async fn run(&self) -> Result<SweepReport, RetentionError> {
        self.run_at(now_utc()).await
    }

    /// Sweeps records that had expired at `now`.
    pub async fn run_at(&self, now: Timestamp) -> Result<SweepReport, RetentionError> {
        let limit = self.batch_limit();
        if limit < 2 {
            return Err(RetentionError::BatchLimit { limit });
        }
        let collection = self.target.collection();
        let cutoff = now.minus(self.policy.window);

        let mut query = Query::new(collection).filter(Filter::lt(self.target.age_field(), cutoff));
        if self.target == SweepTarget::Friendships {
            query = query.filter(Filter::eq(fields::STATUS, FriendshipStatus::PENDING));
        }
        let expired = self.store.query(&query).await?;

        let mut report = SweepReport {
            collection: collection.to_string(),
            dry_run: self.dry_run,
            matched: expired.len(),
            ..SweepReport::default()
        };
        if expired.is_empty() {
            info!(collection, cutoff = %cutoff, "No expired records");
            return Ok(report);
        }

        match self.target {
            SweepTarget::ChatBatches => self.sweep_families(expired, limit, &mut report).await,
            _ => self.sweep_flat(expired, limit, &mut report).await,
        }

        info!(
            collection,
            dry_run = self.dry_run,
            matched = report.matched,
            deleted = report.deleted,
            children_deleted = report.children_deleted,
            counters_decremented = report.counters_decremented,
            chunks_committed = report.chunks_committed,
            chunks_failed = report.chunks_failed,
            parents_skipped = report.parents_skipped,
            "Retention sweep finished"
        );
        if !self.dry_run {
            metrics::record_retention_deleted(collection, report.deleted as u64);
            metrics::record_retention_deleted(collections::MESSAGES, report.children_deleted as u64);
        }
        Ok(report)
    }

    async fn sweep_flat(&self, expired: Vec<Document>, limit: usize, report: &mut SweepReport) {
        let collection = self.target.collection();
        let records: Vec<FlatRecord> = expired
            .iter()
            .map(|doc| FlatRecord {
                path: doc.path.clone(),
                compensate: self.compensated_user(doc),
            })
            .collect();

        for chunk in plan_flat(records, limit) {
            let ids = ids_of(&chunk.deletes);
            let decrements = match self.target.counter() {
                Some(counter) if !chunk.decrements.is_empty() => {
                    match self.clamp_decrements(counter, &chunk.decrements).await {
                        Ok(decrements) => decrements,
                        Err(e) => {
                            self.chunk_failed(report, &ids, &e);
                            continue;
                        }
                    }
                }
                _ => Vec::new(),
            };
            let decremented: i64 = decrements.iter().map(|(_, n)| n).sum();

            if self.dry_run {
                info!(collection, ids = ?ids, decremented, "Dry run: would delete chunk");
                report.deleted += chunk.deletes.len();
                report.counters_decremented += decremented;
                continue;
            }

            let mut batch = WriteBatch::new();
            for path in chunk.deletes.iter().cloned() {
                batch.delete(path);
            }
            if let Some(counter) = self.target.counter() {
                for (user, n) in &decrements {
                    batch.increment(user.clone(), counter.field(), -n);
                }
            }

            match self.store.commit(batch).await {
                Ok(()) => {
                    debug!(collection, records = chunk.deletes.len(), decremented, "Committed retention chunk");
                    report.deleted += chunk.deletes.len();
                    report.counters_decremented += decremented;
                    report.chunks_committed += 1;
                    if let Some(counter) = self.target.counter() {
                        metrics::record_compensation(counter.field(), decremented as u64);
                    }
                }
                Err(e) => self.chunk_failed(report, &ids, &e),
            }
        }
    }

    async fn sweep_families(
        &self,
        expired: Vec<Document>,
        limit: usize,
        report: &mut SweepReport,
    ) {
        let collection = self.target.collection();
        let mut units = Vec::with_capacity(expired.len());
        for parent in expired {
            let children = match self
                .store
                .query(&Query::new(parent.path.child_collection(collections::MESSAGES)))
                .await
            {
                Ok(children) => children,
                Err(e) => {
                    error!(collection, parent = %parent.id(), error = %e, "Cannot list children; leaving parent for the next sweep");
                    report.parents_skipped += 1;
                    metrics::record_chunk_failure(collection);
                    continue;
                }
            };
            units.push(FamilyUnit {
                parent: parent.path,
                children: children.into_iter().map(|doc| doc.path).collect(),
            });
        }

        for plan in plan_families(units, limit) {
            match plan {
                FamilyPlan::Packed(batch) => {
                    let ids = ids_of(&batch.parents);
                    if self.dry_run {
                        info!(collection, ids = ?ids, children = batch.children_count(), "Dry run: would delete chunk");
                        report.deleted += batch.parents.len();
                        report.children_deleted += batch.children_count();
                        continue;
                    }
                    let writes: WriteBatch = batch.deletes.iter().cloned().map(delete_op).collect();
                    match self.store.commit(writes).await {
                        Ok(()) => {
                            report.deleted += batch.parents.len();
                            report.children_deleted += batch.children_count();
                            report.chunks_committed += 1;
                        }
                        Err(e) => self.chunk_failed(report, &ids, &e),
                    }
                }
                FamilyPlan::Sequence { parent, batches } => {
                    self.commit_sequence(&parent, batches, report).await;
                }
            }
        }
    }

    /// Commits the batches of one oversized unit in order. The parent is
    /// deleted only if every batch before it committed.
    async fn commit_sequence(
        &self,
        parent: &DocumentPath,
        batches: Vec<Vec<DocumentPath>>,
        report: &mut SweepReport,
    ) {
        let collection = self.target.collection();
        for deletes in batches {
            let includes_parent = deletes.last() == Some(parent);
            let children = deletes.len() - usize::from(includes_parent);

            if self.dry_run {
                info!(collection, parent = %parent.id(), children, includes_parent, "Dry run: would delete chunk");
            } else {
                let writes: WriteBatch = deletes.into_iter().map(delete_op).collect();
                if let Err(e) = self.store.commit(writes).await {
                    self.chunk_failed(report, &[parent.id().to_string()], &e);
                    warn!(collection, parent = %parent.id(), "Leaving parent for the next sweep");
                    return;
                }
                report.chunks_committed += 1;
            }
            report.children_deleted += children;
            if includes_parent {
                report.deleted += 1;
            }
        }
    }

    /// User whose counter `doc` contributed to, if compensation applies.
    fn compensated_user(&self, doc: &Document) -> Option<String> {
        if !self.policy.compensate {
            return None;
        }
        let decoded = match self.target {
            SweepTarget::Interests => Interest::from_document(doc).map(|i| i.to_user_id),
            SweepTarget::Friendships => Friendship::from_document(doc).map(|f| f.receiver_id),
            SweepTarget::ChatBatches | SweepTarget::ProcessedEvents => return None,
        };
        match decoded {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(path = %doc.path, error = %e, "Cannot resolve counter owner; deleting without compensation");
                None
            }
        }
    }

    /// Reads the users of one chunk and clamps each aggregated decrement to
    /// the counter's current value. Users that no longer exist are skipped.
    async fn clamp_decrements(
        &self,
        counter: Counter,
        decrements: &BTreeMap<String, i64>,
    ) -> Result<Vec<(DocumentPath, i64)>, StorageError> {
        let paths: Vec<(DocumentPath, i64)> = decrements
            .iter()
            .filter_map(|(user, n)| match DocumentPath::new(collections::USERS, user.as_str()) {
                Ok(path) => Some((path, *n)),
                Err(e) => {
                    warn!(user_id = %user, error = %e, "Invalid user id; skipping compensation");
                    None
                }
            })
            .collect();

        let reads = join_all(paths.iter().map(|(path, _)| self.store.get(path))).await;

        let mut clamped = Vec::with_capacity(paths.len());
        for ((path, wanted), read) in paths.into_iter().zip(reads) {
            let Some(user) = read? else {
                warn!(user_id = %path.id(), counter = %counter, "User no longer exists; skipping compensation");
                continue;
            };
            let current = user.get_i64(counter.field()).unwrap_or(0).max(0);
            let applied = wanted.min(current);
            if applied < wanted {
                warn!(
                    user_id = %path.id(),
                    counter = %counter,
                    current,
                    wanted,
                    "Counter lower than the records it should reflect; clamping at zero"
                );
            }
            if applied > 0 {
                clamped.push((path, applied));
            }
        }
        Ok(clamped)
    }

    fn chunk_failed(&self, report: &mut SweepReport, ids: &[String], e: &dyn std::error::Error) {
        let collection = self.target.collection();
        error!(collection, ids = ?ids, error = %e, "Retention chunk failed");
        report.chunks_failed += 1;
        metrics::record_chunk_failure(collection);
    }
}

fn delete_op(path: DocumentPath) -> kindred_storage::WriteOp {
    kindred_storage::WriteOp::Delete { path }
}

fn ids_of(paths: &[DocumentPath]) -> Vec<String> {
    paths.iter().map(|p| p.id().to_string()).collect()
}
