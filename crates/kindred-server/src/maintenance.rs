//! Operator-triggered counter maintenance. Never scheduled.
//!
//! `reset` zeroes a counter on every user and is gated twice: the
//! `maintenance.allow_reset` switch, and a per-call confirmation text that
//! must read `reset <counterName>`. `recount` rebuilds a counter from the
//! retained source records and only writes users whose value differs.

use std::collections::HashMap;

use kindred_core::model::collections;
use kindred_core::{Counter, Document, Fields, Friendship, Interest, Value};
use kindred_storage::{DynStore, Query, StorageError, WriteBatch};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("Counter reset is disabled; set maintenance.allow_reset = true to enable it")]
    ResetDisabled,

    #[error("Confirmation text must be '{expected}'")]
    ConfirmationMismatch { expected: String },

    #[error(transparent)]
    Store(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub counter: Counter,
    pub users_scanned: usize,
    pub users_updated: usize,
    pub chunks_failed: usize,
}

pub struct CounterMaintenance {
    store: DynStore,
    allow_reset: bool,
    batch_limit: usize,
}

impl CounterMaintenance {
    pub fn new(store: DynStore, allow_reset: bool, batch_limit: usize) -> Self {
        Self {
            store,
            allow_reset,
            batch_limit,
        }
    }

    /// Text a caller must pass to reset `counter`.
    pub fn confirmation_for(counter: Counter) -> String {
        format!("reset {counter}")
    }

    /// Sets `counter` to 0 on every user.
    pub async fn reset(
        &self,
        counter: Counter,
        confirmation: &str,
    ) -> Result<MaintenanceReport, MaintenanceError> {
        if !self.allow_reset {
            warn!(counter = %counter, "Refused counter reset: disabled by configuration");
            return Err(MaintenanceError::ResetDisabled);
        }
        let expected = Self::confirmation_for(counter);
        if confirmation.trim() != expected {
            warn!(counter = %counter, "Refused counter reset: confirmation mismatch");
            return Err(MaintenanceError::ConfirmationMismatch { expected });
        }

        let users = self.store.query(&Query::new(collections::USERS)).await?;
        warn!(counter = %counter, users = users.len(), "Resetting counter on every user");

        let updates = users.iter().map(|user| (user, 0));
        let report = self.write_values(counter, users.len(), updates).await;
        info!(
            counter = %counter,
            users_updated = report.users_updated,
            chunks_failed = report.chunks_failed,
            "Counter reset finished"
        );
        Ok(report)
    }

    /// Recomputes `counter` for every user from the records that justify it.
    pub async fn recount(&self, counter: Counter) -> Result<MaintenanceReport, MaintenanceError> {
        let expected = self.expected_counts(counter).await?;
        let users = self.store.query(&Query::new(collections::USERS)).await?;

        let mut matched = 0;
        let updates: Vec<(&Document, i64)> = users
            .iter()
            .filter_map(|user| {
                let want = expected.get(user.id()).copied().unwrap_or(0);
                if want > 0 {
                    matched += 1;
                }
                (user.get_i64(counter.field()) != Some(want)).then_some((user, want))
            })
            .collect();

        let orphaned = expected.len() - matched;
        if orphaned > 0 {
            warn!(counter = %counter, orphaned, "Records reference users that do not exist");
        }

        let report = self.write_values(counter, users.len(), updates).await;
        info!(
            counter = %counter,
            users_scanned = report.users_scanned,
            users_updated = report.users_updated,
            chunks_failed = report.chunks_failed,
            "Counter recount finished"
        );
        Ok(report)
    }

    async fn expected_counts(&self, counter: Counter) -> Result<HashMap<String, i64>, StorageError> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        match counter {
            Counter::TotalInterests => {
                let interests = self.store.query(&Query::new(collections::INTERESTS)).await?;
                for doc in &interests {
                    match Interest::from_document(doc) {
                        Ok(interest) => *counts.entry(interest.to_user_id).or_insert(0) += 1,
                        Err(e) => warn!(path = %doc.path, error = %e, "Skipping invalid interest"),
                    }
                }
            }
            // Every created request was counted and only swept pending ones
            // are decremented, so accepted or declined records still count.
            Counter::TotalFriendRequests => {
                let requests = Query::new(collections::FRIENDSHIPS);
                for doc in &self.store.query(&requests).await? {
                    match Friendship::from_document(doc) {
                        Ok(request) => *counts.entry(request.receiver_id).or_insert(0) += 1,
                        Err(e) => warn!(path = %doc.path, error = %e, "Skipping invalid friend request"),
                    }
                }
            }
        }
        Ok(counts)
    }

    /// Writes `counter = value` for each user in chunks. A failed chunk is
    /// logged and the remaining chunks still run.
    async fn write_values<'a>(
        &self,
        counter: Counter,
        users_scanned: usize,
        updates: impl IntoIterator<Item = (&'a Document, i64)>,
    ) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            counter,
            users_scanned,
            users_updated: 0,
            chunks_failed: 0,
        };
        let limit = self.batch_limit.min(self.store.max_batch_ops()).max(1);
        let updates: Vec<(&Document, i64)> = updates.into_iter().collect();

        for chunk in updates.chunks(limit) {
            let mut batch = WriteBatch::new();
            for (user, value) in chunk {
                batch.set_merge(
                    user.path.clone(),
                    Fields::from([(counter.field().to_string(), Value::Integer(*value))]),
                );
            }
            match self.store.commit(batch).await {
                Ok(()) => report.users_updated += chunk.len(),
                Err(e) => {
                    let ids: Vec<&str> = chunk.iter().map(|(user, _)| user.id()).collect();
                    error!(counter = %counter, ids = ?ids, error = %e, "Counter maintenance chunk failed");
                    report.chunks_failed += 1;
                }
            }
        }
        report
    }
}
