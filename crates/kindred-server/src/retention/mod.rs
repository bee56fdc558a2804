//! Scheduled retention: purge expired records and reverse the counter
//! increments they caused.
//!
//! | collection         | cadence | window   | compensation                     |
//! |--------------------|---------|----------|----------------------------------|
//! | `interests`        | 24 h    | 30 days  | `totalInterestsCount` of `toUserId` |
//! | `friendships`      | 24 h    | 30 days  | `totalFriendRequestsCount` of the receiver, pending only |
//! | `chat_batches`     | 12 h    | 12 hours | none; `messages` children deleted first |
//! | `processed_events` | 24 h    | 7 days   | none                             |

pub mod planner;
pub mod scheduler;
pub mod sweeper;

pub use scheduler::RetentionScheduler;
pub use sweeper::{RetentionError, RetentionSweeper, SweepPolicy, SweepReport, SweepTarget};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kindred_storage::DynStore;

use crate::config::RetentionConfig;

struct Entry {
    sweeper: Arc<RetentionSweeper>,
    interval: Duration,
    enabled: bool,
}

/// Every sweeper, configured. Disabled sweepers can still be run on demand;
/// only the scheduler skips them.
pub struct RetentionService {
    entries: HashMap<SweepTarget, Entry>,
    scheduler_enabled: bool,
}

impl RetentionService {
    pub fn from_config(store: DynStore, cfg: &RetentionConfig) -> Self {
        let mut entries = HashMap::new();
        let mut add = |target: SweepTarget, policy: SweepPolicy, interval: Duration, enabled: bool| {
            let sweeper = RetentionSweeper::new(store.clone(), target, policy, cfg.batch_limit)
                .with_dry_run(cfg.dry_run);
            entries.insert(
                target,
                Entry {
                    sweeper: Arc::new(sweeper),
                    interval,
                    enabled,
                },
            );
        };

        add(
            SweepTarget::Interests,
            SweepPolicy {
                window: cfg.interests.window(),
                compensate: cfg.interests.compensate_counter,
            },
            cfg.interests.interval(),
            cfg.interests.enabled,
        );
        add(
            SweepTarget::Friendships,
            SweepPolicy {
                window: cfg.friendships.window(),
                compensate: cfg.friendships.compensate_counter,
            },
            cfg.friendships.interval(),
            cfg.friendships.enabled,
        );
        add(
            SweepTarget::ChatBatches,
            SweepPolicy {
                window: cfg.chat_batches.window(),
                compensate: false,
            },
            cfg.chat_batches.interval(),
            cfg.chat_batches.enabled,
        );
        add(
            SweepTarget::ProcessedEvents,
            SweepPolicy {
                window: cfg.processed_events.window(),
                compensate: false,
            },
            cfg.processed_events.interval(),
            cfg.processed_events.enabled,
        );

        Self {
            entries,
            scheduler_enabled: cfg.enabled,
        }
    }

    pub fn sweeper(&self, target: SweepTarget) -> Option<Arc<RetentionSweeper>> {
        self.entries.get(&target).map(|e| e.sweeper.clone())
    }

    /// Runs one sweep now, whether or not it is scheduled.
    pub async fn run(&self, target: SweepTarget) -> Result<SweepReport, RetentionError> {
        let sweeper = self
            .sweeper(target)
            .ok_or_else(|| RetentionError::UnknownTarget(target.to_string()))?;
        sweeper.run().await
    }

    /// Scheduler for the enabled sweepers. Empty when retention is disabled.
    pub fn scheduler(&self) -> RetentionScheduler {
        let mut scheduler = RetentionScheduler::new();
        if !self.scheduler_enabled {
            return scheduler;
        }
        for target in SweepTarget::ALL {
            if let Some(entry) = self.entries.get(&target).filter(|e| e.enabled) {
                scheduler = scheduler.with_job(entry.sweeper.clone(), entry.interval);
            }
        }
        scheduler
    }
}
