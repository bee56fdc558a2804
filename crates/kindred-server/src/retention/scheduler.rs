//! Background retention scheduler.
//!
//! Each sweeper gets its own task ticking at its own interval. All tasks
//! stop when the returned watch sender publishes `true`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use super::sweeper::RetentionSweeper;

pub struct RetentionScheduler {
    jobs: Vec<(Arc<RetentionSweeper>, Duration)>,
}

impl RetentionScheduler {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    #[must_use]
    pub fn with_job(mut self, sweeper: Arc<RetentionSweeper>, every: Duration) -> Self {
        self.jobs.push((sweeper, every));
        self
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Start every job in a background task.
    ///
    /// Returns a shutdown sender that stops all of them.
    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        for (sweeper, every) in self.jobs {
            let mut shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let collection = sweeper.target().collection();
                info!(collection, interval_secs = every.as_secs(), "Retention sweeper started");

                let mut ticker = interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(e) = sweeper.run().await {
                                error!(collection, error = %e, "Retention sweep failed");
                            }
                        }
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                info!(collection, "Retention sweeper shutting down");
                                break;
                            }
                        }
                    }
                }
            });
        }

        shutdown_tx
    }
}

impl Default for RetentionScheduler {
    fn default() -> Self {
        Self::new()
    }
}
