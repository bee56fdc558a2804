//! Event handlers: react to a created document by bumping the recipient's
//! counter and pushing a notification to their device.
//!
//! Each invocation runs
//! `validate -> count (once per source document) -> compose -> send`.
//! Validation failures and missing device tokens end the invocation early
//! without an error. Gateway failures are logged and reported in the
//! outcome; the counter is not rolled back. Store failures propagate so the
//! trigger runtime can retry.

mod friendship;
mod hook;
mod interest;

pub use friendship::FriendshipHandler;
pub use hook::HandlerHook;
pub use interest::InterestHandler;

use std::sync::Arc;

use async_trait::async_trait;
use kindred_core::{Counter, DocumentPath, Fields};
use kindred_notifications::{Composer, Composition, DynGateway, NotificationError, NotificationKind};
use kindred_storage::{DynStore, StorageError};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::ledger::{CounterLedger, LedgerError, LedgerOutcome};
use crate::metrics;
use crate::processed::ProcessedMarker;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload cannot describe a valid event. Never retried.
    #[error("Invalid event payload: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StorageError),

    #[error("Notification composition failed: {0}")]
    Compose(String),
}

impl HandlerError {
    pub fn is_validation(&self) -> bool {
        matches!(self, HandlerError::Validation(_))
    }
}

impl From<LedgerError> for HandlerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Store(e) => HandlerError::Store(e),
            other => HandlerError::Validation(other.to_string()),
        }
    }
}

impl From<NotificationError> for HandlerError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::Storage(e) => HandlerError::Store(e),
            other => HandlerError::Compose(other.to_string()),
        }
    }
}

/// The path an invocation took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandlerOutcome {
    /// Invalid payload; nothing was written or sent.
    Skipped { reason: String },
    /// The source document was already processed.
    Duplicate,
    /// Counted, but the recipient has no device to notify.
    NoDeviceToken,
    Delivered { message_id: Option<String> },
    DeliveryFailed { error: String },
}

impl HandlerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerOutcome::Skipped { .. } => "skipped",
            HandlerOutcome::Duplicate => "duplicate",
            HandlerOutcome::NoDeviceToken => "no_device_token",
            HandlerOutcome::Delivered { .. } => "delivered",
            HandlerOutcome::DeliveryFailed { .. } => "delivery_failed",
        }
    }
}

/// Reacts to documents created in one collection.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs, metrics and processed-event keys.
    fn name(&self) -> &'static str;

    fn collection(&self) -> &'static str;

    /// Runs one invocation for the document `id` with `fields`.
    async fn process(&self, id: &str, fields: &Fields) -> Result<HandlerOutcome, HandlerError>;

    /// [`process`](Self::process) with validation failures turned into
    /// [`HandlerOutcome::Skipped`] and the outcome recorded in metrics.
    async fn handle(&self, id: &str, fields: &Fields) -> Result<HandlerOutcome, HandlerError> {
        let result = match self.process(id, fields).await {
            Err(HandlerError::Validation(reason)) => {
                warn!(handler = self.name(), document_id = %id, reason = %reason, "Invalid event, skipping");
                Ok(HandlerOutcome::Skipped { reason })
            }
            other => other,
        };
        match &result {
            Ok(outcome) => metrics::record_event_handled(self.name(), outcome.as_str()),
            Err(e) => {
                error!(handler = self.name(), document_id = %id, error = %e, "Event handling failed");
                metrics::record_event_handled(self.name(), "error");
            }
        }
        result
    }
}

/// Services shared by every handler.
pub struct HandlerContext {
    ledger: CounterLedger,
    composer: Composer,
    gateway: DynGateway,
}

impl HandlerContext {
    pub fn new(store: DynStore, gateway: DynGateway) -> Self {
        Self {
            ledger: CounterLedger::new(store.clone()),
            composer: Composer::new(store),
            gateway,
        }
    }

    /// Counts the event once for `recipient_id`, then notifies them.
    async fn count_and_notify(
        &self,
        handler: &str,
        source: DocumentPath,
        counter: Counter,
        kind: NotificationKind,
        actor_id: &str,
        recipient_id: &str,
    ) -> Result<HandlerOutcome, HandlerError> {
        let marker = ProcessedMarker::new(handler, source);
        match self
            .ledger
            .apply_delta_once(recipient_id, counter, 1, &marker)
            .await?
        {
            LedgerOutcome::Duplicate => return Ok(HandlerOutcome::Duplicate),
            LedgerOutcome::Incremented | LedgerOutcome::Initialized => {}
            LedgerOutcome::RejectedDecrement => {
                return Err(HandlerError::Validation(
                    "increment was treated as a decrement".into(),
                ));
            }
        }

        let message = match self.composer.compose(kind, actor_id, recipient_id).await? {
            Composition::Ready(message) => message,
            Composition::Skip(_) => return Ok(HandlerOutcome::NoDeviceToken),
        };

        let outcome = match self.gateway.send(&message).await {
            Ok(result) if result.success => {
                info!(
                    handler,
                    recipient = %recipient_id,
                    gateway = self.gateway.name(),
                    message_id = result.message_id.as_deref().unwrap_or(""),
                    "Notification sent"
                );
                metrics::record_notification("delivered");
                HandlerOutcome::Delivered {
                    message_id: result.message_id,
                }
            }
            Ok(result) => {
                let error = result.error.unwrap_or_else(|| "rejected".to_string());
                warn!(handler, recipient = %recipient_id, error = %error, "Gateway rejected notification");
                metrics::record_notification("rejected");
                HandlerOutcome::DeliveryFailed { error }
            }
            Err(e) => {
                warn!(handler, recipient = %recipient_id, error = %e, "Notification delivery failed");
                metrics::record_notification("error");
                HandlerOutcome::DeliveryFailed {
                    error: e.to_string(),
                }
            }
        };
        Ok(outcome)
    }
}

/// Every handler, addressable by the collection it listens to.
#[derive(Clone)]
pub struct Handlers {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl Handlers {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self {
            handlers: vec![
                Arc::new(InterestHandler::new(context.clone())),
                Arc::new(FriendshipHandler::new(context)),
            ],
        }
    }

    pub fn for_collection(&self, collection: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers
            .iter()
            .find(|h| h.collection() == collection)
            .cloned()
    }

    /// Hooks for the in-process trigger runtime.
    pub fn hooks(&self) -> Vec<Arc<HandlerHook>> {
        self.handlers
            .iter()
            .map(|h| Arc::new(HandlerHook::new(h.clone())))
            .collect()
    }
}

fn source_path(collection: &str, id: &str) -> Result<DocumentPath, HandlerError> {
    DocumentPath::new(collection, id).map_err(|e| HandlerError::Validation(e.to_string()))
}
