//! Bounded fan-out channel carrying document events to the hook dispatcher.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use super::types::DocumentEvent;
use crate::document::Fields;

/// Unread events each subscriber may hold before publishers wait.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Receiving half handed out by [`EventBroadcaster::subscribe`].
pub type EventReceiver = mpsc::Receiver<DocumentEvent>;

/// Multi-subscriber publisher of [`DocumentEvent`]s. Cheap to clone.
///
/// Every subscriber owns a bounded queue. When a queue is full, [`send`]
/// waits for the subscriber to catch up instead of dropping the event, so a
/// burst of writes slows the writers down rather than losing triggers.
/// Receivers see the channel close once every broadcaster clone is dropped.
///
/// [`send`]: EventBroadcaster::send
///
/// ```
/// use kindred_core::Fields;
/// use kindred_core::events::EventBroadcaster;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let broadcaster = EventBroadcaster::new();
/// let _receiver = broadcaster.subscribe();
/// assert_eq!(broadcaster.send_created("interests", "i1", Fields::new()).await, 1);
/// # });
/// ```
#[derive(Clone)]
pub struct EventBroadcaster {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<DocumentEvent>>>>,
    capacity: usize,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn senders(&self) -> Vec<mpsc::Sender<DocumentEvent>> {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.clone()
    }

    /// Publishes an event to every live subscriber, waiting while a
    /// subscriber's queue is full. Returns how many subscribers received it;
    /// 0 when nobody is listening.
    pub async fn send(&self, event: DocumentEvent) -> usize {
        let mut delivered = 0;
        for tx in self.senders() {
            if tx.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn send_created(
        &self,
        collection: impl Into<String>,
        document_id: impl Into<String>,
        fields: Fields,
    ) -> usize {
        self.send(DocumentEvent::created(collection, document_id, fields))
            .await
    }

    pub async fn send_deleted(
        &self,
        collection: impl Into<String>,
        document_id: impl Into<String>,
    ) -> usize {
        self.send(DocumentEvent::deleted(collection, document_id)).await
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders().len()
    }

    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}
