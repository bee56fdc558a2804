use std::sync::Arc;

use async_trait::async_trait;
use kindred_core::events::{DocumentEvent, DocumentEventType, DocumentHook, HookError};

use super::EventHandler;

const CREATED_ONLY: &[DocumentEventType] = &[DocumentEventType::Created];

/// Runs an [`EventHandler`] for creation events from the in-process
/// broadcaster.
pub struct HandlerHook {
    handler: Arc<dyn EventHandler>,
    collections: [&'static str; 1],
}

impl HandlerHook {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        let collections = [handler.collection()];
        Self {
            handler,
            collections,
        }
    }
}

#[async_trait]
impl DocumentHook for HandlerHook {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn collections(&self) -> &[&str] {
        &self.collections
    }

    fn event_types(&self) -> &[DocumentEventType] {
        CREATED_ONLY
    }

    async fn handle(&self, event: &DocumentEvent) -> Result<(), HookError> {
        let fields = event
            .fields
            .as_ref()
            .ok_or_else(|| HookError::invalid_payload("created event without fields"))?;
        self.handler
            .handle(&event.document_id, fields)
            .await
            .map(|_| ())
            .map_err(|e| HookError::storage(e.to_string()))
    }
}
