//! Hook trait for reacting to document events.

use async_trait::async_trait;

use super::types::{DocumentEvent, DocumentEventType};

/// Error returned by a hook. Logged by the registry, never propagated to the
/// writer that produced the event.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Hook execution failed: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    pub fn execution(msg: impl Into<String>) -> Self {
        HookError::Execution(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        HookError::Storage(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        HookError::InvalidPayload(msg.into())
    }
}

/// Asynchronous reaction to document changes.
///
/// Hooks run in isolated tasks. The same event may be delivered more than
/// once, so implementations must be idempotent or detect replays themselves.
///
/// ```ignore
/// struct AuditHook;
///
/// #[async_trait]
/// impl DocumentHook for AuditHook {
///     fn name(&self) -> &str { "audit" }
///     fn collections(&self) -> &[&str] { &["interests"] }
///
///     async fn handle(&self, event: &DocumentEvent) -> Result<(), HookError> {
///         tracing::info!(path = %event.source_path(), "document changed");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait DocumentHook: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Collections this hook listens to. Empty means all.
    fn collections(&self) -> &[&str];

    /// Event types this hook listens to. Empty means all.
    fn event_types(&self) -> &[DocumentEventType] {
        &[]
    }

    async fn handle(&self, event: &DocumentEvent) -> Result<(), HookError>;

    async fn on_start(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), HookError> {
        Ok(())
    }

    fn matches(&self, event: &DocumentEvent) -> bool {
        let collections = self.collections();
        if !collections.is_empty() && !collections.contains(&event.collection.as_str()) {
            return false;
        }

        let event_types = self.event_types();
        event_types.is_empty() || event_types.contains(&event.event_type)
    }
}
