use kindred_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Transport-level failure: the gateway could not be reached or answered
    /// with something unreadable.
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
