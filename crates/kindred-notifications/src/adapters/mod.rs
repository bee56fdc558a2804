pub mod fcm;
pub mod log;

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::types::PushMessage;

/// Result of handing a message to a push gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    /// Gateway-assigned id of the accepted message.
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl SendResult {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Delivers push messages to devices.
///
/// A gateway that answered but refused the message returns `Ok` with
/// `success == false`; `Err` is reserved for transport failures.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<SendResult, NotificationError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

pub use fcm::{FcmAdapter, FcmConfig};
pub use log::LogGateway;
