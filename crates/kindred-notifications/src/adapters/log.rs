use async_trait::async_trait;
use tracing::info;

use super::{PushGateway, SendResult};
use crate::error::NotificationError;
use crate::types::PushMessage;

/// Gateway that only logs what it would send. Used for local runs and
/// dry-run deployments.
#[derive(Debug, Default)]
pub struct LogGateway;

impl LogGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushGateway for LogGateway {
    async fn send(&self, message: &PushMessage) -> Result<SendResult, NotificationError> {
        message.validate()?;
        let message_id = format!("log/{}", uuid::Uuid::new_v4().simple());
        info!(
            message_id = %message_id,
            token = %redact(&message.token),
            title = %message.notification.title,
            body = %message.notification.body,
            data = ?message.data,
            "Push message not sent (log gateway)"
        );
        Ok(SendResult::delivered(message_id))
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Keeps the first few characters of a device token.
fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}
