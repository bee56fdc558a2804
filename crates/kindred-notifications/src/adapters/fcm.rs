use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{PushGateway, SendResult};
use crate::error::NotificationError;
use crate::types::PushMessage;

pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    /// OAuth2 bearer token with the firebase.messaging scope.
    pub access_token: String,
    /// Base URL; overridable for tests and emulators.
    pub endpoint: String,
    pub timeout: Duration,
}

impl FcmConfig {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            access_token: access_token.into(),
            endpoint: DEFAULT_FCM_ENDPOINT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Firebase Cloud Messaging HTTP v1 adapter.
pub struct FcmAdapter {
    http_client: Client,
    send_url: String,
    access_token: String,
}

impl FcmAdapter {
    pub fn new(config: FcmConfig) -> Result<Self, NotificationError> {
        if config.project_id.trim().is_empty() {
            return Err(NotificationError::InvalidConfig("Missing project_id".into()));
        }
        if config.access_token.trim().is_empty() {
            return Err(NotificationError::InvalidConfig("Missing access_token".into()));
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;

        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            config.endpoint.trim_end_matches('/'),
            config.project_id
        );

        Ok(Self {
            http_client,
            send_url,
            access_token: config.access_token,
        })
    }
}

#[async_trait]
impl PushGateway for FcmAdapter {
    async fn send(&self, message: &PushMessage) -> Result<SendResult, NotificationError> {
        let body = json!({
            "message": {
                "token": &message.token,
                "notification": {
                    "title": &message.notification.title,
                    "body": &message.notification.body
                },
                "data": &message.data
            }
        });

        let response = self
            .http_client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if status.is_success() {
            let response_body: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| NotificationError::SendFailed(format!("unreadable response: {e}")))?;
            let name = response_body["name"].as_str().ok_or_else(|| {
                NotificationError::SendFailed("response carries no message name".into())
            })?;
            debug!(message_id = %name, "FCM accepted message");
            return Ok(SendResult::delivered(name));
        }

        // Error bodies are JSON (`{"error": {"status", "message"}}`) unless a
        // proxy answered instead.
        let error = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(body) if body["error"].is_object() => {
                let reason = body["error"]["status"]
                    .as_str()
                    .unwrap_or(status.as_str())
                    .to_string();
                let detail = body["error"]["message"].as_str().unwrap_or("Unknown error");
                format!("{reason}: {detail}")
            }
            _ => format!("HTTP {status}: {}", text.trim()),
        };
        Ok(SendResult::rejected(error))
    }

    fn name(&self) -> &str {
        "fcm"
    }
}
