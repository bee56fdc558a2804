use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

/// Domain event a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Interest,
    FriendRequest,
}

impl NotificationKind {
    /// Value of the `type` data key; also the template id.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Interest => "interest",
            NotificationKind::FriendRequest => "friend_request",
        }
    }

    /// Client routing hint carried in the `screen` data key.
    pub fn screen(&self) -> &'static str {
        match self {
            NotificationKind::Interest => "interests",
            NotificationKind::FriendRequest => "friend_requests",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-visible part of a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

/// A push message addressed to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub token: String,
    pub notification: PushNotification,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn new(
        token: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            notification: PushNotification {
                title: title.into(),
                body: body.into(),
            },
            data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Rejects messages with an empty token, title or body.
    pub fn validate(&self) -> Result<(), NotificationError> {
        for (name, value) in [
            ("token", &self.token),
            ("title", &self.notification.title),
            ("body", &self.notification.body),
        ] {
            if value.trim().is_empty() {
                return Err(NotificationError::InvalidMessage(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(())
    }
}
