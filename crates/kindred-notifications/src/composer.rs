//! Turns a domain event into a ready-to-send push message.

use std::collections::HashMap;

use kindred_core::model::collections;
use kindred_core::{DocumentPath, User};
use kindred_storage::DynStore;
use tracing::info;

use crate::error::NotificationError;
use crate::templates::TemplateRenderer;
use crate::types::{NotificationKind, PushMessage};

/// Name used when the actor has none on record.
pub const FALLBACK_ACTOR_NAME: &str = "Someone";

/// Why no message was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    RecipientMissing,
    NoDeviceToken,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::RecipientMissing => "recipient_missing",
            SkipReason::NoDeviceToken => "no_device_token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composition {
    Ready(PushMessage),
    Skip(SkipReason),
}

/// Reads recipient and actor and renders the message for one event.
pub struct Composer {
    store: DynStore,
    renderer: TemplateRenderer,
}

impl Composer {
    pub fn new(store: DynStore) -> Self {
        Self::with_renderer(store, TemplateRenderer::with_defaults())
    }

    pub fn with_renderer(store: DynStore, renderer: TemplateRenderer) -> Self {
        Self { store, renderer }
    }

    /// Builds the message `actor_id` triggers for `recipient_id`.
    ///
    /// A recipient without a device token is a normal outcome
    /// ([`Composition::Skip`]). Store failures propagate.
    pub async fn compose(
        &self,
        kind: NotificationKind,
        actor_id: &str,
        recipient_id: &str,
    ) -> Result<Composition, NotificationError> {
        let recipient_path = user_path(recipient_id)?;
        let actor_path = user_path(actor_id)?;

        let (recipient, actor) = tokio::join!(
            self.store.get(&recipient_path),
            self.store.get(&actor_path)
        );

        let Some(recipient) = recipient? else {
            info!(recipient = %recipient_id, kind = %kind, "Recipient not found, skipping notification");
            return Ok(Composition::Skip(SkipReason::RecipientMissing));
        };
        let Some(token) = User::from_document(&recipient).device_token else {
            info!(recipient = %recipient_id, kind = %kind, "Recipient has no device token, skipping notification");
            return Ok(Composition::Skip(SkipReason::NoDeviceToken));
        };

        let actor_name = actor?
            .and_then(|doc| User::from_document(&doc).display_name)
            .unwrap_or_else(|| FALLBACK_ACTOR_NAME.to_string());

        let rendered = self
            .renderer
            .render(kind.as_str(), &HashMap::from([("actorName", actor_name)]))?;

        Ok(Composition::Ready(
            PushMessage::new(token, rendered.title, rendered.body)
                .with_data("type", kind.as_str())
                .with_data("screen", kind.screen())
                .with_data("actorId", actor_id),
        ))
    }
}

fn user_path(user_id: &str) -> Result<DocumentPath, NotificationError> {
    DocumentPath::new(collections::USERS, user_id)
        .map_err(|e| NotificationError::InvalidMessage(e.to_string()))
}
