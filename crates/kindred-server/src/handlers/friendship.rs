use std::sync::Arc;

use async_trait::async_trait;
use kindred_core::model::collections;
use kindred_core::{Counter, Fields, Friendship};
use kindred_notifications::NotificationKind;

use super::{EventHandler, HandlerContext, HandlerError, HandlerOutcome, source_path};

/// `friendships/{id}` created: +1 on the receiver's
/// `totalFriendRequestsCount`, then a "new friend request" notification.
pub struct FriendshipHandler {
    context: Arc<HandlerContext>,
}

impl FriendshipHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl EventHandler for FriendshipHandler {
    fn name(&self) -> &'static str {
        "friendship"
    }

    fn collection(&self) -> &'static str {
        collections::FRIENDSHIPS
    }

    async fn process(&self, id: &str, fields: &Fields) -> Result<HandlerOutcome, HandlerError> {
        let request = Friendship::from_fields(id, fields)
            .map_err(|e| HandlerError::Validation(e.to_string()))?;
        let source = source_path(self.collection(), id)?;

        self.context
            .count_and_notify(
                self.name(),
                source,
                Counter::TotalFriendRequests,
                NotificationKind::FriendRequest,
                &request.sender_id,
                &request.receiver_id,
            )
            .await
    }
}
