use std::sync::Arc;

use async_trait::async_trait;
use kindred_core::model::collections;
use kindred_core::{Counter, Fields, Interest};
use kindred_notifications::NotificationKind;

use super::{EventHandler, HandlerContext, HandlerError, HandlerOutcome, source_path};

/// `interests/{id}` created: +1 on the recipient's `totalInterestsCount`,
/// then a "new interest" notification naming the sender.
pub struct InterestHandler {
    context: Arc<HandlerContext>,
}

impl InterestHandler {
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl EventHandler for InterestHandler {
    fn name(&self) -> &'static str {
        "interest"
    }

    fn collection(&self) -> &'static str {
        collections::INTERESTS
    }

    async fn process(&self, id: &str, fields: &Fields) -> Result<HandlerOutcome, HandlerError> {
        let interest =
            Interest::from_fields(id, fields).map_err(|e| HandlerError::Validation(e.to_string()))?;
        let source = source_path(self.collection(), id)?;

        self.context
            .count_and_notify(
                self.name(),
                source,
                Counter::TotalInterests,
                NotificationKind::Interest,
                &interest.from_user_id,
                &interest.to_user_id,
            )
            .await
    }
}
