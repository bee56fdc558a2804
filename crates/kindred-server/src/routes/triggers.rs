//! `POST /api/triggers/{collection}/{id}`: an external trigger runtime
//! reports that a document was created. The body is the document's fields.
//!
//! `204` means the event is done with (including invalid payloads, which are
//! never retried). `500` means a store failure; the runtime should redeliver.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kindred_core::document::fields_from_json;

use crate::error::ApiError;
use crate::server::AppState;

pub async fn ingest(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(payload): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
    let handler = state
        .handlers
        .for_collection(&collection)
        .ok_or_else(|| ApiError::NotFound(format!("No handler for collection '{collection}'")))?;
    let fields = fields_from_json(payload)?;

    match handler.handle(&id, &fields).await {
        Ok(outcome) => {
            tracing::debug!(collection = %collection, document_id = %id, outcome = outcome.as_str(), "Trigger handled");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}
