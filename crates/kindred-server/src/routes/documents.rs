use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use kindred_core::DocumentPath;
use kindred_core::document::fields_from_json;

use crate::error::ApiError;
use crate::server::AppState;

/// Creates a document with a store-assigned id. Creations fire the
/// in-process triggers.
pub async fn create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = fields_from_json(payload)?;
    let doc = state.store.create(&collection, None, fields).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn read(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let path = DocumentPath::new(collection, id)?;
    match state.store.get(&path).await? {
        Some(doc) => Ok(Json(doc)),
        None => Err(ApiError::NotFound(format!("Document {path} not found"))),
    }
}
