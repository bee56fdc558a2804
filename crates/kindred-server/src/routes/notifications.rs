//! `POST /api/notifications/send`: hand one message to the push gateway.
//! No state is read or written.

use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use kindred_notifications::PushMessage;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub message_id: Option<String>,
}

pub async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut message = PushMessage::new(request.token, request.title, request.body);
    message.data = request.data;
    message
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let result = state
        .gateway
        .send(&message)
        .await
        .map_err(|e| ApiError::BadGateway(e.to_string()))?;

    if !result.success {
        let error = result.error.unwrap_or_else(|| "push gateway rejected the message".into());
        tracing::warn!(gateway = state.gateway.name(), error = %error, "Direct dispatch rejected");
        return Err(ApiError::BadGateway(error));
    }

    crate::metrics::record_notification("delivered");
    Ok((
        StatusCode::OK,
        Json(SendResponse {
            success: true,
            message_id: result.message_id,
        }),
    ))
}
