use axum::{
    Json,
    extract::{Path, State},
};
use kindred_core::Counter;
use serde::Deserialize;

use crate::error::ApiError;
use crate::maintenance::MaintenanceReport;
use crate::retention::{SweepReport, SweepTarget};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: String,
}

fn parse_counter(raw: &str) -> Result<Counter, ApiError> {
    raw.parse::<Counter>()
        .map_err(|e| ApiError::NotFound(e.to_string()))
}

pub async fn reset_counter(
    State(state): State<AppState>,
    Path(counter): Path<String>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<MaintenanceReport>, ApiError> {
    let counter = parse_counter(&counter)?;
    let report = state.maintenance.reset(counter, &request.confirm).await?;
    Ok(Json(report))
}

pub async fn recount_counter(
    State(state): State<AppState>,
    Path(counter): Path<String>,
) -> Result<Json<MaintenanceReport>, ApiError> {
    let counter = parse_counter(&counter)?;
    let report = state.maintenance.recount(counter).await?;
    Ok(Json(report))
}

pub async fn run_sweep(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<SweepReport>, ApiError> {
    let target: SweepTarget = collection.parse()?;
    let report = state.retention.run(target).await?;
    Ok(Json(report))
}
