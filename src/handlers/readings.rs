//! Telemetry handlers: ingestion and historical queries

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::auth::{DeviceContext, UserContext};
use crate::models::{CreateReading, ReadingFilter, SensorReading};
use crate::scoring::pipeline;
use crate::{AppError, AppResult, AppState};

/// The ingestion boundary: validate, score and record one reading. The
/// response carries the enriched reading, score fields included.
pub async fn ingest(
    State(state): State<AppState>,
    device: DeviceContext,
    Json(payload): Json<CreateReading>,
) -> AppResult<Json<SensorReading>> {
    payload.validate()?;

    // A collar may only report for the dog it is assigned to
    match device.dog_id {
        Some(assigned) if assigned == payload.dog_id => {}
        Some(_) => {
            return Err(AppError::ValidationError(
                "Collar is not assigned to this dog".to_string(),
            ))
        }
        None => {
            return Err(AppError::ValidationError(
                "Collar is not assigned to any dog".to_string(),
            ))
        }
    }

    let reading = pipeline::score_and_record(&state, device.collar_id, payload).await?;
    Ok(Json(reading))
}

/// Historical readings for a dog, newest first, optionally time-bounded
pub async fn history(
    State(state): State<AppState>,
    _user: UserContext,
    Path(dog_id): Path<Uuid>,
    Query(filter): Query<ReadingFilter>,
) -> AppResult<Json<Vec<SensorReading>>> {
    let readings = SensorReading::list_by_dog(&state.pool, dog_id, filter).await?;
    Ok(Json(readings))
}

/// Most recent enriched reading for a dog, served from the TTL cache
pub async fn latest(
    State(state): State<AppState>,
    _user: UserContext,
    Path(dog_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .latest
        .get(dog_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No recent data found".to_string()))
}
