//! Collar handlers: device enrollment and heartbeat plus management reads

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::middleware::auth::{hash_token, DeviceContext, UserContext};
use crate::models::{
    AssignCollarRequest, Collar, EnrollCollarRequest, EnrollCollarResponse, HeartbeatRequest,
    HeartbeatResponse, ListQuery,
};
use crate::{AppError, AppResult, AppState};

/// Enroll a collar device. Requires the shared enrollment key; re-enrolling
/// a known device rotates its token.
pub async fn enroll(
    State(state): State<AppState>,
    Json(req): Json<EnrollCollarRequest>,
) -> AppResult<Json<EnrollCollarResponse>> {
    if req.enrollment_key != state.config.collar_enroll_key {
        return Err(AppError::Unauthorized);
    }

    let token = Uuid::new_v4().to_string();
    let token_hash = hash_token(&token);

    let collar = Collar::enroll(
        &state.pool,
        &req.device_id,
        req.firmware_version.as_deref(),
        &token_hash,
    )
    .await?;

    tracing::info!("Collar enrolled: {} ({})", collar.device_id, collar.id);

    Ok(Json(EnrollCollarResponse {
        collar_id: collar.id,
        token,
    }))
}

/// Collar heartbeat: battery, GPS and online status
pub async fn heartbeat(
    State(state): State<AppState>,
    device: DeviceContext,
    Json(req): Json<HeartbeatRequest>,
) -> AppResult<Json<HeartbeatResponse>> {
    Collar::update_heartbeat(&state.pool, device.collar_id, &req).await?;

    Ok(Json(HeartbeatResponse {
        server_time: Utc::now().timestamp(),
        dog_id: device.dog_id,
    }))
}

pub async fn list(
    State(state): State<AppState>,
    _user: UserContext,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Collar>>> {
    let collars = Collar::list(
        &state.pool,
        query.skip.unwrap_or(0),
        query.limit.unwrap_or(100),
    )
    .await?;
    Ok(Json(collars))
}

pub async fn get(
    State(state): State<AppState>,
    _user: UserContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Collar>> {
    let collar = Collar::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Collar not found".to_string()))?;
    Ok(Json(collar))
}

/// Attach a collar to a dog (or detach with a null dog_id)
pub async fn assign(
    State(state): State<AppState>,
    _user: UserContext,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignCollarRequest>,
) -> AppResult<Json<Collar>> {
    if let Some(dog_id) = req.dog_id {
        crate::models::Dog::find_by_id(&state.pool, dog_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Dog not found".to_string()))?;
    }

    let collar = Collar::assign_dog(&state.pool, id, req.dog_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Collar not found".to_string()))?;
    Ok(Json(collar))
}
