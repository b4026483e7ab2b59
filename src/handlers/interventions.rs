//! Intervention handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::middleware::auth::UserContext;
use crate::models::{Intervention, InterventionFilter};
use crate::{AppError, AppResult, AppState};

/// List interventions, optionally filtered by dog
pub async fn list(
    State(state): State<AppState>,
    _user: UserContext,
    Query(filter): Query<InterventionFilter>,
) -> AppResult<Json<Vec<Intervention>>> {
    let interventions = Intervention::list(&state.pool, filter).await?;
    Ok(Json(interventions))
}

/// Acknowledge an intervention. One-way; repeated calls are no-ops.
pub async fn acknowledge(
    State(state): State<AppState>,
    _user: UserContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Intervention>> {
    let intervention = Intervention::acknowledge(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Intervention not found".to_string()))?;
    Ok(Json(intervention))
}
