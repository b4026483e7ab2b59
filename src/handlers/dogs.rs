//! Dog management handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::middleware::auth::UserContext;
use crate::models::{CreateDog, Dog, ListQuery};
use crate::{AppError, AppResult, AppState};

pub async fn create(
    State(state): State<AppState>,
    user: UserContext,
    Json(req): Json<CreateDog>,
) -> AppResult<Json<Dog>> {
    let dog = Dog::create(&state.pool, user.user_id, req).await?;
    tracing::info!("Dog registered: {} ({})", dog.name, dog.id);
    Ok(Json(dog))
}

pub async fn list(
    State(state): State<AppState>,
    _user: UserContext,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Dog>>> {
    let dogs = Dog::list(
        &state.pool,
        query.skip.unwrap_or(0),
        query.limit.unwrap_or(100),
    )
    .await?;
    Ok(Json(dogs))
}

pub async fn get(
    State(state): State<AppState>,
    _user: UserContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Dog>> {
    let dog = Dog::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Dog not found".to_string()))?;
    Ok(Json(dog))
}

pub async fn update(
    State(state): State<AppState>,
    _user: UserContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateDog>,
) -> AppResult<Json<Dog>> {
    let dog = Dog::update(&state.pool, id, req)
        .await?
        .ok_or_else(|| AppError::NotFound("Dog not found".to_string()))?;
    Ok(Json(dog))
}

/// Soft delete
pub async fn delete(
    State(state): State<AppState>,
    _user: UserContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let removed = Dog::deactivate(&state.pool, id).await?;
    if !removed {
        return Err(AppError::NotFound("Dog not found".to_string()));
    }
    Ok(Json(json!({"message": "Dog deleted successfully"})))
}
