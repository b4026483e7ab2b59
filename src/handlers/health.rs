//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    model_loaded: bool,
    scored_readings: u64,
    degraded_scores: u64,
    connected_clients: usize,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        model_loaded: state.classifier.is_loaded(),
        scored_readings: state.classifier.scored_count(),
        degraded_scores: state.classifier.degraded_count(),
        connected_clients: state.realtime.connection_count(),
    })
}
