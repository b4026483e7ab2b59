//! Analytics handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::middleware::auth::UserContext;
use crate::models::{AggressionTrend, Collar, HealthMetrics, Intervention, SensorReading};
use crate::scoring::pipeline::{
    HEALTH_ALERT_HR_BPM, HEALTH_ALERT_TEMP_HIGH_C, HEALTH_ALERT_TEMP_LOW_C,
};
use crate::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardAnalytics {
    pub total_dogs: i64,
    pub active_collars: i64,
    pub interventions_today: i64,
    pub avg_aggression_level: f64,
    pub recent_interventions: Vec<Intervention>,
    pub health_alerts: Vec<String>,
}

/// Per-day aggression level distribution for one dog
pub async fn aggression_trends(
    State(state): State<AppState>,
    _user: UserContext,
    Path(dog_id): Path<Uuid>,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<Vec<AggressionTrend>>> {
    let days = query.days.unwrap_or(7).clamp(1, 365);
    let trends = SensorReading::aggression_trends(&state.pool, dog_id, days).await?;
    Ok(Json(trends))
}

/// Per-day vitals averages for one dog
pub async fn health_metrics(
    State(state): State<AppState>,
    _user: UserContext,
    Path(dog_id): Path<Uuid>,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<Vec<HealthMetrics>>> {
    let days = query.days.unwrap_or(7).clamp(1, 365);
    let metrics = SensorReading::health_metrics(&state.pool, dog_id, days).await?;
    Ok(Json(metrics))
}

/// Fleet-wide dashboard summary
pub async fn dashboard(
    State(state): State<AppState>,
    _user: UserContext,
) -> AppResult<Json<DashboardAnalytics>> {
    let total_dogs: i64 = sqlx::query("SELECT COUNT(*) AS count FROM dogs WHERE is_active = true")
        .fetch_one(&state.pool)
        .await?
        .get("count");

    let active_collars = Collar::count_online(&state.pool).await?;
    let interventions_today = Intervention::count_today(&state.pool).await?;

    let avg_aggression_level: f64 = sqlx::query(
        r#"
        SELECT COALESCE(AVG(aggression_level)::float8, 0) AS avg_level
        FROM sensor_readings
        WHERE recorded_at >= NOW() - INTERVAL '24 hours'
        "#,
    )
    .fetch_one(&state.pool)
    .await?
    .get("avg_level");

    let recent_interventions = Intervention::recent(&state.pool, 5).await?;
    let health_alerts = recent_health_alerts(&state).await?;

    Ok(Json(DashboardAnalytics {
        total_dogs,
        active_collars,
        interventions_today,
        avg_aggression_level,
        recent_interventions,
        health_alerts,
    }))
}

/// Vitals breaches across the fleet in the last 24 hours
async fn recent_health_alerts(state: &AppState) -> AppResult<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT d.name, r.heart_rate_bpm, r.body_temperature
        FROM sensor_readings r
        JOIN dogs d ON r.dog_id = d.id
        WHERE r.recorded_at >= NOW() - INTERVAL '24 hours'
          AND (r.heart_rate_bpm >= $1 OR r.body_temperature >= $2 OR r.body_temperature <= $3)
        ORDER BY r.recorded_at DESC
        LIMIT 10
        "#,
    )
    .bind(HEALTH_ALERT_HR_BPM)
    .bind(HEALTH_ALERT_TEMP_HIGH_C)
    .bind(HEALTH_ALERT_TEMP_LOW_C)
    .fetch_all(&state.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let name: String = r.get("name");
            let heart_rate: f32 = r.get("heart_rate_bpm");
            let temperature: f32 = r.get("body_temperature");

            let mut parts = Vec::new();
            if heart_rate >= HEALTH_ALERT_HR_BPM {
                parts.push(format!("heart rate {:.0} bpm", heart_rate));
            }
            if temperature >= HEALTH_ALERT_TEMP_HIGH_C || temperature <= HEALTH_ALERT_TEMP_LOW_C {
                parts.push(format!("body temperature {:.1} °C", temperature));
            }
            format!("{}: {}", name, parts.join(", "))
        })
        .collect())
}
