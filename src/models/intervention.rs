//! Intervention model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::reading::RiskLevel;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Intervention {
    pub id: Uuid,
    pub dog_id: Uuid,
    pub collar_id: Uuid,
    pub reading_id: Uuid,

    pub intervention_type: String,
    pub ultrasonic_frequency: Option<i32>,
    pub duration_seconds: Option<i32>,

    pub aggression_level: Option<RiskLevel>,
    pub confidence: Option<f32>,

    pub is_acknowledged: bool,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct CreateIntervention {
    pub dog_id: Uuid,
    pub collar_id: Uuid,
    pub reading_id: Uuid,
    pub intervention_type: String,
    pub ultrasonic_frequency: i32,
    pub duration_seconds: i32,
    pub aggression_level: RiskLevel,
    pub confidence: f32,
}

#[derive(Debug, Deserialize, Default)]
pub struct InterventionFilter {
    pub dog_id: Option<Uuid>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Intervention {
    pub async fn create(pool: &PgPool, data: CreateIntervention) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Intervention>(
            r#"
            INSERT INTO interventions (
                dog_id, collar_id, reading_id, intervention_type,
                ultrasonic_frequency, duration_seconds, aggression_level, confidence
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#
        )
        .bind(data.dog_id)
        .bind(data.collar_id)
        .bind(data.reading_id)
        .bind(&data.intervention_type)
        .bind(data.ultrasonic_frequency)
        .bind(data.duration_seconds)
        .bind(data.aggression_level)
        .bind(data.confidence)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Intervention>("SELECT * FROM interventions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, filter: InterventionFilter) -> Result<Vec<Self>, sqlx::Error> {
        let skip = filter.skip.unwrap_or(0);
        let limit = filter.limit.unwrap_or(100);

        sqlx::query_as::<_, Intervention>(
            r#"
            SELECT * FROM interventions
            WHERE ($1::uuid IS NULL OR dog_id = $1)
            ORDER BY triggered_at DESC
            OFFSET $2 LIMIT $3
            "#
        )
        .bind(filter.dog_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Intervention>(
            "SELECT * FROM interventions ORDER BY triggered_at DESC LIMIT $1"
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn count_today(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM interventions WHERE triggered_at::date = NOW()::date"
        )
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// One-way acknowledgment. Acknowledging twice is a no-op that leaves the
    /// original acknowledged_at in place.
    pub async fn acknowledge(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let updated = sqlx::query_as::<_, Intervention>(
            r#"
            UPDATE interventions
            SET is_acknowledged = true, acknowledged_at = NOW()
            WHERE id = $1 AND is_acknowledged = false
            RETURNING *
            "#
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(i) => Ok(Some(i)),
            None => Self::find_by_id(pool, id).await,
        }
    }
}
