//! Sensor reading model and telemetry enumerations

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;
use validator::Validate;

use crate::scoring::policy::InterventionTier;

/// Dog sex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum Sex {
    Female = 0,
    Male = 1,
}

/// Sterilization status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum Sterilization {
    NotSterilized = 0,
    Sterilized = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum BodyPosture {
    Relaxed = 0,
    Alert = 1,
    Tense = 2,
    Aggressive = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TailPosition {
    Down = 0,
    Neutral = 1,
    Up = 2,
    Stiff = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum EarPosition {
    Relaxed = 0,
    Alert = 1,
    Flattened = 2,
    Back = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum Vocalization {
    None = 0,
    Whining = 1,
    Barking = 2,
    Growling = 3,
    Snarling = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TimeOfDay {
    Morning = 0,
    Afternoon = 1,
    Evening = 2,
    Night = 3,
}

/// Aggression risk classes, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum RiskLevel {
    Calm = 0,
    Alert = 1,
    Agitated = 2,
    Aggressive = 3,
    Dangerous = 4,
}

impl RiskLevel {
    /// Map a classifier class index to a level. Indices beyond the known
    /// range saturate at the most severe level.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Calm,
            1 => Self::Alert,
            2 => Self::Agitated,
            3 => Self::Aggressive,
            _ => Self::Dangerous,
        }
    }
}

/// One persisted telemetry sample, score fields filled at ingest
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SensorReading {
    pub id: Uuid,
    pub dog_id: Uuid,
    pub collar_id: Uuid,

    pub heart_rate_bpm: f32,
    pub hrv_rmssd: Option<f32>,
    pub body_temperature: f32,
    pub stress_cortisol: Option<f32>,

    pub body_posture: Option<BodyPosture>,
    pub tail_position: Option<TailPosition>,
    pub ear_position: Option<EarPosition>,
    pub vocalization_type: Option<Vocalization>,

    pub time_of_day: Option<TimeOfDay>,
    pub human_proximity_meters: Option<f32>,
    pub other_dogs_nearby: Option<i32>,

    pub aggression_level: Option<RiskLevel>,
    pub aggression_probability: Option<f32>,
    pub intervention_required: bool,

    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_accuracy: Option<f64>,

    pub recorded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Ingest payload from a collar
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateReading {
    pub dog_id: Uuid,

    #[validate(range(min = 30.0, max = 200.0))]
    pub heart_rate_bpm: f32,
    #[validate(range(min = 0.0))]
    pub hrv_rmssd: Option<f32>,
    #[validate(range(min = 35.0, max = 42.0))]
    pub body_temperature: f32,
    #[validate(range(min = 0.0))]
    pub stress_cortisol: Option<f32>,

    pub body_posture: Option<BodyPosture>,
    pub tail_position: Option<TailPosition>,
    pub ear_position: Option<EarPosition>,
    pub vocalization_type: Option<Vocalization>,

    pub time_of_day: Option<TimeOfDay>,
    #[validate(range(min = 0.0))]
    pub human_proximity_meters: Option<f32>,
    #[validate(range(min = 0))]
    pub other_dogs_nearby: Option<i32>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub gps_latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub gps_longitude: Option<f64>,
    #[validate(range(min = 0.0))]
    pub gps_accuracy: Option<f64>,
}

/// Score fields appended to a reading by the pipeline
#[derive(Debug, Clone, Copy)]
pub struct ReadingScore {
    pub level: RiskLevel,
    pub probability: f32,
    pub intervention_required: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReadingFilter {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// One point in the per-day aggression trend
#[derive(Debug, Serialize)]
pub struct AggressionTrend {
    pub date: String,
    pub aggression_level: i16,
    pub count: i64,
    pub avg_probability: f64,
}

/// Per-day vitals averages
#[derive(Debug, Serialize)]
pub struct HealthMetrics {
    pub date: String,
    pub avg_heart_rate: f64,
    pub avg_temperature: f64,
    pub avg_stress_level: f64,
}

impl SensorReading {
    /// Insert an already-scored reading. Every field is bound explicitly so
    /// the origin of each value (input, derived, scored) stays traceable.
    pub async fn insert_scored(
        pool: &PgPool,
        collar_id: Uuid,
        data: &CreateReading,
        score: ReadingScore,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SensorReading>(
            r#"
            INSERT INTO sensor_readings (
                dog_id, collar_id,
                heart_rate_bpm, hrv_rmssd, body_temperature, stress_cortisol,
                body_posture, tail_position, ear_position, vocalization_type,
                time_of_day, human_proximity_meters, other_dogs_nearby,
                aggression_level, aggression_probability, intervention_required,
                gps_latitude, gps_longitude, gps_accuracy,
                processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, NOW())
            RETURNING *
            "#
        )
        .bind(data.dog_id)
        .bind(collar_id)
        .bind(data.heart_rate_bpm)
        .bind(data.hrv_rmssd)
        .bind(data.body_temperature)
        .bind(data.stress_cortisol)
        .bind(data.body_posture)
        .bind(data.tail_position)
        .bind(data.ear_position)
        .bind(data.vocalization_type)
        .bind(data.time_of_day)
        .bind(data.human_proximity_meters)
        .bind(data.other_dogs_nearby)
        .bind(score.level)
        .bind(score.probability)
        .bind(score.intervention_required)
        .bind(data.gps_latitude)
        .bind(data.gps_longitude)
        .bind(data.gps_accuracy)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_dog(
        pool: &PgPool,
        dog_id: Uuid,
        filter: ReadingFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let limit = filter.limit.unwrap_or(1000);

        sqlx::query_as::<_, SensorReading>(
            r#"
            SELECT * FROM sensor_readings
            WHERE dog_id = $1
              AND ($2::timestamptz IS NULL OR recorded_at >= $2)
              AND ($3::timestamptz IS NULL OR recorded_at <= $3)
            ORDER BY recorded_at DESC
            LIMIT $4
            "#
        )
        .bind(dog_id)
        .bind(filter.start_time)
        .bind(filter.end_time)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Per-day count and average probability, grouped by risk level
    pub async fn aggression_trends(
        pool: &PgPool,
        dog_id: Uuid,
        days: i64,
    ) -> Result<Vec<AggressionTrend>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                recorded_at::date AS date,
                aggression_level,
                COUNT(*) AS count,
                AVG(aggression_probability)::float8 AS avg_probability
            FROM sensor_readings
            WHERE dog_id = $1
              AND recorded_at >= NOW() - ($2 * INTERVAL '1 day')
              AND aggression_level IS NOT NULL
            GROUP BY recorded_at::date, aggression_level
            ORDER BY date
            "#
        )
        .bind(dog_id)
        .bind(days)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| AggressionTrend {
            date: r.get::<NaiveDate, _>("date").to_string(),
            aggression_level: r.get::<i16, _>("aggression_level"),
            count: r.get::<i64, _>("count"),
            avg_probability: r.get::<Option<f64>, _>("avg_probability").unwrap_or(0.0),
        }).collect())
    }

    /// Per-day vitals averages
    pub async fn health_metrics(
        pool: &PgPool,
        dog_id: Uuid,
        days: i64,
    ) -> Result<Vec<HealthMetrics>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                recorded_at::date AS date,
                AVG(heart_rate_bpm)::float8 AS avg_heart_rate,
                AVG(body_temperature)::float8 AS avg_temperature,
                AVG(stress_cortisol)::float8 AS avg_stress_level
            FROM sensor_readings
            WHERE dog_id = $1
              AND recorded_at >= NOW() - ($2 * INTERVAL '1 day')
            GROUP BY recorded_at::date
            ORDER BY date
            "#
        )
        .bind(dog_id)
        .bind(days)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| HealthMetrics {
            date: r.get::<NaiveDate, _>("date").to_string(),
            avg_heart_rate: r.get::<Option<f64>, _>("avg_heart_rate").unwrap_or(0.0),
            avg_temperature: r.get::<Option<f64>, _>("avg_temperature").unwrap_or(0.0),
            avg_stress_level: r.get::<Option<f64>, _>("avg_stress_level").unwrap_or(0.0),
        }).collect())
    }

    /// Merge the stored reading with tier details for cache/push payloads
    pub fn to_event_payload(&self, tier: InterventionTier) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(map) = value.as_object_mut() {
            map.insert("intervention".to_string(), serde_json::json!(tier.as_str()));
            map.insert("timestamp".to_string(), serde_json::json!(Utc::now()));
        }
        value
    }
}
