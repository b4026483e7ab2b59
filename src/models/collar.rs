//! Collar (wearable device) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Collar {
    pub id: Uuid,
    pub device_id: String,
    pub dog_id: Option<Uuid>,
    pub battery_level: Option<f32>,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub firmware_version: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_accuracy: Option<f64>,
    #[serde(skip_serializing)]
    pub token_hash: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollCollarRequest {
    pub device_id: String,
    pub firmware_version: Option<String>,
    pub enrollment_key: String,
}

#[derive(Debug, Serialize)]
pub struct EnrollCollarResponse {
    pub collar_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub battery_level: f32,
    pub firmware_version: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_accuracy: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub server_time: i64,
    pub dog_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AssignCollarRequest {
    pub dog_id: Option<Uuid>,
}

impl Collar {
    /// Enroll a device. Re-enrolling an existing device rotates its token.
    pub async fn enroll(
        pool: &PgPool,
        device_id: &str,
        firmware_version: Option<&str>,
        token_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Collar>(
            r#"
            INSERT INTO collars (device_id, firmware_version, token_hash, is_online, last_seen)
            VALUES ($1, $2, $3, true, NOW())
            ON CONFLICT (device_id) DO UPDATE SET
                firmware_version = EXCLUDED.firmware_version,
                token_hash = EXCLUDED.token_hash,
                is_online = true,
                last_seen = NOW(),
                updated_at = NOW()
            RETURNING *
            "#
        )
        .bind(device_id)
        .bind(firmware_version)
        .bind(token_hash)
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &PgPool, skip: i64, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Collar>(
            "SELECT * FROM collars WHERE is_active = true ORDER BY created_at DESC OFFSET $1 LIMIT $2"
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Collar>("SELECT * FROM collars WHERE id = $1 AND is_active = true")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_token_hash(pool: &PgPool, token_hash: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Collar>(
            "SELECT * FROM collars WHERE token_hash = $1 AND is_active = true"
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_heartbeat(
        pool: &PgPool,
        id: Uuid,
        req: &HeartbeatRequest,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE collars SET
                battery_level = $2,
                firmware_version = COALESCE($3, firmware_version),
                gps_latitude = COALESCE($4, gps_latitude),
                gps_longitude = COALESCE($5, gps_longitude),
                gps_accuracy = COALESCE($6, gps_accuracy),
                is_online = true,
                last_seen = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#
        )
        .bind(id)
        .bind(req.battery_level)
        .bind(&req.firmware_version)
        .bind(req.gps_latitude)
        .bind(req.gps_longitude)
        .bind(req.gps_accuracy)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn assign_dog(
        pool: &PgPool,
        id: Uuid,
        dog_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Collar>(
            "UPDATE collars SET dog_id = $2, updated_at = NOW() WHERE id = $1 AND is_active = true RETURNING *"
        )
        .bind(id)
        .bind(dog_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_online(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM collars WHERE is_online = true AND is_active = true"
        )
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
