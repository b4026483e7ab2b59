//! Dog (monitored subject) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::reading::{Sex, Sterilization};
use crate::scoring::features::SubjectProfile;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Dog {
    pub id: Uuid,
    pub name: String,
    pub breed: Option<String>,
    pub age_years: Option<i32>,
    pub sex: Option<Sex>,
    pub sterilization_status: Option<Sterilization>,
    pub weight_kg: Option<f32>,
    pub color: Option<String>,
    pub medical_history: Option<String>,
    pub vaccination_records: Option<String>,
    pub photo_url: Option<String>,
    pub microchip_id: Option<String>,
    pub owner_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDog {
    pub name: String,
    pub breed: Option<String>,
    pub age_years: Option<i32>,
    pub sex: Option<Sex>,
    pub sterilization_status: Option<Sterilization>,
    pub weight_kg: Option<f32>,
    pub color: Option<String>,
    pub medical_history: Option<String>,
    pub vaccination_records: Option<String>,
    pub photo_url: Option<String>,
    pub microchip_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Dog {
    pub async fn create(pool: &PgPool, owner_id: Uuid, data: CreateDog) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Dog>(
            r#"
            INSERT INTO dogs (
                name, breed, age_years, sex, sterilization_status, weight_kg,
                color, medical_history, vaccination_records, photo_url, microchip_id, owner_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#
        )
        .bind(&data.name)
        .bind(&data.breed)
        .bind(data.age_years)
        .bind(data.sex)
        .bind(data.sterilization_status)
        .bind(data.weight_kg)
        .bind(&data.color)
        .bind(&data.medical_history)
        .bind(&data.vaccination_records)
        .bind(&data.photo_url)
        .bind(&data.microchip_id)
        .bind(owner_id)
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &PgPool, skip: i64, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Dog>(
            "SELECT * FROM dogs WHERE is_active = true ORDER BY created_at DESC OFFSET $1 LIMIT $2"
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Dog>("SELECT * FROM dogs WHERE id = $1 AND is_active = true")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: CreateDog) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Dog>(
            r#"
            UPDATE dogs SET
                name = $2, breed = $3, age_years = $4, sex = $5,
                sterilization_status = $6, weight_kg = $7, color = $8,
                medical_history = $9, vaccination_records = $10,
                photo_url = $11, microchip_id = $12, updated_at = NOW()
            WHERE id = $1 AND is_active = true
            RETURNING *
            "#
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.breed)
        .bind(data.age_years)
        .bind(data.sex)
        .bind(data.sterilization_status)
        .bind(data.weight_kg)
        .bind(&data.color)
        .bind(&data.medical_history)
        .bind(&data.vaccination_records)
        .bind(&data.photo_url)
        .bind(&data.microchip_id)
        .fetch_optional(pool)
        .await
    }

    /// Soft delete
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE dogs SET is_active = false, updated_at = NOW() WHERE id = $1 AND is_active = true"
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Static attributes the feature transform needs
    pub fn profile(&self) -> SubjectProfile {
        SubjectProfile {
            age_years: self.age_years,
            sex: self.sex,
            sterilization: self.sterilization_status,
        }
    }
}
