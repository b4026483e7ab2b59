//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create tables if not exist
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Users (operators / observers)
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    email VARCHAR(255) NOT NULL UNIQUE,
    username VARCHAR(100) NOT NULL UNIQUE,
    password_hash VARCHAR(255) NOT NULL,
    full_name VARCHAR(255),
    is_active BOOLEAN DEFAULT true,
    is_admin BOOLEAN DEFAULT false,
    last_login TIMESTAMPTZ,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
);

-- Dogs (monitored subjects)
CREATE TABLE IF NOT EXISTS dogs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    breed VARCHAR(255),
    age_years INT,
    sex SMALLINT,
    sterilization_status SMALLINT,
    weight_kg REAL,
    color VARCHAR(100),
    medical_history TEXT,
    vaccination_records TEXT,
    photo_url VARCHAR(500),
    microchip_id VARCHAR(100) UNIQUE,
    owner_id UUID REFERENCES users(id),
    is_active BOOLEAN DEFAULT true,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
);

-- Collars (wearable devices)
CREATE TABLE IF NOT EXISTS collars (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    device_id VARCHAR(100) NOT NULL UNIQUE,
    dog_id UUID REFERENCES dogs(id),
    battery_level REAL DEFAULT 100.0,
    is_online BOOLEAN DEFAULT false,
    last_seen TIMESTAMPTZ,
    firmware_version VARCHAR(50),
    gps_latitude DOUBLE PRECISION,
    gps_longitude DOUBLE PRECISION,
    gps_accuracy DOUBLE PRECISION,
    token_hash VARCHAR(255),
    is_active BOOLEAN DEFAULT true,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
);

-- Sensor readings (one telemetry sample per row, score fields filled at ingest)
CREATE TABLE IF NOT EXISTS sensor_readings (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    dog_id UUID NOT NULL REFERENCES dogs(id),
    collar_id UUID NOT NULL REFERENCES collars(id),

    heart_rate_bpm REAL NOT NULL,
    hrv_rmssd REAL,
    body_temperature REAL NOT NULL,
    stress_cortisol REAL,

    body_posture SMALLINT,
    tail_position SMALLINT,
    ear_position SMALLINT,
    vocalization_type SMALLINT,

    time_of_day SMALLINT,
    human_proximity_meters REAL,
    other_dogs_nearby INT,

    aggression_level SMALLINT,
    aggression_probability REAL,
    intervention_required BOOLEAN DEFAULT false,

    gps_latitude DOUBLE PRECISION,
    gps_longitude DOUBLE PRECISION,
    gps_accuracy DOUBLE PRECISION,

    recorded_at TIMESTAMPTZ DEFAULT NOW(),
    processed_at TIMESTAMPTZ
);

-- Interventions (deterrent actions, one per reading at MEDIUM or above)
CREATE TABLE IF NOT EXISTS interventions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    dog_id UUID NOT NULL REFERENCES dogs(id),
    collar_id UUID NOT NULL REFERENCES collars(id),
    reading_id UUID NOT NULL REFERENCES sensor_readings(id),

    intervention_type VARCHAR(20) NOT NULL,
    ultrasonic_frequency INT,
    duration_seconds INT,

    aggression_level SMALLINT,
    confidence REAL,

    is_acknowledged BOOLEAN DEFAULT false,
    triggered_at TIMESTAMPTZ DEFAULT NOW(),
    acknowledged_at TIMESTAMPTZ
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_dogs_owner ON dogs(owner_id);
CREATE INDEX IF NOT EXISTS idx_dogs_active ON dogs(is_active);
CREATE INDEX IF NOT EXISTS idx_collars_dog ON collars(dog_id);
CREATE INDEX IF NOT EXISTS idx_collars_online ON collars(is_online);
CREATE INDEX IF NOT EXISTS idx_readings_dog_time ON sensor_readings(dog_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_readings_level ON sensor_readings(aggression_level);
CREATE INDEX IF NOT EXISTS idx_interventions_dog ON interventions(dog_id);
CREATE INDEX IF NOT EXISTS idx_interventions_triggered ON interventions(triggered_at);
CREATE INDEX IF NOT EXISTS idx_interventions_reading ON interventions(reading_id);
"#;
