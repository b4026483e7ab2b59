//! StraySafe Cloud Backend Server
//!
//! Central monitoring server for StraySafe smart collars: ingests telemetry
//! from collars on free-roaming dogs, scores aggression risk with a trained
//! classifier, triggers graduated ultrasonic interventions and streams live
//! updates to observers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    STRAYSAFE CLOUD                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────┐  ┌────────────────────┐   │
//! │  │  API      │  │  Scoring     │  │  Realtime          │   │
//! │  │  Gateway  │  │  Pipeline    │  │  (WebSocket        │   │
//! │  │  (Axum)   │  │  (ONNX)      │  │   fan-out)         │   │
//! │  └─────┬─────┘  └──────┬───────┘  └─────────┬──────────┘   │
//! │        └───────────────┼────────────────────┘              │
//! │                        ▼                                   │
//! │                 ┌─────────────┐                            │
//! │                 │ PostgreSQL  │                            │
//! │                 └─────────────┘                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod models;
mod handlers;
mod middleware;
mod error;
mod scoring;
mod realtime;

use axum::{
    Router,
    routing::{get, post, put, delete},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub use error::{AppError, AppResult};
use realtime::{ConnectionManager, LatestCache};
use scoring::classifier::RiskClassifier;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "straysafe_cloud=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("StraySafe Cloud Server starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .expect("Failed to create database pool");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .expect("Failed to run migrations");

    // Load the aggression model; failure degrades scoring, never startup
    let classifier = Arc::new(RiskClassifier::load(&config.model_path, &config.model_meta_path));

    // Build application state
    let state = AppState {
        pool,
        classifier,
        realtime: ConnectionManager::new(),
        latest: LatestCache::new(Duration::from_secs(config.latest_ttl_secs)),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
    pub classifier: Arc<RiskClassifier>,
    pub realtime: ConnectionManager,
    pub latest: LatestCache,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        // Collar enrollment (uses shared enrollment key)
        .route("/api/v1/collars/enroll", post(handlers::collars::enroll))
        // Live updates
        .route("/ws/:client_id", get(handlers::ws::websocket));

    // Device routes (collar token auth)
    let device_routes = Router::new()
        .route("/api/v1/telemetry", post(handlers::readings::ingest))
        .route("/api/v1/collars/heartbeat", post(handlers::collars::heartbeat))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_device_auth
        ));

    // Management routes (user JWT auth)
    let management_routes = Router::new()
        // Dogs
        .route("/api/v1/dogs", post(handlers::dogs::create))
        .route("/api/v1/dogs", get(handlers::dogs::list))
        .route("/api/v1/dogs/:id", get(handlers::dogs::get))
        .route("/api/v1/dogs/:id", put(handlers::dogs::update))
        .route("/api/v1/dogs/:id", delete(handlers::dogs::delete))

        // Readings
        .route("/api/v1/dogs/:id/readings", get(handlers::readings::history))
        .route("/api/v1/dogs/:id/readings/latest", get(handlers::readings::latest))

        // Collars
        .route("/api/v1/collars", get(handlers::collars::list))
        .route("/api/v1/collars/:id", get(handlers::collars::get))
        .route("/api/v1/collars/:id/assign", put(handlers::collars::assign))

        // Interventions
        .route("/api/v1/interventions", get(handlers::interventions::list))
        .route("/api/v1/interventions/:id/acknowledge", post(handlers::interventions::acknowledge))

        // Analytics
        .route("/api/v1/analytics/dashboard", get(handlers::analytics::dashboard))
        .route("/api/v1/analytics/aggression-trends/:dog_id", get(handlers::analytics::aggression_trends))
        .route("/api/v1/analytics/health-metrics/:dog_id", get(handlers::analytics::health_metrics))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user_auth
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(device_routes)
        .merge(management_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
