//! Authentication handlers

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CreateUser, LoginRequest, LoginResponse, User, UserInfo};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub role: String, // "admin" or "user"
    pub exp: usize,   // Expiration timestamp
    pub iat: usize,   // Issued at
}

/// Register endpoint
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CreateUser>,
) -> AppResult<Json<UserInfo>> {
    req.validate()?;

    if User::find_by_username(&state.pool, &req.username).await?.is_some() {
        return Err(AppError::AlreadyExists("Username already taken".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = User::create(&state.pool, &req, password_hash).await?;

    tracing::info!("User registered: {} ({})", user.username, user.id);

    Ok(Json(user.to_info()))
}

/// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = User::find_by_username(&state.pool, &req.username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::InternalError("Invalid password hash".to_string()))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::InvalidCredentials)?;

    User::update_last_login(&state.pool, user.id).await?;

    let token = generate_jwt(&user, &state.config.jwt_secret, state.config.jwt_expiration_hours)?;

    Ok(Json(LoginResponse {
        token,
        user: user.to_info(),
    }))
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::InternalError("Password hashing failed".to_string()))
}

fn generate_jwt(user: &User, secret: &str, expiration_hours: u64) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        role: if user.is_admin { "admin" } else { "user" }.to_string(),
        exp: (now + Duration::hours(expiration_hours as i64)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AppError::from)
}
