//! Authentication middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::handlers::auth::Claims;
use crate::models::Collar;
use crate::{AppError, AppState};

/// User context extracted from JWT
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: Uuid,
    pub role: String,
}

impl UserContext {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Device context extracted from a collar token
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub collar_id: Uuid,
    pub dog_id: Option<Uuid>,
}

/// Middleware: Require user JWT authentication
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&req)?;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::TokenInvalid)?;

    let claims = token_data.claims;

    let user_ctx = UserContext {
        user_id: Uuid::parse_str(&claims.sub).map_err(|_| AppError::TokenInvalid)?,
        role: claims.role,
    };

    req.extensions_mut().insert(user_ctx);

    Ok(next.run(req).await)
}

/// Middleware: Require collar token authentication
pub async fn require_device_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&req)?;
    let token_hash = hash_token(&token);

    let collar = Collar::find_by_token_hash(&state.pool, &token_hash)
        .await
        .map_err(|_| AppError::InternalError("Database error".to_string()))?
        .ok_or(AppError::Unauthorized)?;

    let device_ctx = DeviceContext {
        collar_id: collar.id,
        dog_id: collar.dog_id,
    };

    req.extensions_mut().insert(device_ctx);

    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(req: &Request) -> Result<String, AppError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    if !auth_header.starts_with("Bearer ") {
        return Err(AppError::Unauthorized);
    }

    Ok(auth_header[7..].to_string())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

// Implement FromRequestParts for UserContext
#[axum::async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

// Implement FromRequestParts for DeviceContext
#[axum::async_trait]
impl<S> FromRequestParts<S> for DeviceContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<DeviceContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
