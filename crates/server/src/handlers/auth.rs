//! Signup and login handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use shardbox_metadata::models::UserRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /api/signup - create a user.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password required".to_string(),
        ));
    }
    if req.password.len() < 6 {
        return Err(ApiError::BadRequest(
            "password must be at least 6 characters".to_string(),
        ));
    }

    if state.metadata.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::BadRequest("email exists".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?
        .to_string();

    let user = UserRow {
        user_id: Uuid::new_v4(),
        email,
        password_hash,
        created_at: OffsetDateTime::now_utc(),
    };
    state.metadata.create_user(&user).await?;

    tracing::info!(user_id = %user.user_id, "User created");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "user created" })),
    ))
}

/// POST /api/login - obtain a bearer token (24 h).
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = req.email.trim().to_lowercase();
    let user = state
        .metadata
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".to_string()))?;

    if !verify_password(&user.password_hash, &req.password) {
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    let token = state.jwt.issue(user.user_id)?;
    Ok(Json(LoginResponse { token }))
}

/// Verify a candidate password against an argon2 hash string.
fn verify_password(hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}
