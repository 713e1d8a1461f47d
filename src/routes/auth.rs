use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::auth;
use crate::constants::{MIN_PASSWORD_LEN, MIN_USERNAME_LEN};
use crate::db::metadata;
use crate::error::{AppError, Result};
use crate::extract::AuthContext;
use crate::models::User;
use crate::validation::is_valid_email;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Register a new account
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    if !is_valid_email(&payload.email) {
        return Err(AppError::BadRequest("invalid email address".to_string()));
    }
    if payload.username.len() < MIN_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = auth::hash_password(&payload.password)?;
    let user_id = Uuid::new_v4().to_string();
    let user_id = metadata::create_user(
        &state.meta,
        &user_id,
        &payload.username,
        &payload.email,
        &password_hash,
    )?;

    tracing::info!("Registered user {user_id}");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user_id,
            "message": "User registered successfully",
        })),
    ))
}

/// Authenticate an account and issue a bearer token.
///
/// Unknown email and wrong password produce the same response.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>> {
    let user = metadata::find_user_by_email(&state.meta, &payload.email).map_err(|err| {
        match err {
            AppError::UserNotFound => AppError::InvalidCredentials,
            other => other,
        }
    })?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        tracing::info!("Failed login attempt for {}", user.email);
        return Err(AppError::InvalidCredentials);
    }

    let token = auth::generate_token(
        &user.user_id,
        &state.config.jwt_secret,
        state.config.jwt_expiration(),
    )?;

    tracing::info!("Issued token for user {}", user.user_id);
    Ok(Json(json!({
        "message": "Login successful",
        "user": user,
        "token": token,
    })))
}

/// Fetch a user profile by id.
pub async fn find_user(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(user_id): Path<String>,
) -> Result<Json<User>> {
    let user = metadata::find_user_by_id(&state.meta, &user_id)?;
    Ok(Json(user))
}
