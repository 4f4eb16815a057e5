// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, NewUser, User},
    store::ExamStore,
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(store): State<Arc<dyn ExamStore>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;
    let full_name = payload
        .full_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| payload.username.clone());

    let user = store
        .create_user(NewUser {
            username: payload.username,
            password: Some(hashed_password),
            full_name,
            is_guest: false,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// Verifies the username and password against the store.
/// Guest accounts have no password and cannot log in this way.
pub async fn login(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = store
        .find_user_by_username(&payload.username)
        .await
        .map_err(|e| {
            tracing::error!("Login store error: {:?}", e);
            AppError::from(e)
        })?
        .ok_or(AppError::AuthError("User not found".to_string()))?;

    let is_valid = match &user.password {
        Some(hash) => verify_password(&payload.password, hash)?,
        None => false,
    };

    if !is_valid {
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    token_response(&user, &config)
}

/// Creates a throwaway guest account and signs it in.
pub async fn guest(
    State(store): State<Arc<dyn ExamStore>>,
    State(config): State<Config>,
) -> Result<impl IntoResponse, AppError> {
    let tag = Uuid::new_v4().simple().to_string();

    let user = store
        .create_user(NewUser {
            username: format!("guest_{}", &tag[..12]),
            password: None,
            full_name: format!("Guest-{}", tag[..6].to_uppercase()),
            is_guest: true,
        })
        .await?;

    tracing::info!(user_id = %user.id, "Guest session created");

    token_response(&user, &config)
}

fn token_response(user: &User, config: &Config) -> Result<Json<serde_json::Value>, AppError> {
    let token = sign_jwt(
        user.id,
        &user.full_name,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "full_name": user.full_name,
        "is_guest": user.is_guest
    })))
}
