use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State};
use rand_core::OsRng;
use tracing::{info, warn};

use murmur_db::models::UserRow;
use murmur_types::api::{LoginRequest, RegisterRequest, UserResponse};
use murmur_types::models::User;

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::{AppState, run_blocking};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 4;

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let username = req.username.trim().to_lowercase();
    let display_name = req.display_name.trim().to_string();
    let password = req.password;

    validate_registration(&username, &display_name, &password)?;

    let user = run_blocking(&state, move |app| {
        let password_hash = hash_password(&app.hasher, &password)?;
        app.db.create_user(&username, &display_name, &password_hash)
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("Username is already taken".into()))?;

    info!(user_id = user.id, username = %user.username, "User registered");

    Ok(Json(UserResponse {
        user: user_projection(user),
    }))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let username = req.username.trim().to_lowercase();
    let password = req.password;

    let user = run_blocking(&state, move |app| {
        let Some(mut user) = app.db.get_user_by_username(&username)? else {
            return Ok(None);
        };

        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| anyhow!("Stored hash for user {} is unreadable: {}", user.id, e))?;
        if app
            .hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            return Ok(None);
        }

        user.last_seen = Some(app.db.touch_last_seen(user.id)?);
        Ok(Some(user))
    })
    .await?;

    let Some(user) = user else {
        warn!("Failed login attempt");
        return Err(ApiError::InvalidCredentials);
    };

    info!(user_id = user.id, "User logged in");

    Ok(Json(UserResponse {
        user: user_projection(user),
    }))
}

/// First failing rule wins.
pub fn validate_registration(
    username: &str,
    display_name: &str,
    password: &str,
) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::Validation("Username is required".into()));
    }
    if display_name.is_empty() {
        return Err(ApiError::Validation("Display name is required".into()));
    }
    if password.trim().is_empty() {
        return Err(ApiError::Validation("Password is required".into()));
    }
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ApiError::Validation(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Argon2id PHC string with a fresh random salt.
fn hash_password(hasher: &Argon2<'_>, password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

fn user_projection(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.username,
        display_name: row.display_name,
        is_admin: row.is_admin,
    }
}
