use std::sync::Arc;

use anyhow::anyhow;
use argon2::{Algorithm, Argon2, Params, Version};
use tracing::error;

use murmur_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub hasher: Argon2<'static>,
}

impl AppStateInner {
    /// Argon2id with the crate's default cost parameters.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            hasher: Argon2::default(),
        }
    }

    /// Argon2id with explicit cost parameters. Hashes stored under other
    /// parameters still verify, since the PHC string records its own.
    pub fn with_password_params(db: Database, params: Params) -> Self {
        Self {
            db,
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

/// Run blocking work (SQLite, password hashing) off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed: {}", e))
        })?
        .map_err(ApiError::from)
}
