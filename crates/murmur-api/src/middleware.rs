use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// Caller-supplied identity. Nothing vouches for it; it only selects whose
/// capabilities are checked.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Declared for clients that send one; never verified.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// The admin who passed [`require_admin`], for handlers behind it.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
}

/// Let the request through only if `X-User-Id` names an admin account.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or(ApiError::Forbidden)?;

    let user = run_blocking(&state, move |app| app.db.get_user_by_id(user_id)).await?;

    match user {
        Some(user) if user.is_admin => {
            req.extensions_mut().insert(AdminUser {
                id: user.id,
                username: user.username,
            });
            Ok(next.run(req).await)
        }
        _ => {
            warn!(user_id, "Admin access denied");
            Err(ApiError::Forbidden)
        }
    }
}
