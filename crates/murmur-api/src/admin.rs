use axum::{Extension, Json, extract::State};
use tracing::info;

use murmur_types::api::AdminChatsResponse;
use murmur_types::models::{FeedMessage, UserOverview};

use crate::error::ApiError;
use crate::middleware::AdminUser;
use crate::state::{AppState, run_blocking};

const FEED_LIMIT: u32 = 100;

/// GET /admin/chats: latest messages across all groups plus every user.
pub async fn admin_chats(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
) -> Result<Json<AdminChatsResponse>, ApiError> {
    let (feed, users) = run_blocking(&state, |app| {
        Ok((app.db.recent_messages(FEED_LIMIT)?, app.db.list_users()?))
    })
    .await?;

    info!(admin_id = admin.id, admin = %admin.username, "Admin chats viewed");

    let messages = feed
        .into_iter()
        .map(|row| FeedMessage {
            id: row.message.id,
            text: row.message.text,
            created_at: row.message.created_at,
            username: row.message.author_username,
            display_name: row.message.author_display_name,
            group_name: row.group_name,
            group_id: row.message.group_id,
        })
        .collect();

    let users = users
        .into_iter()
        .map(|row| UserOverview {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            is_admin: row.is_admin,
            last_seen: row.last_seen,
        })
        .collect();

    Ok(Json(AdminChatsResponse { messages, users }))
}
