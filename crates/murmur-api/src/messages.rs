use axum::{Json, extract::State};
use tracing::debug;

use murmur_types::api::{GroupQuery, MessageResponse, MessagesResponse, SendMessageRequest};
use murmur_types::models::{Message, NewMessage};

use crate::error::ApiError;
use crate::extract::{JsonBody, QueryParams, given, query_id};
use crate::state::{AppState, run_blocking};

/// Clients poll this endpoint; there is no paging past the cap.
const HISTORY_LIMIT: u32 = 200;

/// GET /messages?group_id=
pub async fn list_messages(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<GroupQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let Some(group_id) = query_id("group_id", query.group_id.as_deref())? else {
        return Ok(Json(MessagesResponse { messages: vec![] }));
    };

    let rows = run_blocking(&state, move |app| {
        app.db.list_messages(group_id, HISTORY_LIMIT)
    })
    .await?;

    let messages = rows
        .into_iter()
        .map(|row| Message {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            username: row.author_username,
            display_name: row.author_display_name,
        })
        .collect();

    Ok(Json(MessagesResponse { messages }))
}

/// POST /messages
///
/// Posting is not gated on membership: any existing user may write to any
/// existing group.
pub async fn send_message(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let text = req.text.trim().to_string();
    let (Some(group_id), Some(user_id)) = (given(req.group_id), given(req.user_id)) else {
        return Err(missing_fields());
    };
    if text.is_empty() {
        return Err(missing_fields());
    }

    let row = run_blocking(&state, move |app| {
        app.db.create_message(group_id, user_id, &text)
    })
    .await?;

    debug!(message_id = row.id, group_id, user_id, "Message stored");

    Ok(Json(MessageResponse {
        message: NewMessage {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
        },
    }))
}

fn missing_fields() -> ApiError {
    ApiError::Validation("group_id, user_id and text are required".into())
}
