use axum::{Json, extract::State};
use tracing::info;

use murmur_types::api::{
    CreateGroupRequest, GroupQuery, GroupResponse, GroupsQuery, GroupsResponse, JoinGroupRequest,
    MembersResponse, OkResponse,
};
use murmur_types::models::{Group, NewGroup};

use crate::error::ApiError;
use crate::extract::{JsonBody, QueryParams, given, query_id};
use crate::state::{AppState, run_blocking};
use crate::users::user_summary;

/// GET /groups, optionally `?user_id=` to list only that user's groups.
pub async fn list_groups(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<GroupsQuery>,
) -> Result<Json<GroupsResponse>, ApiError> {
    let member_id = query_id("user_id", query.user_id.as_deref())?;

    let rows = run_blocking(&state, move |app| app.db.list_groups(member_id)).await?;

    let groups = rows
        .into_iter()
        .map(|row| Group {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            member_count: row.member_count,
        })
        .collect();

    Ok(Json(GroupsResponse { groups }))
}

/// POST /groups. The creator joins the new group in the same transaction.
pub async fn create_group(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateGroupRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    let name = req.name.trim().to_string();
    let description = req.description.trim().to_string();
    let creator_id = match given(req.user_id) {
        Some(id) if !name.is_empty() => id,
        _ => {
            return Err(ApiError::Validation(
                "Group name and user_id are required".into(),
            ));
        }
    };

    let row = run_blocking(&state, move |app| {
        app.db.create_group(&name, &description, creator_id)
    })
    .await?;

    info!(group_id = row.id, creator_id, "Group created");

    Ok(Json(GroupResponse {
        group: NewGroup {
            id: row.id,
            name: row.name,
            description: row.description,
        },
    }))
}

/// POST /groups/join. Joining twice is not an error.
pub async fn join_group(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<JoinGroupRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let (Some(group_id), Some(user_id)) = (given(req.group_id), given(req.user_id)) else {
        return Err(ApiError::Validation(
            "group_id and user_id are required".into(),
        ));
    };

    let joined = run_blocking(&state, move |app| app.db.join_group(group_id, user_id)).await?;
    if joined {
        info!(group_id, user_id, "User joined group");
    }

    Ok(Json(OkResponse { ok: true }))
}

/// GET /groups/members?group_id=
pub async fn list_members(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<GroupQuery>,
) -> Result<Json<MembersResponse>, ApiError> {
    let Some(group_id) = query_id("group_id", query.group_id.as_deref())? else {
        return Ok(Json(MembersResponse { members: vec![] }));
    };

    let rows = run_blocking(&state, move |app| app.db.list_members(group_id)).await?;

    Ok(Json(MembersResponse {
        members: rows.into_iter().map(user_summary).collect(),
    }))
}
