use axum::{Json, extract::State};

use murmur_db::models::UserSummaryRow;
use murmur_types::api::{SearchQuery, UsersResponse};
use murmur_types::models::UserSummary;

use crate::error::ApiError;
use crate::extract::QueryParams;
use crate::state::{AppState, run_blocking};

const SEARCH_LIMIT: u32 = 20;

/// GET /users?q=@name
pub async fn search_users(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    let needle = normalize_search(query.q.as_deref().unwrap_or_default());

    let rows = run_blocking(&state, move |app| app.db.search_users(&needle, SEARCH_LIMIT)).await?;

    Ok(Json(UsersResponse {
        users: rows.into_iter().map(user_summary).collect(),
    }))
}

/// "  @Ann " -> "ann"
fn normalize_search(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

pub(crate) fn user_summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        id: row.id,
        username: row.username,
        display_name: row.display_name,
        last_seen: row.last_seen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_handle_prefix() {
        assert_eq!(normalize_search("  @Ann "), "ann");
        assert_eq!(normalize_search("@@bob"), "bob");
        assert_eq!(normalize_search(""), "");
    }
}
