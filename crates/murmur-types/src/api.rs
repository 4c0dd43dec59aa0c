use serde::{Deserialize, Deserializer, Serialize, de};

use crate::models::{
    FeedMessage, Group, Message, NewGroup, NewMessage, User, UserOverview, UserSummary,
};

// Request bodies default every field so that a missing field reaches the
// handler's own validation instead of failing deserialization.

/// Ids in request bodies may arrive as numbers or as numeric strings
/// (`3` or `"3"`). A blank string counts as absent.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Int(i64),
        Text(String),
    }

    match Option::<IdRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IdRepr::Int(id)) => Ok(Some(id)),
        Some(IdRepr::Text(raw)) => match raw.trim() {
            "" => Ok(None),
            v => v
                .parse()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid id {:?}", raw))),
        },
    }
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

// -- Users --

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
}

// -- Groups --

#[derive(Debug, Default, Deserialize)]
pub struct GroupsQuery {
    pub user_id: Option<String>,
}

/// Query for endpoints scoped to one group.
#[derive(Debug, Default, Deserialize)]
pub struct GroupQuery {
    pub group_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JoinGroupRequest {
    #[serde(deserialize_with = "lenient_id")]
    pub group_id: Option<i64>,
    #[serde(deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupsResponse {
    pub groups: Vec<Group>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupResponse {
    pub group: NewGroup,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    pub members: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

// -- Messages --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendMessageRequest {
    #[serde(deserialize_with = "lenient_id")]
    pub group_id: Option<i64>,
    #[serde(deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: NewMessage,
}

// -- Admin --

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminChatsResponse {
    pub messages: Vec<FeedMessage>,
    pub users: Vec<UserOverview>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
