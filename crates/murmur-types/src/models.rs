use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The caller's own account as returned by register and login.
/// The password hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub is_admin: bool,
}

/// Another user as seen through search and member lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub last_seen: Option<DateTime<Utc>>,
}

/// A user as listed on the admin overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOverview {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub is_admin: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub member_count: i64,
}

/// Returned once, right after a group is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGroup {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// A message in a group's history, with its author's names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A message on the global admin feed, tagged with the group it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMessage {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub display_name: String,
    pub group_name: String,
    pub group_id: i64,
}
