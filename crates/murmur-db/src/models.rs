//! Database row types. These map directly to SQLite rows.
//! Distinct from murmur-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};

#[derive(Debug)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// A user as listed by search, membership and admin queries; never carries
/// the password hash.
#[derive(Debug)]
pub struct UserSummaryRow {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub is_admin: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub member_count: i64,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_username: String,
    pub author_display_name: String,
}

#[derive(Debug)]
pub struct RecentMessageRow {
    pub message: MessageRow,
    pub group_name: String,
}
