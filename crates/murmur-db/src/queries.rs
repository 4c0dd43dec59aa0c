use crate::models::{GroupRow, MessageRow, RecentMessageRow, UserRow, UserSummaryRow};
use crate::{Database, format_timestamp, is_unique_violation, parse_timestamp};
use anyhow::{Result, anyhow};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, Row};

impl Database {
    // -- Users --

    /// Insert a user unless `username` is already taken, in which case
    /// `None` is returned. The existence check and the insert share one
    /// transaction, and a UNIQUE violation from a concurrent writer is
    /// reported the same way.
    pub fn create_user(
        &self,
        username: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let taken: Option<i64> = tx
                .query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
                    row.get(0)
                })
                .optional()?;
            if taken.is_some() {
                return Ok(None);
            }

            let (_, now) = now();
            let inserted = tx.execute(
                "INSERT INTO users (username, display_name, password_hash, created_at, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (username, display_name, password_hash, &now),
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            let id = tx.last_insert_rowid();
            let user = query_user_by_id(&tx, id)?
                .ok_or_else(|| anyhow!("User {} missing right after insert", id))?;
            tx.commit()?;
            Ok(Some(user))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Stamp `last_seen` with the current time and return the stamp.
    pub fn touch_last_seen(&self, id: i64) -> Result<DateTime<Utc>> {
        self.with_conn(|conn| {
            let (ts, now) = now();
            conn.execute(
                "UPDATE users SET last_seen = ?1 WHERE id = ?2",
                rusqlite::params![now, id],
            )?;
            Ok(ts)
        })
    }

    /// Case-insensitive substring search on usernames. `needle` is matched
    /// literally; LIKE wildcards in it are escaped.
    pub fn search_users(&self, needle: &str, limit: u32) -> Result<Vec<UserSummaryRow>> {
        let pattern = format!("%{}%", escape_like(needle));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, display_name, is_admin, last_seen
                 FROM users
                 WHERE username LIKE ?1 ESCAPE '\\'
                 ORDER BY id
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![pattern, limit], user_summary_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Every user, newest account first.
    pub fn list_users(&self) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, display_name, is_admin, last_seen
                 FROM users
                 ORDER BY created_at DESC, id DESC",
            )?;

            let rows = stmt
                .query_map([], user_summary_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Grant the admin flag to each listed username that exists. Returns how
    /// many accounts changed.
    pub fn promote_admins(&self, usernames: &[String]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for username in usernames {
                changed += tx.execute(
                    "UPDATE users SET is_admin = 1 WHERE username = ?1 AND is_admin = 0",
                    [username],
                )?;
            }
            tx.commit()?;
            Ok(changed)
        })
    }

    // -- Groups --

    /// Create a group and enrol its creator in one transaction.
    pub fn create_group(&self, name: &str, description: &str, creator_id: i64) -> Result<GroupRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let (created_at, now) = now();

            tx.execute(
                "INSERT INTO groups_chat (name, description, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![name, description, creator_id, now],
            )?;
            let group_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO group_members (group_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![group_id, creator_id, now],
            )?;

            tx.commit()?;

            Ok(GroupRow {
                id: group_id,
                name: name.to_string(),
                description: description.to_string(),
                created_at,
                member_count: 1,
            })
        })
    }

    /// All groups newest first, or only those `member_id` belongs to.
    /// `member_count` is always the group's full membership.
    pub fn list_groups(&self, member_id: Option<i64>) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| match member_id {
            Some(user_id) => {
                let mut stmt = conn.prepare(
                    "SELECT g.id, g.name, g.description, g.created_at,
                            (SELECT COUNT(*) FROM group_members c WHERE c.group_id = g.id)
                     FROM groups_chat g
                     JOIN group_members gm ON gm.group_id = g.id AND gm.user_id = ?1
                     ORDER BY g.created_at DESC, g.id DESC",
                )?;
                let rows = stmt
                    .query_map([user_id], group_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT g.id, g.name, g.description, g.created_at, COUNT(gm.user_id)
                     FROM groups_chat g
                     LEFT JOIN group_members gm ON gm.group_id = g.id
                     GROUP BY g.id
                     ORDER BY g.created_at DESC, g.id DESC",
                )?;
                let rows = stmt
                    .query_map([], group_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
        })
    }

    /// Add a membership. Returns false when it already existed.
    pub fn join_group(&self, group_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let (_, now) = now();
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO group_members (group_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![group_id, user_id, now],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn list_members(&self, group_id: i64) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.display_name, u.is_admin, u.last_seen
                 FROM users u
                 JOIN group_members gm ON gm.user_id = u.id
                 WHERE gm.group_id = ?1
                 ORDER BY gm.joined_at, u.id",
            )?;

            let rows = stmt
                .query_map([group_id], user_summary_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    pub fn create_message(&self, group_id: i64, user_id: i64, text: &str) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let (_, now) = now();
            conn.execute(
                "INSERT INTO messages (group_id, user_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![group_id, user_id, text, now],
            )?;
            let id = conn.last_insert_rowid();

            conn.query_row(
                "SELECT m.id, m.group_id, m.user_id, m.text, m.created_at,
                        u.username, u.display_name
                 FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.id = ?1",
                [id],
                message_row,
            )
            .map_err(Into::into)
        })
    }

    /// The oldest `limit` messages of a group, oldest first.
    pub fn list_messages(&self, group_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.group_id, m.user_id, m.text, m.created_at,
                        u.username, u.display_name
                 FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.group_id = ?1
                 ORDER BY m.created_at ASC, m.id ASC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![group_id, limit], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// The newest `limit` messages across every group, newest first.
    pub fn recent_messages(&self, limit: u32) -> Result<Vec<RecentMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.group_id, m.user_id, m.text, m.created_at,
                        u.username, u.display_name, g.name
                 FROM messages m
                 JOIN users u ON m.user_id = u.id
                 JOIN groups_chat g ON m.group_id = g.id
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    Ok(RecentMessageRow {
                        message: message_row(row)?,
                        group_name: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, display_name, password_hash, is_admin, created_at, last_seen
         FROM users WHERE username = ?1",
    )?;

    let row = stmt.query_row([username], user_row).optional()?;

    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, display_name, password_hash, is_admin, created_at, last_seen
         FROM users WHERE id = ?1",
    )?;

    let row = stmt.query_row([id], user_row).optional()?;

    Ok(row)
}

fn user_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: timestamp(row, 5)?,
        last_seen: optional_timestamp(row, 6)?,
    })
}

fn user_summary_row(row: &Row) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        is_admin: row.get(3)?,
        last_seen: optional_timestamp(row, 4)?,
    })
}

fn group_row(row: &Row) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: timestamp(row, 3)?,
        member_count: row.get(4)?,
    })
}

fn message_row(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        user_id: row.get(2)?,
        text: row.get(3)?,
        created_at: timestamp(row, 4)?,
        author_username: row.get(5)?,
        author_display_name: row.get(6)?,
    })
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unparseable timestamp '{}'", raw).into(),
        )
    })
}

fn optional_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

/// Current time truncated to the stored precision, with its stored form.
fn now() -> (DateTime<Utc>, String) {
    let ts = Utc::now().trunc_subsecs(6);
    (ts, format_timestamp(ts))
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_foreign_key_violation;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn user(db: &Database, username: &str) -> UserRow {
        db.create_user(username, &username.to_uppercase(), "hash").unwrap().unwrap()
    }

    #[test]
    fn first_user_gets_id_one() {
        let db = db();
        let ann = user(&db, "ann");
        assert_eq!(ann.id, 1);
        assert!(!ann.is_admin);
        assert_eq!(ann.last_seen, Some(ann.created_at));
    }

    #[test]
    fn duplicate_username_is_reported_as_taken() {
        let db = db();
        user(&db, "ann");
        assert!(db.create_user("ann", "Other", "hash").unwrap().is_none());
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn touch_last_seen_moves_forward() {
        let db = db();
        let ann = user(&db, "ann");
        let stamped = db.touch_last_seen(ann.id).unwrap();

        let reloaded = db.get_user_by_id(ann.id).unwrap().unwrap();
        assert_eq!(reloaded.last_seen, Some(stamped));
        assert!(stamped >= ann.created_at);
    }

    #[test]
    fn search_matches_substrings_literally() {
        let db = db();
        user(&db, "anna");
        user(&db, "joanne");
        user(&db, "bob");
        user(&db, "a_b");

        let names: Vec<String> = db
            .search_users("ann", 20)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["anna", "joanne"]);

        // `_` must not act as a single-character wildcard
        let names: Vec<String> = db
            .search_users("_", 20)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["a_b"]);

        assert_eq!(db.search_users("", 20).unwrap().len(), 4);
        assert_eq!(db.search_users("", 2).unwrap().len(), 2);
    }

    #[test]
    fn promote_admins_only_counts_changes() {
        let db = db();
        user(&db, "root");
        let names = vec!["root".to_string(), "ghost".to_string()];

        assert_eq!(db.promote_admins(&names).unwrap(), 1);
        assert_eq!(db.promote_admins(&names).unwrap(), 0);
        assert!(db.get_user_by_username("root").unwrap().unwrap().is_admin);
    }

    #[test]
    fn create_group_enrols_creator() {
        let db = db();
        let ann = user(&db, "ann");
        let group = db.create_group("rust", "", ann.id).unwrap();

        let members = db.list_members(group.id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, ann.id);

        let mine = db.list_groups(Some(ann.id)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].member_count, 1);
    }

    #[test]
    fn create_group_with_unknown_creator_leaves_nothing_behind() {
        let db = db();
        let err = db.create_group("orphan", "", 42).unwrap_err();
        assert!(is_foreign_key_violation(&err));
        assert!(db.list_groups(None).unwrap().is_empty());
    }

    #[test]
    fn join_is_idempotent() {
        let db = db();
        let ann = user(&db, "ann");
        let bob = user(&db, "bob");
        let group = db.create_group("rust", "", ann.id).unwrap();

        assert!(db.join_group(group.id, bob.id).unwrap());
        assert!(!db.join_group(group.id, bob.id).unwrap());
        assert_eq!(db.list_members(group.id).unwrap().len(), 2);
    }

    #[test]
    fn filtered_groups_keep_full_member_count() {
        let db = db();
        let ann = user(&db, "ann");
        let bob = user(&db, "bob");
        let shared = db.create_group("shared", "", ann.id).unwrap();
        db.join_group(shared.id, bob.id).unwrap();
        let solo = db.create_group("solo", "", ann.id).unwrap();

        let all = db.list_groups(None).unwrap();
        assert_eq!(all.iter().map(|g| g.id).collect::<Vec<_>>(), vec![solo.id, shared.id]);

        let bobs = db.list_groups(Some(bob.id)).unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].id, shared.id);
        assert_eq!(bobs[0].member_count, 2);
    }

    #[test]
    fn messages_are_listed_oldest_first_and_capped() {
        let db = db();
        let ann = user(&db, "ann");
        let group = db.create_group("rust", "", ann.id).unwrap();

        for i in 0..5 {
            db.create_message(group.id, ann.id, &format!("m{}", i)).unwrap();
        }

        let texts: Vec<String> = db
            .list_messages(group.id, 3)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["m0", "m1", "m2"]);

        let recent = db.recent_messages(2).unwrap();
        assert_eq!(recent[0].message.text, "m4");
        assert_eq!(recent[1].message.text, "m3");
        assert_eq!(recent[0].group_name, "rust");
    }

    #[test]
    fn message_to_unknown_group_is_a_foreign_key_violation() {
        let db = db();
        let ann = user(&db, "ann");
        let err = db.create_message(99, ann.id, "hi").unwrap_err();
        assert!(is_foreign_key_violation(&err));
    }
}
