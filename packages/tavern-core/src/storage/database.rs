//! # Database
//!
//! SQLite database wrapper for users, matches and messages.
//!
//! ## Database Operations
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DATABASE OPERATIONS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │    Services     │  profiles / matches / messaging                   │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │    Database     │  High-level API                                   │
//! │  │   (this file)   │  - User records                                   │
//! │  │                 │  - Match records (pair uniqueness)                │
//! │  │                 │  - Message records (ordering, read state)         │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │    rusqlite     │  One connection behind a mutex; every method      │
//! │  │                 │  holds the lock for its whole read-modify-write   │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │   SQLite DB     │  - In-memory for tests                            │
//! │  │                 │  - File for production                            │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::schema;
use crate::error::{Error, Result};

/// Build a storage error with context, logging the backend detail.
fn db_err(context: &str, err: rusqlite::Error) -> Error {
    tracing::error!(error = %err, "{}", context);
    Error::StorageError(format!("{}: {}", context, err))
}

/// Extended SQLite result code if `err` is a constraint violation.
fn constraint_violation(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(e.extended_code)
        }
        _ => None,
    }
}

/// Canonical key for an unordered pair of user ids.
///
/// `pair_key(a, b) == pair_key(b, a)` for all inputs.
pub fn pair_key(first: &str, second: &str) -> String {
    if first <= second {
        format!("{}:{}", first, second)
    } else {
        format!("{}:{}", second, first)
    }
}

const USER_COLUMNS: &str =
    "id, display_name, handle, email, phone, role, bio, game_systems, created_at, updated_at";

const MATCH_COLUMNS: &str = "id, user_a, user_b, status, created_at, updated_at";

/// Latest message timestamp in the store. Served by `idx_messages_created`.
const MESSAGE_CLOCK_QUERY: &str = "SELECT COALESCE(MAX(created_at), 0) FROM messages";

const MESSAGE_COLUMNS: &str =
    "seq, id, match_id, sender_id, content, kind, is_read, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        display_name: row.get(1)?,
        handle: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        role: row.get(5)?,
        bio: row.get(6)?,
        game_systems: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        seq: row.get(0)?,
        id: row.get(1)?,
        match_id: row.get(2)?,
        sender_id: row.get(3)?,
        content: row.get(4)?,
        kind: row.get(5)?,
        is_read: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// The main database handle
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct Database {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub async fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p).map_err(|e| db_err("Failed to open database", e))?,
            None => Connection::open_in_memory()
                .map_err(|e| db_err("Failed to create in-memory database", e))?,
        };

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(schema::CONNECTION_PRAGMAS)
            .map_err(|e| db_err("Failed to apply pragmas", e))?;

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        match version {
            None => {
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| db_err("Failed to create tables", e))?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| db_err("Failed to set schema version", e))?;

                tracing::info!("Database schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(Error::StorageError(format!(
                    "database schema version {} is newer than supported {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                // Every statement is IF NOT EXISTS
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| db_err("Failed to migrate tables", e))?;

                conn.execute(
                    "UPDATE schema_version SET version = ?",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| db_err("Failed to set schema version", e))?;

                tracing::info!(
                    "Database schema migrated from version {} to {}",
                    v,
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) => {
                tracing::debug!("Database schema version: {}", v);
            }
        }

        Ok(())
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Insert a new user record.
    ///
    /// A duplicate id or email is reported as a validation error.
    pub fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let conn = self.conn.lock();

        let result = conn.execute(
            "INSERT INTO users (id, display_name, handle, email, phone, role, bio, game_systems, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                user.id,
                user.display_name,
                user.handle,
                user.email,
                user.phone,
                user.role,
                user.bio,
                user.game_systems,
                user.created_at,
                user.updated_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) => match constraint_violation(&e) {
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
                | Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => Err(
                    Error::ValidationError("a user with this id or email already exists".into()),
                ),
                Some(_) => Err(Error::ValidationError(format!("invalid user record: {}", e))),
                None => Err(db_err("Failed to insert user", e)),
            },
        }
    }

    /// Get a user by id
    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(|e| db_err("Failed to get user", e))
    }

    /// Get a user by email (stored lowercased)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
            params![email.trim().to_lowercase()],
            user_from_row,
        )
        .optional()
        .map_err(|e| db_err("Failed to get user", e))
    }

    /// Check whether a user id exists
    pub fn user_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();

        conn.query_row("SELECT 1 FROM users WHERE id = ?", params![id], |_| Ok(()))
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| db_err("Failed to check user", e))
    }

    /// Get all users in creation order (ties broken by id)
    pub fn get_all_users(&self) -> Result<Vec<UserRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at ASC, id ASC",
                USER_COLUMNS
            ))
            .map_err(|e| db_err("Failed to prepare query", e))?;

        let rows = stmt
            .query_map([], user_from_row)
            .map_err(|e| db_err("Failed to query users", e))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row.map_err(|e| db_err("Failed to read user", e))?);
        }

        Ok(users)
    }

    /// Get one page of users.
    ///
    /// `sort_column` must be one of `display_name`, `handle`, `created_at`.
    pub fn get_users_page(
        &self,
        sort_column: &str,
        descending: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserRecord>> {
        let column = match sort_column {
            "display_name" | "handle" | "created_at" => sort_column,
            other => {
                return Err(Error::ValidationError(format!(
                    "unsupported sort column: {}",
                    other
                )))
            }
        };
        let direction = if descending { "DESC" } else { "ASC" };

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM users ORDER BY {} {}, id {} LIMIT ? OFFSET ?",
                USER_COLUMNS, column, direction, direction
            ))
            .map_err(|e| db_err("Failed to prepare query", e))?;

        let rows = stmt
            .query_map(params![limit, offset], user_from_row)
            .map_err(|e| db_err("Failed to query users", e))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row.map_err(|e| db_err("Failed to read user", e))?);
        }

        Ok(users)
    }

    /// Total number of users
    pub fn count_users(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(|e| db_err("Failed to count users", e))
    }

    // ========================================================================
    // MATCH OPERATIONS
    // ========================================================================

    /// Insert a new match.
    ///
    /// Uniqueness of the unordered pair is enforced by the `pair_key`
    /// constraint, so two concurrent proposals in opposite directions cannot
    /// both succeed.
    pub fn insert_match(&self, record: &MatchRecord) -> Result<()> {
        let conn = self.conn.lock();

        let result = conn.execute(
            "INSERT INTO matches (id, user_a, user_b, pair_key, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.user_a,
                record.user_b,
                pair_key(&record.user_a, &record.user_b),
                record.status,
                record.created_at,
                record.updated_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) => match constraint_violation(&e) {
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => Err(Error::DuplicateMatch),
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_CHECK) => Err(Error::InvalidTarget(
                    "a user cannot match with themselves".into(),
                )),
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    Err(Error::InvalidTarget("target user does not exist".into()))
                }
                _ => Err(db_err("Failed to insert match", e)),
            },
        }
    }

    /// Get a match by id
    pub fn get_match(&self, id: &str) -> Result<Option<MatchRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM matches WHERE id = ?", MATCH_COLUMNS),
            params![id],
            match_from_row,
        )
        .optional()
        .map_err(|e| db_err("Failed to get match", e))
    }

    /// Get the match connecting two users, in either order
    pub fn get_match_between(&self, first: &str, second: &str) -> Result<Option<MatchRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM matches WHERE pair_key = ?", MATCH_COLUMNS),
            params![pair_key(first, second)],
            match_from_row,
        )
        .optional()
        .map_err(|e| db_err("Failed to get match", e))
    }

    /// Get every match a user participates in, oldest first
    pub fn get_matches_for_user(&self, user_id: &str) -> Result<Vec<MatchRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM matches WHERE user_a = ?1 OR user_b = ?1
                 ORDER BY created_at ASC, id ASC",
                MATCH_COLUMNS
            ))
            .map_err(|e| db_err("Failed to prepare query", e))?;

        let rows = stmt
            .query_map(params![user_id], match_from_row)
            .map_err(|e| db_err("Failed to query matches", e))?;

        let mut matches = Vec::new();
        for row in rows {
            matches.push(row.map_err(|e| db_err("Failed to read match", e))?);
        }

        Ok(matches)
    }

    /// Set a match's status and refresh `updated_at`.
    ///
    /// Returns the updated record, or None if the match does not exist.
    pub fn update_match_status(
        &self,
        id: &str,
        status: &str,
        updated_at: i64,
    ) -> Result<Option<MatchRecord>> {
        let conn = self.conn.lock();

        let rows = conn
            .execute(
                "UPDATE matches SET status = ?, updated_at = ? WHERE id = ?",
                params![status, updated_at, id],
            )
            .map_err(|e| db_err("Failed to update match status", e))?;

        if rows == 0 {
            return Ok(None);
        }

        conn.query_row(
            &format!("SELECT {} FROM matches WHERE id = ?", MATCH_COLUMNS),
            params![id],
            match_from_row,
        )
        .optional()
        .map_err(|e| db_err("Failed to reload match", e))
    }

    /// Total number of matches
    pub fn count_matches(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))
            .map_err(|e| db_err("Failed to count matches", e))
    }

    // ========================================================================
    // MESSAGE OPERATIONS
    // ========================================================================

    /// Append a message to a match.
    ///
    /// `created_at` is assigned here, under the connection lock, as the next
    /// value of a strictly increasing clock. Callers never supply ordering.
    pub fn insert_message(
        &self,
        id: &str,
        match_id: &str,
        sender_id: &str,
        content: &str,
        kind: &str,
    ) -> Result<MessageRecord> {
        let conn = self.conn.lock();

        let last: i64 = conn
            .query_row(MESSAGE_CLOCK_QUERY, [], |row| row.get(0))
            .map_err(|e| db_err("Failed to read message clock", e))?;
        let created_at = crate::time::next_monotonic_millis(last);

        conn.execute(
            "INSERT INTO messages (id, match_id, sender_id, content, kind, is_read, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
            params![id, match_id, sender_id, content, kind, created_at, created_at],
        )
        .map_err(|e| db_err("Failed to store message", e))?;

        Ok(MessageRecord {
            seq: conn.last_insert_rowid(),
            id: id.to_string(),
            match_id: match_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            kind: kind.to_string(),
            is_read: false,
            created_at,
            updated_at: created_at,
        })
    }

    /// Get the messages of a match in creation order.
    ///
    /// With `after`, only messages created strictly later are returned.
    pub fn get_messages(&self, match_id: &str, after: Option<i64>) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM messages WHERE match_id = ? AND created_at > ?
                 ORDER BY created_at ASC, seq ASC",
                MESSAGE_COLUMNS
            ))
            .map_err(|e| db_err("Failed to prepare query", e))?;

        let rows = stmt
            .query_map(params![match_id, after.unwrap_or(i64::MIN)], message_from_row)
            .map_err(|e| db_err("Failed to query messages", e))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.map_err(|e| db_err("Failed to read message", e))?);
        }

        Ok(messages)
    }

    /// Mark every unread message in a match not sent by `reader_id` as read.
    ///
    /// Returns how many rows changed; zero on a repeated call.
    pub fn mark_messages_read(&self, match_id: &str, reader_id: &str, now: i64) -> Result<usize> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE messages SET is_read = 1, updated_at = ?
             WHERE match_id = ? AND sender_id <> ? AND is_read = 0",
            params![now, match_id, reader_id],
        )
        .map_err(|e| db_err("Failed to mark messages read", e))
    }

    /// Unread messages addressed to `user_id` across all of their matches
    pub fn count_unread_for_user(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT COUNT(*) FROM messages m
             JOIN matches x ON x.id = m.match_id
             WHERE (x.user_a = ?1 OR x.user_b = ?1)
               AND m.sender_id <> ?1
               AND m.is_read = 0",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(|e| db_err("Failed to count unread messages", e))
    }

    /// Unread messages addressed to `user_id` within one match
    pub fn count_unread_in_match(&self, match_id: &str, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE match_id = ? AND sender_id <> ? AND is_read = 0",
            params![match_id, user_id],
            |row| row.get(0),
        )
        .map_err(|e| db_err("Failed to count unread messages", e))
    }

    /// Total number of messages
    pub fn count_messages(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .map_err(|e| db_err("Failed to count messages", e))
    }
}

// ============================================================================
// RECORD TYPES
// ============================================================================

/// A user record from the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Stable user id
    pub id: String,
    /// Display name
    pub display_name: String,
    /// Handle shown in conversations
    pub handle: String,
    /// Contact email (unique)
    pub email: String,
    /// Contact phone
    pub phone: String,
    /// `player` or `game_master`
    pub role: String,
    /// Free-text bio
    pub bio: String,
    /// JSON array of preferred game systems
    pub game_systems: String,
    /// Creation timestamp (ms)
    pub created_at: i64,
    /// Last update timestamp (ms)
    pub updated_at: i64,
}

/// A match record from the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    /// Match id
    pub id: String,
    /// Proposing user
    pub user_a: String,
    /// Target user
    pub user_b: String,
    /// `pending`, `accepted` or `rejected`
    pub status: String,
    /// Creation timestamp (ms)
    pub created_at: i64,
    /// Last status change (ms)
    pub updated_at: i64,
}

/// A message record from the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Store-assigned insertion sequence
    pub seq: i64,
    /// Message id
    pub id: String,
    /// Owning match
    pub match_id: String,
    /// Sending participant
    pub sender_id: String,
    /// Message body
    pub content: String,
    /// `text`, `image` or `system`
    pub kind: String,
    /// Read by the other participant
    pub is_read: bool,
    /// Store-assigned creation timestamp (ms), strictly increasing
    pub created_at: i64,
    /// Last read-state change (ms)
    pub updated_at: i64,
}

// ============================================================================
// TESTS
// ============================================================================
