//! # Database Schema
//!
//! SQL schema definitions for the Tavern database.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐    ┌─────────────────┐      ┌─────────────────┐    │
//! │  │     users       │    │     matches     │      │    messages     │    │
//! │  ├─────────────────┤    ├─────────────────┤      ├─────────────────┤    │
//! │  │ id              │◄───│ user_a          │      │ seq             │    │
//! │  │ display_name    │◄───│ user_b          │      │ id              │    │
//! │  │ handle          │    │ id              │◄─────│ match_id        │    │
//! │  │ email           │    │ pair_key  (UQ)  │      │ sender_id       │───►│
//! │  │ phone           │    │ status          │      │ content         │    │
//! │  │ role            │    │ created_at      │      │ kind            │    │
//! │  │ bio             │    │ updated_at      │      │ is_read         │    │
//! │  │ game_systems    │    └─────────────────┘      │ created_at      │    │
//! │  │ created_at      │                             │ updated_at      │    │
//! │  │ updated_at      │                             └─────────────────┘    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `pair_key` is the two participant ids sorted and joined with `:`. The
//! UNIQUE constraint on it is what makes (a, b) and (b, a) the same match.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Pragmas applied to every connection before anything else
pub const CONNECTION_PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
"#;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Users table
-- Profiles written by the registration collaborator; read-only to the core.
-- No credential material lives here.
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    -- Nickname shown next to the display name
    handle TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT 'player' CHECK (role IN ('player', 'game_master')),
    bio TEXT NOT NULL DEFAULT '',
    -- JSON array of preferred game systems
    game_systems TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_created ON users(created_at, id);

-- Matches table
-- One row per unordered pair of users
CREATE TABLE IF NOT EXISTS matches (
    id TEXT PRIMARY KEY,
    -- Proposer
    user_a TEXT NOT NULL,
    -- Target
    user_b TEXT NOT NULL,
    -- Canonical unordered pair, see module docs
    pair_key TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'accepted', 'rejected')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CONSTRAINT distinct_participants CHECK (user_a <> user_b),
    FOREIGN KEY (user_a) REFERENCES users(id),
    FOREIGN KEY (user_b) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_matches_user_a ON matches(user_a);
CREATE INDEX IF NOT EXISTS idx_matches_user_b ON matches(user_b);

-- Messages table
-- Append-only; only is_read and updated_at ever change
CREATE TABLE IF NOT EXISTS messages (
    -- Store-assigned insertion order
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    match_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    content TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'text' CHECK (kind IN ('text', 'image', 'system')),
    is_read INTEGER NOT NULL DEFAULT 0,
    -- Strictly increasing across the store (Unix ms)
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (match_id) REFERENCES matches(id),
    FOREIGN KEY (sender_id) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_messages_match ON messages(match_id, created_at);
-- Store clock lookup: MAX(created_at)
CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);
CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(match_id, is_read) WHERE is_read = 0;
"#;
