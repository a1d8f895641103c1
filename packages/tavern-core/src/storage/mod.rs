//! # Storage Module
//!
//! Persistent storage for users, matches and messages.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SQLite Database                                                │   │
//! │  │  ───────────────                                                 │   │
//! │  │                                                                 │   │
//! │  │  Tables:                                                       │   │
//! │  │  • users    - Profiles (no credentials)                        │   │
//! │  │  • matches  - One row per unordered user pair                  │   │
//! │  │  • messages - Append-only chat entries with read state        │   │
//! │  │                                                                 │   │
//! │  │  Invariants held by the schema, not by application code:      │   │
//! │  │  • UNIQUE(pair_key)       → no duplicate or mirrored match    │   │
//! │  │  • CHECK(user_a <> user_b) → no self-match                    │   │
//! │  │  • created_at assigned under the lock → total message order   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod database;
mod schema;

pub use database::{pair_key, Database, MatchRecord, MessageRecord, UserRecord};
pub use schema::SCHEMA_VERSION;

use crate::error::Result;

/// Storage configuration
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Path to the database file (None for in-memory)
    pub database_path: Option<String>,
}

/// Initialize the storage system
pub async fn init(config: StorageConfig) -> Result<Database> {
    match config.database_path.as_deref() {
        Some(":memory:") | None => {
            tracing::warn!("Using in-memory database; data is lost on restart");
            Database::open(None).await
        }
        Some(path) => {
            tracing::info!(path = path, "Opening database");
            Database::open(Some(path)).await
        }
    }
}
