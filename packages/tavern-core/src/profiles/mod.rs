//! # Profiles Module
//!
//! The profile store: user records as the rest of the core sees them.
//!
//! Profiles are written once by the registration collaborator (or the seed
//! loader) and are read-only afterwards. Nothing here ever carries credential
//! material; [`UserProfile`] is what every other module and every response
//! uses to describe a user.
//!
//! ## Directory Paging
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       USER DIRECTORY PAGING                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  UserListQuery { page: 2, limit: 10, sort: displayName, order: asc }   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  page  < 1          → 1                                                 │
//! │  limit < 1 or > max → clamped                                           │
//! │  offset             = (page - 1) * limit                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  UserPage { users: [...], pagination: { currentPage, totalPages,       │
//! │                                         totalUsers, usersPerPage } }   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::{Database, UserRecord};

/// Default number of users per directory page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// What a user does at the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Plays a character
    #[default]
    Player,
    /// Runs the game
    #[serde(alias = "game_master")]
    GameMaster,
}

impl Role {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::GameMaster => "game_master",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "player" => Some(Role::Player),
            "game_master" => Some(Role::GameMaster),
            _ => None,
        }
    }
}

/// A user profile, safe to hand to any authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub handle: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub bio: String,
    pub game_systems: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserProfile {
    /// Build a profile from its stored record
    pub fn from_record(record: UserRecord) -> Result<Self> {
        let role = Role::parse(&record.role).ok_or_else(|| {
            Error::Internal(format!("unknown role {:?} for user {}", record.role, record.id))
        })?;
        let game_systems: Vec<String> = serde_json::from_str(&record.game_systems)?;

        Ok(Self {
            id: record.id,
            display_name: record.display_name,
            handle: record.handle,
            email: record.email,
            phone: record.phone,
            role,
            bio: record.bio,
            game_systems,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Input for registering a user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Fixed id; generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub display_name: String,
    pub handle: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub game_systems: Vec<String>,
}

/// Sortable directory fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserSort {
    #[default]
    DisplayName,
    Handle,
    CreatedAt,
}

impl UserSort {
    /// Parse the query-string name of a sort field
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "displayName" | "display_name" | "name" => Some(UserSort::DisplayName),
            "handle" => Some(UserSort::Handle),
            "createdAt" | "created_at" => Some(UserSort::CreatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            UserSort::DisplayName => "display_name",
            UserSort::Handle => "handle",
            UserSort::CreatedAt => "created_at",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `desc` sorts ascending
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }
}

/// A directory page request
#[derive(Debug, Clone, Default)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: UserSort,
    pub order: SortOrder,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_users: u32,
    pub users_per_page: u32,
}

/// One page of the user directory
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<UserProfile>,
    pub pagination: Pagination,
}

/// Limits applied to directory paging
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
        }
    }
}

/// Profile store service
pub struct ProfileService {
    database: Arc<Database>,
    limits: PageLimits,
}

impl ProfileService {
    /// Create a new profile service
    pub fn new(database: Arc<Database>) -> Self {
        Self::with_limits(database, PageLimits::default())
    }

    /// Create a profile service with custom paging limits
    pub fn with_limits(database: Arc<Database>, limits: PageLimits) -> Self {
        Self { database, limits }
    }

    /// Register a user.
    ///
    /// Trims every text field and lowercases the email. Display name, handle
    /// and email must be non-empty; a taken id or email is rejected.
    pub fn register(&self, new_user: NewUser) -> Result<UserProfile> {
        let display_name = new_user.display_name.trim().to_string();
        let handle = new_user.handle.trim().to_string();
        let email = new_user.email.trim().to_lowercase();

        if display_name.is_empty() {
            return Err(Error::ValidationError("display name is required".into()));
        }
        if handle.is_empty() {
            return Err(Error::ValidationError("handle is required".into()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(Error::ValidationError("a valid email is required".into()));
        }

        let game_systems: Vec<String> = new_user
            .game_systems
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let now = crate::time::now_timestamp_millis();
        let record = UserRecord {
            id: new_user
                .id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            display_name,
            handle,
            email,
            phone: new_user.phone.trim().to_string(),
            role: new_user.role.as_str().to_string(),
            bio: new_user.bio.trim().to_string(),
            game_systems: serde_json::to_string(&game_systems)?,
            created_at: now,
            updated_at: now,
        };

        self.database.insert_user(&record)?;
        tracing::info!(
            user_id = record.id.as_str(),
            handle = record.handle.as_str(),
            "User registered"
        );

        UserProfile::from_record(record)
    }

    /// Get a single profile
    pub fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        let record = self
            .database
            .get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        UserProfile::from_record(record)
    }

    /// Look up a profile by email, if one is registered
    pub fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        self.database
            .get_user_by_email(email)?
            .map(UserProfile::from_record)
            .transpose()
    }

    /// Whether a user exists
    pub fn exists(&self, user_id: &str) -> Result<bool> {
        self.database.user_exists(user_id)
    }

    /// Every profile in creation order
    pub fn all_profiles(&self) -> Result<Vec<UserProfile>> {
        self.database
            .get_all_users()?
            .into_iter()
            .map(UserProfile::from_record)
            .collect()
    }

    /// One page of the user directory
    pub fn list_users(&self, query: &UserListQuery) -> Result<UserPage> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(self.limits.default_limit)
            .clamp(1, self.limits.max_limit.max(1));
        let offset = (page as i64 - 1) * limit as i64;

        let total = self.database.count_users()?.max(0) as u32;
        let records = self.database.get_users_page(
            query.sort.column(),
            query.order == SortOrder::Desc,
            limit as i64,
            offset,
        )?;

        let users = records
            .into_iter()
            .map(UserProfile::from_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(UserPage {
            users,
            pagination: Pagination {
                current_page: page,
                total_pages: total.div_ceil(limit),
                total_users: total,
                users_per_page: limit,
            },
        })
    }
}
