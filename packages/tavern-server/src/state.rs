//! Server state management.
//!
//! One database handle shared by the three core services, plus the bearer
//! token table. Everything is behind `Arc`, so cloning the state per request
//! is cheap.

use std::sync::Arc;

use tavern_core::profiles::{PageLimits, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use tavern_core::{Database, MatchService, MessagingService, ProfileService};

use crate::auth::StaticTokenProvider;

/// Default HTTP port.
const DEFAULT_PORT: u16 = 3000;

/// Default database file.
const DEFAULT_DATABASE_PATH: &str = "tavern.db";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Database file, or `:memory:`
    pub database_path: String,
    /// Optional JSON file of users and their bearer tokens
    pub seed_file: Option<String>,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Maximum message length in characters
    pub max_message_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            seed_file: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            max_message_length: tavern_core::messaging::MAX_MESSAGE_LENGTH,
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// Shared database handle, also used directly by `/stats`.
    pub database: Arc<Database>,

    pub profiles: Arc<ProfileService>,
    pub matches: Arc<MatchService>,
    pub messaging: Arc<MessagingService>,

    /// Bearer token → user id.
    pub tokens: StaticTokenProvider,

    /// Server configuration.
    pub config: ServerConfig,
}

impl AppState {
    /// Build the services on top of an opened database.
    pub fn new(config: ServerConfig, database: Database, tokens: StaticTokenProvider) -> Self {
        let database = Arc::new(database);
        let limits = PageLimits {
            default_limit: config.default_page_size,
            max_limit: config.max_page_size,
        };

        Self {
            profiles: Arc::new(ProfileService::with_limits(database.clone(), limits)),
            matches: Arc::new(MatchService::new(database.clone())),
            messaging: Arc::new(MessagingService::with_max_length(
                database.clone(),
                config.max_message_length,
            )),
            database,
            tokens,
            config,
        }
    }
}
