//! Tavern Server
//!
//! HTTP front end for the Tavern core:
//!
//! 1. **Discovery**: list the players a user has not paired with yet.
//!
//! 2. **Matches**: propose a match, accept or reject one, list your own.
//!
//! 3. **Chat**: send messages inside a match and poll for new ones with
//!    `?after=<createdAt>`. There is no push channel.
//!
//! Accounts are not created here. Users and their bearer tokens come from a
//! seed file that stands in for the external account service.

mod api;
mod auth;
mod seed;
mod state;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tavern_core::storage::{self, StorageConfig};

use auth::StaticTokenProvider;
use state::{AppState, ServerConfig};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "tavern-server", version, about = "Tavern matching and chat server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "PORT")]
    port: u16,

    /// SQLite database file, or ":memory:"
    #[arg(long, default_value = "tavern.db", env = "DATABASE_PATH")]
    database: String,

    /// JSON file of users and their bearer tokens
    #[arg(long, env = "SEED_FILE")]
    seed_file: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    log_format: LogFormat,

    /// Users per directory page when the client does not ask
    #[arg(long, default_value_t = 10, env = "DEFAULT_PAGE_SIZE")]
    default_page_size: u32,

    /// Largest directory page a client may request
    #[arg(long, default_value_t = 100, env = "MAX_PAGE_SIZE")]
    max_page_size: u32,

    /// Maximum message length in characters
    #[arg(long, default_value_t = 4000, env = "MAX_MESSAGE_LENGTH")]
    max_message_length: usize,
}

impl Args {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            database_path: self.database.clone(),
            seed_file: self.seed_file.clone(),
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            max_message_length: self.max_message_length,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tavern_server=info,tavern_core=info,tower_http=info".into());

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = args.config();

    let database = storage::init(StorageConfig {
        database_path: Some(config.database_path.clone()),
    })
    .await
    .context("failed to open database")?;

    let state = AppState::new(config.clone(), database, StaticTokenProvider::new());

    if let Some(path) = config.seed_file.as_deref() {
        let summary = seed::load_file(path, &state.profiles, &state.tokens)?;
        tracing::info!(
            path = path,
            created = summary.created,
            existing = summary.existing,
            tokens = state.tokens.len(),
            "Seed file applied"
        );
    }

    if state.tokens.is_empty() {
        tracing::warn!("No bearer tokens loaded; every authenticated request will be rejected");
    }

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Tavern server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_path, "tavern.db");
        assert!(config.seed_file.is_none());
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.max_message_length, 4000);
    }

    #[test]
    fn test_args_override_defaults() {
        let args = Args::try_parse_from([
            "tavern-server",
            "--port",
            "9000",
            "--database",
            ":memory:",
            "--seed-file",
            "seed.json",
            "--log-format",
            "json",
            "--max-page-size",
            "25",
        ])
        .unwrap();

        assert_eq!(args.log_format, LogFormat::Json);
        let config = args.config();
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_path, ":memory:");
        assert_eq!(config.seed_file.as_deref(), Some("seed.json"));
        assert_eq!(config.max_page_size, 25);
        assert_eq!(config.default_page_size, 10);
    }

    #[tokio::test]
    async fn test_state_creation() {
        let database = tavern_core::Database::open(None).await.unwrap();
        let state = AppState::new(ServerConfig::default(), database, StaticTokenProvider::new());
        assert_eq!(state.database.count_users().unwrap(), 0);
        assert!(state.tokens.is_empty());
    }
}
