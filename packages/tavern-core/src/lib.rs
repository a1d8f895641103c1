//! # Tavern Core
//!
//! Matching and messaging for people looking for a tabletop role-playing
//! group: discover other players, propose a match, and chat once matched.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         TAVERN CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │  Identity   │  │  Profiles   │  │   Matches   │  │  Messaging   │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - Provider  │  │ - Register  │  │ - Propose   │  │ - Send       │   │
//! │  │ - Bearer    │  │ - Lookup    │  │ - Accept    │  │ - Pull       │   │
//! │  │ - Auth'd    │  │ - Directory │  │ - Reject    │  │ - Read state │   │
//! │  │   user      │  │             │  │ - Discover ─┼──┼─► Discovery  │   │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘   │
//! │         │                │                │                │           │
//! │         └────────────────┴───────┬────────┴────────────────┘           │
//! │                                  ▼                                      │
//! │                        ┌───────────────────┐                            │
//! │                        │      Storage      │                            │
//! │                        │  SQLite, one      │                            │
//! │                        │  locked connection│                            │
//! │                        └───────────────────┘                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`identity`] - The authenticated-user boundary
//! - [`storage`] - SQLite persistence
//! - [`profiles`] - User profiles and the user directory
//! - [`discovery`] - Candidate exclusion filter
//! - [`matches`] - Match lifecycle
//! - [`messaging`] - Per-match conversations and read state
//!
//! Every operation that acts on behalf of a user takes an explicit
//! [`identity::AuthenticatedUser`]. There is no ambient "current user".

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod discovery;
pub mod error;
pub mod identity;
pub mod matches;
pub mod messaging;
pub mod profiles;
pub mod storage;
/// Wall-clock helpers shared by storage and services.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use error::{Error, Result};
pub use identity::{AuthenticatedUser, IdentityProvider};
pub use matches::{Match, MatchService, MatchStatus, MatchWithParticipants};
pub use messaging::{Message, MessageKind, MessageWithSender, MessagingService};
pub use profiles::{NewUser, ProfileService, Role, UserProfile};
pub use storage::Database;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
