//! # Identity Module
//!
//! The boundary between Tavern core and whatever authenticates requests.
//!
//! Credential checking (hashing, token issuance, token verification) lives
//! outside the core. An [`IdentityProvider`] turns an opaque credential into a
//! user id; [`authenticate`] additionally requires that the user still exists
//! in the profile store. Every core operation then takes the resulting
//! [`AuthenticatedUser`] as an explicit parameter.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        AUTHENTICATION FLOW                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  "Authorization: Bearer t0k3n"                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  bearer_token()        → "t0k3n"          (missing → Unauthenticated)   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  IdentityProvider      → user id          (unknown → Unauthenticated)   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Database::user_exists → AuthenticatedUser (gone  → Unauthenticated)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::Database;

/// A request identity that has passed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AuthenticatedUser {
    user_id: String,
}

impl AuthenticatedUser {
    /// Wrap an already-verified user id.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// The stable user id.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Resolves an opaque credential to a user id.
///
/// Implementations must return [`Error::Unauthenticated`] for anything they
/// do not recognise.
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer credential to the user id it was issued for.
    fn resolve(&self, credential: &str) -> Result<String>;
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Authenticate a request from its raw `Authorization` header.
pub fn authenticate(
    provider: &dyn IdentityProvider,
    database: &Database,
    authorization: Option<&str>,
) -> Result<AuthenticatedUser> {
    let token = authorization
        .and_then(bearer_token)
        .ok_or(Error::Unauthenticated)?;

    let user_id = provider.resolve(token)?;

    if !database.user_exists(&user_id)? {
        tracing::warn!(user_id = user_id.as_str(), "Credential resolved to unknown user");
        return Err(Error::Unauthenticated);
    }

    Ok(AuthenticatedUser::new(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::UserRecord;

    struct FixedProvider;

    impl IdentityProvider for FixedProvider {
        fn resolve(&self, credential: &str) -> Result<String> {
            match credential {
                "alice-token" => Ok("alice".to_string()),
                "ghost-token" => Ok("ghost".to_string()),
                _ => Err(Error::Unauthenticated),
            }
        }
    }

    async fn database_with_alice() -> Database {
        let db = Database::open(None).await.unwrap();
        db.insert_user(&UserRecord {
            id: "alice".into(),
            display_name: "Alice".into(),
            handle: "ali".into(),
            email: "alice@example.com".into(),
            phone: String::new(),
            role: "player".into(),
            bio: String::new(),
            game_systems: "[]".into(),
            created_at: 1,
            updated_at: 1,
        })
        .unwrap();
        db
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[tokio::test]
    async fn test_authenticate_valid() {
        let db = database_with_alice().await;
        let user = authenticate(&FixedProvider, &db, Some("Bearer alice-token")).unwrap();
        assert_eq!(user.user_id(), "alice");
    }

    #[tokio::test]
    async fn test_authenticate_rejects_missing_and_unknown() {
        let db = database_with_alice().await;

        let err = authenticate(&FixedProvider, &db, None).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));

        let err = authenticate(&FixedProvider, &db, Some("Bearer nope")).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_deleted_user() {
        let db = database_with_alice().await;
        let err = authenticate(&FixedProvider, &db, Some("Bearer ghost-token")).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }
}
