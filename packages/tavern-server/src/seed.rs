//! Seed file loading.
//!
//! The seed file stands in for the external account service: it lists the
//! users that exist and the bearer token each one authenticates with.
//!
//! ```json
//! { "users": [ { "token": "t-alice", "id": "alice", "displayName": "Alice",
//!                "handle": "ali", "email": "alice@example.com",
//!                "role": "gameMaster", "gameSystems": ["D&D 5e"] } ] }
//! ```
//!
//! Loading is repeatable: users already in the database are left untouched
//! and only their token is registered again.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tavern_core::{NewUser, ProfileService};

use crate::auth::StaticTokenProvider;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUser {
    /// Bearer token this user authenticates with
    pub token: String,
    #[serde(flatten)]
    pub profile: NewUser,
}

/// Outcome of loading a seed file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: usize,
    pub existing: usize,
}

/// Read and apply a seed file from disk.
pub fn load_file(
    path: impl AsRef<Path>,
    profiles: &ProfileService,
    tokens: &StaticTokenProvider,
) -> anyhow::Result<SeedSummary> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let seed: SeedFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse seed file {}", path.display()))?;

    apply(seed, profiles, tokens)
}

/// Insert missing users and register every token.
pub fn apply(
    seed: SeedFile,
    profiles: &ProfileService,
    tokens: &StaticTokenProvider,
) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for entry in seed.users {
        let token = entry.token.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("seed user {:?} has an empty token", entry.profile.email);
        }

        let seed_id = entry
            .profile
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let existing_id = match seed_id {
            Some(id) if profiles.exists(id)? => Some(id.to_string()),
            Some(_) => None,
            None => profiles
                .find_by_email(&entry.profile.email)?
                .map(|profile| profile.id),
        };

        let user_id = match existing_id {
            Some(id) => {
                summary.existing += 1;
                id
            }
            None => {
                let email = entry.profile.email.clone();
                let profile = profiles
                    .register(entry.profile)
                    .with_context(|| format!("failed to seed user {}", email))?;
                summary.created += 1;
                profile.id
            }
        };

        tokens.register(token, user_id);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tavern_core::identity::IdentityProvider;
    use tavern_core::{Database, Role};

    const SEED: &str = r#"{
        "users": [
            { "token": "t-alice", "id": "alice", "displayName": "Alice", "handle": "ali",
              "email": "Alice@Example.com", "role": "gameMaster", "gameSystems": ["D&D 5e"] },
            { "token": "t-bob", "displayName": "Bob", "handle": "bob",
              "email": "bob@example.com" }
        ]
    }"#;

    async fn profiles() -> ProfileService {
        ProfileService::new(Arc::new(Database::open(None).await.unwrap()))
    }

    #[tokio::test]
    async fn test_apply_seed() {
        let profiles = profiles().await;
        let tokens = StaticTokenProvider::new();

        let seed: SeedFile = serde_json::from_str(SEED).unwrap();
        let summary = apply(seed, &profiles, &tokens).unwrap();
        assert_eq!(summary, SeedSummary { created: 2, existing: 0 });

        let alice = profiles.get_profile("alice").unwrap();
        assert_eq!(alice.role, Role::GameMaster);
        assert_eq!(alice.email, "alice@example.com");
        assert_eq!(tokens.resolve("t-alice").unwrap(), "alice");

        let bob_id = tokens.resolve("t-bob").unwrap();
        assert_eq!(profiles.get_profile(&bob_id).unwrap().handle, "bob");
    }

    #[tokio::test]
    async fn test_reapplying_seed_keeps_users() {
        let profiles = profiles().await;
        let tokens = StaticTokenProvider::new();

        apply(serde_json::from_str(SEED).unwrap(), &profiles, &tokens).unwrap();
        let bob_id = tokens.resolve("t-bob").unwrap();

        let fresh_tokens = StaticTokenProvider::new();
        let summary = apply(serde_json::from_str(SEED).unwrap(), &profiles, &fresh_tokens).unwrap();
        assert_eq!(summary, SeedSummary { created: 0, existing: 2 });
        assert_eq!(fresh_tokens.resolve("t-bob").unwrap(), bob_id);
    }

    #[tokio::test]
    async fn test_reapplying_seed_with_padded_id() {
        let profiles = profiles().await;
        let tokens = StaticTokenProvider::new();

        let padded = r#"{ "users": [
            { "token": "t-dana", "id": "  dana ", "displayName": "Dana", "handle": "dee",
              "email": "dana@example.com" }
        ] }"#;

        let summary = apply(serde_json::from_str(padded).unwrap(), &profiles, &tokens).unwrap();
        assert_eq!(summary, SeedSummary { created: 1, existing: 0 });
        assert_eq!(tokens.resolve("t-dana").unwrap(), "dana");

        let summary = apply(serde_json::from_str(padded).unwrap(), &profiles, &tokens).unwrap();
        assert_eq!(summary, SeedSummary { created: 0, existing: 1 });
        assert_eq!(tokens.resolve("t-dana").unwrap(), "dana");
    }

    #[tokio::test]
    async fn test_load_file() {
        let profiles = profiles().await;
        let tokens = StaticTokenProvider::new();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, SEED).unwrap();

        let summary = load_file(&path, &profiles, &tokens).unwrap();
        assert_eq!(summary.created, 2);

        assert!(load_file(dir.path().join("missing.json"), &profiles, &tokens).is_err());
    }

    #[tokio::test]
    async fn test_invalid_seed_user_is_an_error() {
        let profiles = profiles().await;
        let tokens = StaticTokenProvider::new();

        let seed: SeedFile = serde_json::from_str(
            r#"{ "users": [
                { "token": "t", "displayName": "", "handle": "x", "email": "x@example.com" }
            ] }"#,
        )
        .unwrap();
        assert!(apply(seed, &profiles, &tokens).is_err());
    }
}
