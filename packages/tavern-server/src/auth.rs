//! Bearer authentication.
//!
//! Token issuance lives outside Tavern. The server only needs a table of
//! tokens it will accept, loaded from the seed file, and an extractor that
//! turns the `Authorization` header into an [`AuthenticatedUser`] before a
//! handler runs.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use dashmap::DashMap;
use tavern_core::identity::{self, AuthenticatedUser, IdentityProvider};

use crate::api::ApiError;
use crate::state::AppState;

// ── Token Table ───────────────────────────────────────────────────────────────

/// Fixed token → user id table.
#[derive(Clone, Default)]
pub struct StaticTokenProvider {
    tokens: Arc<DashMap<String, String>>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as a credential for `user_id`. Replaces any previous
    /// mapping for the same token.
    pub fn register(&self, token: impl Into<String>, user_id: impl Into<String>) {
        self.tokens.insert(token.into(), user_id.into());
    }

    /// Number of accepted tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityProvider for StaticTokenProvider {
    fn resolve(&self, credential: &str) -> tavern_core::Result<String> {
        self.tokens
            .get(credential)
            .map(|entry| entry.value().clone())
            .ok_or(tavern_core::Error::Unauthenticated)
    }
}

// ── Extractor ─────────────────────────────────────────────────────────────────

/// The authenticated caller of a request.
///
/// Rejects with 401 before the handler body runs.
pub struct Authenticated(pub AuthenticatedUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let user = identity::authenticate(&state.tokens, &state.database, header)?;
        Ok(Self(user))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
