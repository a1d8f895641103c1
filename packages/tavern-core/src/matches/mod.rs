//! # Matches Module
//!
//! The match engine: proposing pairings, resolving them, and listing them.
//!
//! ## Match Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          MATCH LIFECYCLE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   Alice                                    Bob                          │
//! │     │                                       │                           │
//! │     │  propose_match(bob)                   │                           │
//! │     │──────────────┐                        │                           │
//! │     │              ▼                        │                           │
//! │     │     ┌─────────────────┐               │                           │
//! │     │     │     pending     │               │                           │
//! │     │     └────────┬────────┘               │                           │
//! │     │              │   update_status()      │                           │
//! │     │              │◄───────────────────────│  (either participant)     │
//! │     │        ┌─────┴─────┐                  │                           │
//! │     │        ▼           ▼                  │                           │
//! │     │   ┌─────────┐ ┌──────────┐            │                           │
//! │     │   │accepted │◄┤ rejected │            │                           │
//! │     │   └─────────┘►└──────────┘            │                           │
//! │     │                                       │                           │
//! │   Nothing returns to pending, and no match is ever removed.            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pair Uniqueness
//!
//! `(alice, bob)` and `(bob, alice)` are the same match. The store enforces
//! this with a unique canonical pair key, so two proposals racing in opposite
//! directions resolve to one [`Match`] and one [`Error::DuplicateMatch`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::discovery;
use crate::error::{Error, Result};
use crate::identity::AuthenticatedUser;
use crate::profiles::UserProfile;
use crate::storage::{Database, MatchRecord};

// ============================================================================
// TYPES
// ============================================================================

/// Status of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Proposed, awaiting a decision
    Pending,
    /// Both sides may chat
    Accepted,
    /// Declined
    Rejected,
}

impl MatchStatus {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Rejected => "rejected",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MatchStatus::Pending),
            "accepted" => Some(MatchStatus::Accepted),
            "rejected" => Some(MatchStatus::Rejected),
            _ => None,
        }
    }

    /// Whether a decision has been made
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchStatus::Pending)
    }
}

impl FromStr for MatchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.trim())
            .ok_or_else(|| Error::ValidationError(format!("unknown match status: {}", s)))
    }
}

/// A pairing between two distinct users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    /// Proposer
    pub user_a: String,
    /// Target
    pub user_b: String,
    pub status: MatchStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Match {
    /// Build a match from its stored record
    pub fn from_record(record: MatchRecord) -> Result<Self> {
        let status = MatchStatus::parse(&record.status).ok_or_else(|| {
            Error::Internal(format!(
                "unknown match status {:?} for match {}",
                record.status, record.id
            ))
        })?;

        Ok(Self {
            id: record.id,
            user_a: record.user_a,
            user_b: record.user_b,
            status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Whether `user_id` is one of the two participants
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The participant that is not `user_id`, if `user_id` participates
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        if self.user_a == user_id {
            Some(&self.user_b)
        } else if self.user_b == user_id {
            Some(&self.user_a)
        } else {
            None
        }
    }
}

/// A match with both participant profiles resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchWithParticipants {
    #[serde(flatten)]
    pub details: Match,
    pub user_a_profile: UserProfile,
    pub user_b_profile: UserProfile,
    /// Messages in this match not yet read by the requester
    pub unread_count: i64,
}

/// Load a match and check that `requester` takes part in it.
///
/// Missing matches are `NotFound`; outsiders get `Forbidden`.
pub(crate) fn participant_match(
    database: &Database,
    requester: &AuthenticatedUser,
    match_id: &str,
) -> Result<Match> {
    let record = database
        .get_match(match_id)?
        .ok_or_else(|| Error::NotFound(format!("match {}", match_id)))?;
    let found = Match::from_record(record)?;

    if !found.is_participant(requester.user_id()) {
        tracing::warn!(
            match_id = match_id,
            user_id = requester.user_id(),
            "Non-participant attempted to access match"
        );
        return Err(Error::Forbidden(
            "you are not a participant of this match".into(),
        ));
    }

    Ok(found)
}

fn resolve_profile(database: &Database, user_id: &str) -> Result<UserProfile> {
    let record = database.get_user(user_id)?.ok_or_else(|| {
        Error::Internal(format!("match references missing user {}", user_id))
    })?;
    UserProfile::from_record(record)
}

// ============================================================================
// SERVICE
// ============================================================================

/// Match engine service
pub struct MatchService {
    database: Arc<Database>,
}

impl MatchService {
    /// Create a new match service
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Users the requester has not paired with in any status.
    ///
    /// Ordered by registration time, ties broken by id.
    pub fn discover_candidates(&self, requester: &AuthenticatedUser) -> Result<Vec<UserProfile>> {
        let users = self
            .database
            .get_all_users()?
            .into_iter()
            .map(UserProfile::from_record)
            .collect::<Result<Vec<_>>>()?;

        let matches = self
            .database
            .get_matches_for_user(requester.user_id())?
            .into_iter()
            .map(Match::from_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(discovery::filter_candidates(
            users,
            requester.user_id(),
            &matches,
        ))
    }

    /// Propose a match from the requester to `target_user_id`.
    ///
    /// The new match is `pending` with the requester as `user_a`.
    pub fn propose_match(
        &self,
        requester: &AuthenticatedUser,
        target_user_id: &str,
    ) -> Result<Match> {
        let target = target_user_id.trim();

        if target.is_empty() {
            return Err(Error::InvalidTarget("target user id is required".into()));
        }
        if target == requester.user_id() {
            return Err(Error::InvalidTarget(
                "a user cannot match with themselves".into(),
            ));
        }
        if !self.database.user_exists(target)? {
            return Err(Error::InvalidTarget("target user does not exist".into()));
        }

        let now = crate::time::now_timestamp_millis();
        let record = MatchRecord {
            id: Uuid::new_v4().to_string(),
            user_a: requester.user_id().to_string(),
            user_b: target.to_string(),
            status: MatchStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        // The pair-key constraint settles concurrent proposals
        self.database.insert_match(&record).map_err(|e| {
            if matches!(e, Error::DuplicateMatch) {
                tracing::debug!(
                    from = requester.user_id(),
                    to = target,
                    "Rejected duplicate match proposal"
                );
            }
            e
        })?;

        tracing::info!(
            match_id = record.id.as_str(),
            from = requester.user_id(),
            to = target,
            "Match proposed"
        );

        Match::from_record(record)
    }

    /// Every match the requester participates in, oldest first
    pub fn list_matches(
        &self,
        requester: &AuthenticatedUser,
    ) -> Result<Vec<MatchWithParticipants>> {
        let records = self.database.get_matches_for_user(requester.user_id())?;
        let mut result = Vec::with_capacity(records.len());

        for record in records {
            let details = Match::from_record(record)?;
            let user_a_profile = resolve_profile(&self.database, &details.user_a)?;
            let user_b_profile = resolve_profile(&self.database, &details.user_b)?;
            let unread_count = self
                .database
                .count_unread_in_match(&details.id, requester.user_id())?;

            result.push(MatchWithParticipants {
                details,
                user_a_profile,
                user_b_profile,
                unread_count,
            });
        }

        Ok(result)
    }

    /// Get a single match the requester participates in
    pub fn get_match(&self, requester: &AuthenticatedUser, match_id: &str) -> Result<Match> {
        participant_match(&self.database, requester, match_id)
    }

    /// Set a match's status.
    ///
    /// Either participant may accept or reject from any state. Moving a match
    /// back to `pending` is refused.
    pub fn update_status(
        &self,
        requester: &AuthenticatedUser,
        match_id: &str,
        new_status: MatchStatus,
    ) -> Result<Match> {
        let current = participant_match(&self.database, requester, match_id)?;

        if !new_status.is_terminal() {
            return Err(Error::ValidationError(
                "a match cannot be moved back to pending".into(),
            ));
        }

        let updated_at = crate::time::next_monotonic_millis(current.updated_at);
        let record = self
            .database
            .update_match_status(match_id, new_status.as_str(), updated_at)?
            .ok_or_else(|| Error::NotFound(format!("match {}", match_id)))?;

        tracing::info!(
            match_id = match_id,
            user_id = requester.user_id(),
            from = current.status.as_str(),
            to = new_status.as_str(),
            "Match status updated"
        );

        Match::from_record(record)
    }
}

// ============================================================================
// TESTS
// ============================================================================
