//! # Messaging Module
//!
//! The message store for conversations between match participants.
//!
//! ## Delivery Model
//!
//! There is no push channel. Clients pull:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         PULL-BASED SYNC                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Alice                        Store                          Bob        │
//! │    │                            │                             │         │
//! │    │  send("Hello")             │                             │         │
//! │    │───────────────────────────►│ created_at = t1             │         │
//! │    │                            │                             │         │
//! │    │                            │  list_for_match(after: t0)  │         │
//! │    │                            │◄────────────────────────────│         │
//! │    │                            │  [Hello@t1]                 │         │
//! │    │                            │────────────────────────────►│         │
//! │    │                            │                             │         │
//! │    │                            │  mark_read()                │         │
//! │    │                            │◄────────────────────────────│         │
//! │    │                            │                             │         │
//! │    │                            │  list_for_match(after: t1)  │         │
//! │    │                            │◄────────────────────────────│         │
//! │    │                            │  []                         │         │
//! │    │                            │────────────────────────────►│         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `created_at` is assigned by the store and is strictly increasing, so
//! "after T" never skips or repeats a message no matter how the two sides
//! interleave their sends.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::AuthenticatedUser;
use crate::matches::{participant_match, Match};
use crate::storage::{Database, MessageRecord};

/// Default maximum message length, in characters
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Kind of message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    /// Content is an image reference
    Image,
    /// Generated by the system rather than typed
    System,
}

impl MessageKind {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::System => "system",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageKind::Text),
            "image" => Some(MessageKind::Image),
            "system" => Some(MessageKind::System),
            _ => None,
        }
    }
}

impl FromStr for MessageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.trim())
            .ok_or_else(|| Error::ValidationError(format!("unknown message type: {}", s)))
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub match_id: String,
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub is_read: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Message {
    /// Build a message from its stored record
    pub fn from_record(record: MessageRecord) -> Result<Self> {
        let kind = MessageKind::parse(&record.kind).ok_or_else(|| {
            Error::Internal(format!(
                "unknown message kind {:?} for message {}",
                record.kind, record.id
            ))
        })?;

        Ok(Self {
            id: record.id,
            match_id: record.match_id,
            sender_id: record.sender_id,
            content: record.content,
            kind,
            is_read: record.is_read,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Display info for a message sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    pub id: String,
    pub display_name: String,
    pub handle: String,
}

/// A message with its sender resolved
#[derive(Debug, Clone, Serialize)]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender: SenderInfo,
}

/// Message store service
pub struct MessagingService {
    database: Arc<Database>,
    max_length: usize,
}

impl MessagingService {
    /// Create a new messaging service
    pub fn new(database: Arc<Database>) -> Self {
        Self::with_max_length(database, MAX_MESSAGE_LENGTH)
    }

    /// Create a messaging service with a custom length limit
    pub fn with_max_length(database: Arc<Database>, max_length: usize) -> Self {
        Self {
            database,
            max_length,
        }
    }

    /// Send a message into a match the requester participates in.
    ///
    /// Sending does not depend on the match status.
    pub fn send(
        &self,
        requester: &AuthenticatedUser,
        match_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<MessageWithSender> {
        let found = participant_match(&self.database, requester, match_id)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(Error::ValidationError("message content is required".into()));
        }
        if content.chars().count() > self.max_length {
            return Err(Error::ValidationError(format!(
                "message content exceeds {} characters",
                self.max_length
            )));
        }

        let record = self.database.insert_message(
            &Uuid::new_v4().to_string(),
            &found.id,
            requester.user_id(),
            content,
            kind.as_str(),
        )?;

        tracing::debug!(
            match_id = found.id.as_str(),
            message_id = record.id.as_str(),
            sender = requester.user_id(),
            "Message stored"
        );

        let sender = self.sender_info(requester.user_id())?;
        Ok(MessageWithSender {
            message: Message::from_record(record)?,
            sender,
        })
    }

    /// Messages of a match in creation order.
    ///
    /// With `after`, only messages created strictly later than that
    /// timestamp are returned. Only participants may read a conversation.
    pub fn list_for_match(
        &self,
        requester: &AuthenticatedUser,
        match_id: &str,
        after: Option<i64>,
    ) -> Result<Vec<MessageWithSender>> {
        let found = participant_match(&self.database, requester, match_id)?;
        let senders = self.participant_senders(&found)?;

        self.database
            .get_messages(&found.id, after)?
            .into_iter()
            .map(|record| -> Result<MessageWithSender> {
                let sender = if record.sender_id == senders.0.id {
                    senders.0.clone()
                } else if record.sender_id == senders.1.id {
                    senders.1.clone()
                } else {
                    self.sender_info(&record.sender_id)?
                };
                Ok(MessageWithSender {
                    message: Message::from_record(record)?,
                    sender,
                })
            })
            .collect()
    }

    /// Mark every message the other participant sent in this match as read.
    ///
    /// Returns how many messages changed. Calling it again returns zero.
    pub fn mark_read(&self, requester: &AuthenticatedUser, match_id: &str) -> Result<usize> {
        let found = participant_match(&self.database, requester, match_id)?;
        let updated = self.database.mark_messages_read(
            &found.id,
            requester.user_id(),
            crate::time::now_timestamp_millis(),
        )?;

        if updated > 0 {
            tracing::debug!(
                match_id = found.id.as_str(),
                reader = requester.user_id(),
                updated = updated,
                "Messages marked read"
            );
        }

        Ok(updated)
    }

    /// Unread messages addressed to the requester across all of their matches
    pub fn unread_count(&self, requester: &AuthenticatedUser) -> Result<i64> {
        self.database.count_unread_for_user(requester.user_id())
    }

    fn participant_senders(&self, found: &Match) -> Result<(SenderInfo, SenderInfo)> {
        Ok((
            self.sender_info(&found.user_a)?,
            self.sender_info(&found.user_b)?,
        ))
    }

    fn sender_info(&self, user_id: &str) -> Result<SenderInfo> {
        let user = self.database.get_user(user_id)?.ok_or_else(|| {
            Error::Internal(format!("message references missing user {}", user_id))
        })?;

        Ok(SenderInfo {
            id: user.id,
            display_name: user.display_name,
            handle: user.handle,
        })
    }
}
