//! Message handlers.
//!
//! Clients poll `GET /messages/:match_id?after=<createdAt>` with the
//! `createdAt` of the newest message they hold.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tavern_core::MessageKind;

use super::{ApiJson, ApiQuery, ApiResponse, ApiResult};
use crate::auth::Authenticated;
use crate::state::AppState;

// ── Request Types ─────────────────────────────────────────────────────────────

/// POST /messages
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub match_id: String,
    pub content: String,
    #[serde(default, alias = "kind")]
    pub message_type: Option<String>,
}

/// GET /messages/:match_id query string
#[derive(Debug, Deserialize)]
pub struct ListMessagesParams {
    pub after: Option<i64>,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /messages: Send a message into a match.
pub async fn send(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let kind = match req.message_type.as_deref() {
        Some(raw) => raw.parse::<MessageKind>()?,
        None => MessageKind::default(),
    };

    let sent = state
        .messaging
        .send(&user, &req.match_id, &req.content, kind)?;
    Ok(ApiResponse::created(sent))
}

/// GET /messages/:match_id: Messages in creation order, optionally only
/// those newer than `after`.
pub async fn list(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(match_id): Path<String>,
    ApiQuery(params): ApiQuery<ListMessagesParams>,
) -> ApiResult<impl IntoResponse> {
    let messages = state
        .messaging
        .list_for_match(&user, &match_id, params.after)?;
    Ok(ApiResponse::success(messages))
}

/// POST /messages/:match_id/read: Mark the other side's messages as read.
pub async fn mark_read(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(match_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.messaging.mark_read(&user, &match_id)?;
    Ok(ApiResponse::success(json!({ "updated": updated })))
}

/// GET /unread/count: Unread messages across the caller's matches.
pub async fn unread_count(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<impl IntoResponse> {
    let count = state.messaging.unread_count(&user)?;
    Ok(ApiResponse::success(json!({ "count": count })))
}
