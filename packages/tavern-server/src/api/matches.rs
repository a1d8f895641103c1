//! Match handlers.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tavern_core::MatchStatus;

use super::{ApiJson, ApiResponse, ApiResult};
use crate::auth::Authenticated;
use crate::state::AppState;

// ── Request Types ─────────────────────────────────────────────────────────────

/// POST /matches
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeMatchRequest {
    pub target_user_id: String,
}

/// PUT /matches/:id/status
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /matches: Propose a match to another user.
pub async fn propose(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    ApiJson(req): ApiJson<ProposeMatchRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = state.matches.propose_match(&user, &req.target_user_id)?;
    Ok(ApiResponse::created(created))
}

/// GET /matches: The caller's matches with both profiles resolved.
pub async fn list(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<impl IntoResponse> {
    let matches = state.matches.list_matches(&user)?;
    Ok(ApiResponse::success(matches))
}

/// PUT /matches/:id/status: Accept or reject a match.
pub async fn update_status(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status: MatchStatus = req.status.parse()?;
    let updated = state.matches.update_status(&user, &id, status)?;
    Ok(ApiResponse::success(updated))
}
