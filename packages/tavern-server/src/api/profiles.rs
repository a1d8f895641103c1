//! Profile and discovery handlers.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tavern_core::profiles::{SortOrder, UserListQuery, UserSort};

use super::{ApiQuery, ApiResponse, ApiResult};
use crate::auth::Authenticated;
use crate::state::AppState;

/// GET /users/list query string
#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl ListUsersParams {
    fn into_query(self) -> tavern_core::Result<UserListQuery> {
        let sort = match self.sort.as_deref() {
            None | Some("") => UserSort::default(),
            Some(name) => UserSort::parse(name).ok_or_else(|| {
                tavern_core::Error::ValidationError(format!("cannot sort users by {}", name))
            })?,
        };

        Ok(UserListQuery {
            page: self.page,
            limit: self.limit,
            sort,
            order: self.order.as_deref().map(SortOrder::parse).unwrap_or_default(),
        })
    }
}

/// GET /users/list: One page of the user directory.
pub async fn list_users(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    ApiQuery(params): ApiQuery<ListUsersParams>,
) -> ApiResult<impl IntoResponse> {
    let query = params.into_query()?;
    let page = state.profiles.list_users(&query)?;
    Ok(ApiResponse::success(page))
}

/// GET /users/me: The caller's own profile.
pub async fn get_me(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<impl IntoResponse> {
    let profile = state.profiles.get_profile(user.user_id())?;
    Ok(ApiResponse::success(profile))
}

/// GET /users/:id: Any user's profile.
pub async fn get_user(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.profiles.get_profile(&id)?;
    Ok(ApiResponse::success(profile))
}

/// GET /profiles: Users the caller can still propose a match to.
pub async fn discover(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<impl IntoResponse> {
    let candidates = state.matches.discover_candidates(&user)?;
    tracing::debug!(
        user_id = user.user_id(),
        candidates = candidates.len(),
        "Discovery"
    );
    Ok(ApiResponse::success(candidates))
}
