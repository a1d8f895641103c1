//! HTTP API.
//!
//! Every route except the operational ones (`/health`, `/info`, `/stats`)
//! authenticates through the [`Authenticated`](crate::auth::Authenticated)
//! extractor, then hands the caller to exactly one core operation.
//!
//! Successful responses are `{ "ok": true, "data": ... }`. Failures are
//! `{ "ok": false, "error": <message>, "code": <code> }` with a status
//! derived from the core error kind.

mod matches;
mod messages;
mod profiles;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request, State,
    },
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

// ── Response Types ────────────────────────────────────────────────────────────

/// Generic success response.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self { ok: true, data })
    }

    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::success(data))
    }
}

/// A core error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub tavern_core::Error);

impl From<tavern_core::Error> for ApiError {
    fn from(err: tavern_core::Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        use tavern_core::Error;

        match &self.0 {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateMatch => StatusCode::CONFLICT,
            Error::InvalidTarget(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ValidationError(_) => StatusCode::BAD_REQUEST,
            Error::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self.0 {
            tavern_core::Error::Internal(detail) => {
                tracing::error!(detail = detail.as_str(), "Internal error");
                "Internal server error".to_string()
            }
            other => {
                if status.is_server_error() {
                    tracing::warn!(kind = other.kind(), "Request failed");
                } else {
                    tracing::debug!(kind = other.kind(), error = %other, "Request rejected");
                }
                other.to_string()
            }
        };

        let body = Json(json!({
            "ok": false,
            "error": message,
            "code": self.0.code(),
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(tavern_core::Error::ValidationError(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(tavern_core::Error::ValidationError(rejection.body_text()))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ── Extractors ────────────────────────────────────────────────────────────────

/// JSON request body. A body that does not parse is a 400 in the usual
/// error envelope.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Query string parameters, rejected the same way as [`ApiJson`].
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/stats", get(stats_handler))
        // Profiles
        .route("/users/list", get(profiles::list_users))
        .route("/users/me", get(profiles::get_me))
        .route("/users/:id", get(profiles::get_user))
        .route("/profiles", get(profiles::discover))
        // Matches
        .route("/matches", post(matches::propose).get(matches::list))
        .route("/matches/:id/status", put(matches::update_status))
        // Messages
        .route("/messages", post(messages::send))
        .route("/messages/:match_id", get(messages::list))
        .route("/messages/:match_id/read", post(messages::mark_read))
        .route("/unread/count", get(messages::unread_count))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Operational Handlers ──────────────────────────────────────────────────────

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "tavern-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Server info endpoint, including the limits clients should respect.
async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "tavern-server",
        "version": env!("CARGO_PKG_VERSION"),
        "coreVersion": tavern_core::VERSION,
        "defaultPageSize": state.config.default_page_size,
        "maxPageSize": state.config.max_page_size,
        "maxMessageLength": state.config.max_message_length,
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

/// Statistics endpoint.
async fn stats_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(json!({
        "users": state.database.count_users()?,
        "matches": state.database.count_matches()?,
        "messages": state.database.count_messages()?,
        "tokens": state.tokens.len(),
    })))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::StaticTokenProvider;
    use crate::seed::{self, SeedFile};
    use crate::state::ServerConfig;
    use tavern_core::Database;

    const SEED: &str = r#"{
        "users": [
            { "token": "t-alice", "id": "alice", "displayName": "Alice", "handle": "ali", "email": "alice@example.com" },
            { "token": "t-bob",   "id": "bob",   "displayName": "Bob",   "handle": "bobby", "email": "bob@example.com", "role": "gameMaster" },
            { "token": "t-carol", "id": "carol", "displayName": "Carol", "handle": "cc", "email": "carol@example.com" }
        ]
    }"#;

    async fn app() -> Router {
        let database = Database::open(None).await.unwrap();
        let state = AppState::new(ServerConfig::default(), database, StaticTokenProvider::new());
        let seed: SeedFile = serde_json::from_str(SEED).unwrap();
        seed::apply(seed, &state.profiles, &state.tokens).unwrap();
        router(state)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[test]
    fn test_error_status_mapping() {
        use tavern_core::Error;

        let cases = [
            (Error::Unauthenticated, StatusCode::UNAUTHORIZED),
            (Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::DuplicateMatch, StatusCode::CONFLICT),
            (Error::InvalidTarget("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (Error::StorageError("disk".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_storage_error_body_hides_detail() {
        let response =
            ApiError(tavern_core::Error::StorageError("disk I/O error at page 7".into()))
                .into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], 500);
        assert!(!body["error"].as_str().unwrap().contains("page 7"));
    }

    #[tokio::test]
    async fn test_operational_endpoints_are_public() {
        let app = app().await;

        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = call(&app, Method::GET, "/info", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["maxMessageLength"], 4000);

        let (status, body) = call(&app, Method::GET, "/stats", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"], 3);
        assert_eq!(body["matches"], 0);
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_is_401() {
        let app = app().await;

        let (status, body) = call(&app, Method::GET, "/profiles", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], 100);

        let (status, _) = call(&app, Method::GET, "/matches", Some("forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_routes() {
        let app = app().await;

        let (status, body) = call(&app, Method::GET, "/users/me", Some("t-bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["handle"], "bobby");
        assert_eq!(body["data"]["role"], "gameMaster");
        assert!(body["data"].get("password").is_none());

        let (status, _) = call(&app, Method::GET, "/users/nobody", Some("t-bob"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            Method::GET,
            "/users/list?page=1&limit=2&sort=displayName&order=desc",
            Some("t-alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["users"][0]["displayName"], "Carol");
        assert_eq!(body["data"]["pagination"]["totalPages"], 2);
        assert_eq!(body["data"]["pagination"]["totalUsers"], 3);

        let (status, _) = call(
            &app,
            Method::GET,
            "/users/list?sort=password",
            Some("t-alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_match_and_chat_flow() {
        let app = app().await;

        // Alice proposes to Bob
        let (status, body) = call(
            &app,
            Method::POST,
            "/matches",
            Some("t-alice"),
            Some(json!({ "targetUserId": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["userA"], "alice");
        let match_id = body["data"]["id"].as_str().unwrap().to_string();

        // Bob proposing back is a duplicate
        let (status, body) = call(
            &app,
            Method::POST,
            "/matches",
            Some("t-bob"),
            Some(json!({ "targetUserId": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 300);

        // Carol cannot decide for them
        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/matches/{}/status", match_id),
            Some("t-carol"),
            Some(json!({ "status": "accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Bob accepts
        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/matches/{}/status", match_id),
            Some("t-bob"),
            Some(json!({ "status": "accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "accepted");

        // Alice says hello
        let (status, body) = call(
            &app,
            Method::POST,
            "/messages",
            Some("t-alice"),
            Some(json!({ "matchId": match_id, "content": "Hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["isRead"], false);
        assert_eq!(body["data"]["kind"], "text");
        assert_eq!(body["data"]["sender"]["displayName"], "Alice");
        let created_at = body["data"]["createdAt"].as_i64().unwrap();

        let (_, body) = call(&app, Method::GET, "/unread/count", Some("t-bob"), None).await;
        assert_eq!(body["data"]["count"], 1);

        let (_, body) = call(&app, Method::GET, "/matches", Some("t-bob"), None).await;
        assert_eq!(body["data"][0]["unreadCount"], 1);
        assert_eq!(body["data"][0]["userAProfile"]["displayName"], "Alice");

        // Bob reads, twice
        let uri = format!("/messages/{}/read", match_id);
        let (status, body) = call(&app, Method::POST, &uri, Some("t-bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["updated"], 1);
        let (status, body) = call(&app, Method::POST, &uri, Some("t-bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["updated"], 0);

        let (_, body) = call(
            &app,
            Method::GET,
            &format!("/messages/{}", match_id),
            Some("t-alice"),
            None,
        )
        .await;
        assert_eq!(body["data"][0]["content"], "Hello");
        assert_eq!(body["data"][0]["isRead"], true);

        // Nothing newer than the last message
        let (_, body) = call(
            &app,
            Method::GET,
            &format!("/messages/{}?after={}", match_id, created_at),
            Some("t-bob"),
            None,
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        // Outsiders cannot read the conversation
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/messages/{}", match_id),
            Some("t-carol"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_discovery_after_rejection() {
        let app = app().await;

        let (_, body) = call(
            &app,
            Method::POST,
            "/matches",
            Some("t-alice"),
            Some(json!({ "targetUserId": "bob" })),
        )
        .await;
        let match_id = body["data"]["id"].as_str().unwrap().to_string();

        call(
            &app,
            Method::PUT,
            &format!("/matches/{}/status", match_id),
            Some("t-bob"),
            Some(json!({ "status": "rejected" })),
        )
        .await;

        let (status, body) = call(&app, Method::GET, "/profiles", Some("t-alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["carol"]);
    }

    #[tokio::test]
    async fn test_bad_inputs() {
        let app = app().await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/matches",
            Some("t-alice"),
            Some(json!({ "targetUserId": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, body) = call(
            &app,
            Method::POST,
            "/matches",
            Some("t-alice"),
            Some(json!({ "targetUserId": "bob" })),
        )
        .await;
        let match_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/matches/{}/status", match_id),
            Some("t-bob"),
            Some(json!({ "status": "maybe" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::POST,
            "/messages",
            Some("t-alice"),
            Some(json!({ "matchId": match_id, "content": "hi", "messageType": "video" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::POST,
            "/messages",
            Some("t-alice"),
            Some(json!({ "matchId": match_id, "content": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::POST,
            "/messages",
            Some("t-alice"),
            Some(json!({ "matchId": "missing", "content": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_requests_use_error_envelope() {
        let app = app().await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/messages",
            Some("t-alice"),
            Some(json!({ "matchId": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], 400);
        assert!(body["error"].as_str().unwrap().contains("content"));

        let (status, body) =
            call(&app, Method::GET, "/messages/x?after=abc", Some("t-alice"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], 400);

        let (status, body) = call(
            &app,
            Method::PUT,
            "/matches/x/status",
            Some("t-alice"),
            Some(json!({ "state": "accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);

        let (status, body) =
            call(&app, Method::GET, "/users/list?page=first", Some("t-alice"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }
}
