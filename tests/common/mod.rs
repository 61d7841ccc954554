//! Test helpers for store integration tests.
//!
//! Provides an in-process fake of the shop API (axum on an ephemeral port)
//! that records how often each route is hit.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use cellar::{ApiClient, BoardStore, CredentialMode, MemoryStorage, SessionStorage, SessionStore};

/// Login id accepted by the fake backend.
pub const LOGIN_ID: &str = "a@b.com";
/// Password accepted by the fake backend.
pub const PASSWORD: &str = "x";
/// Access token issued on login.
pub const ACCESS_TOKEN: &str = "token-alice";
/// Refresh token issued on login.
pub const REFRESH_TOKEN: &str = "refresh-alice";
/// Session cookie issued on login.
pub const SESSION_COOKIE: &str = "SESSION=session-alice";

/// How `GET /api/posts` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// A bare JSON array.
    Array,
    /// `{"data": [..]}`.
    DataEnvelope,
    /// `{"data": {"content": [..]}}`.
    PageEnvelope,
    /// A JSON object that holds no list.
    NotAList,
    /// 500 Internal Server Error.
    Fail,
}

/// Mutable state of the fake backend.
pub struct BackendData {
    pub posts: Vec<Value>,
    pub next_id: i64,
    pub hits: HashMap<String, usize>,
    pub list_mode: ListMode,
    /// Profile returned by a successful login.
    pub login_profile: Value,
    /// Whether login also issues the session cookie.
    pub login_sets_cookie: bool,
    /// Status and body returned by the register route.
    pub register_response: (StatusCode, Value),
    /// Body of a write error forced on every post write, if any.
    pub write_failure: Option<(StatusCode, String)>,
    pub last_login_body: Option<Value>,
    pub last_register_body: Option<Value>,
    pub last_write_body: Option<Value>,
    /// `Authorization` header of the last request that needed a caller.
    pub last_authorization: Option<String>,
    /// Accepted bearer tokens, by username.
    pub tokens: HashMap<String, String>,
    /// When set, the refresh route answers only after this is notified.
    pub refresh_gate: Option<Arc<Notify>>,
}

impl Default for BackendData {
    fn default() -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(ACCESS_TOKEN.to_string(), "alice".to_string());
        Self {
            posts: Vec::new(),
            next_id: 1,
            hits: HashMap::new(),
            list_mode: ListMode::Array,
            login_profile: json!({
                "username": "alice",
                "email": LOGIN_ID,
                "accessToken": ACCESS_TOKEN,
                "refreshToken": REFRESH_TOKEN
            }),
            login_sets_cookie: true,
            register_response: (StatusCode::CREATED, json!({"message": "created"})),
            write_failure: None,
            last_login_body: None,
            last_register_body: None,
            last_write_body: None,
            last_authorization: None,
            tokens,
            refresh_gate: None,
        }
    }
}

/// Shared handle to the fake backend state.
#[derive(Clone, Default)]
pub struct Backend {
    data: Arc<Mutex<BackendData>>,
}

impl Backend {
    /// Lock the backend state.
    pub fn data(&self) -> MutexGuard<'_, BackendData> {
        self.data.lock().unwrap()
    }

    fn hit(&self, route: &str) {
        *self.data().hits.entry(route.to_string()).or_default() += 1;
    }

    /// Number of requests a route received, keyed as `"METHOD /path"`.
    pub fn hits(&self, route: &str) -> usize {
        self.data().hits.get(route).copied().unwrap_or(0)
    }

    /// Number of requests received on all routes.
    pub fn total_hits(&self) -> usize {
        self.data().hits.values().sum()
    }

    /// Add a post directly to the backend.
    pub fn seed_post(&self, title: &str, author: &str) -> i64 {
        let mut data = self.data();
        let id = data.next_id;
        data.next_id += 1;
        data.posts.push(json!({
            "id": id,
            "title": title,
            "content": format!("{title} content"),
            "authorUsername": author,
            "createdAt": "2024-05-01T10:00:00",
            "views": 0
        }));
        id
    }

    /// Ids of the posts currently on the backend.
    pub fn post_ids(&self) -> Vec<i64> {
        self.data()
            .posts
            .iter()
            .filter_map(|p| p["id"].as_i64())
            .collect()
    }

    /// Resolve the caller from the bearer token or the session cookie.
    fn caller(&self, headers: &HeaderMap) -> Option<String> {
        let mut data = self.data();
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        data.last_authorization = authorization.clone();
        let bearer = authorization
            .as_deref()
            .and_then(|v| v.strip_prefix("Bearer "));
        if let Some(user) = bearer.and_then(|t| data.tokens.get(t)) {
            return Some(user.clone());
        }
        let has_cookie = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.split("; ").any(|c| c == SESSION_COOKIE));
        has_cookie.then(|| "alice".to_string())
    }
}

/// A running fake backend.
pub struct TestServer {
    pub addr: SocketAddr,
    pub backend: Backend,
}

impl TestServer {
    /// Start a fake backend on an ephemeral port.
    pub async fn start() -> Self {
        let backend = Backend::default();
        let app = create_router(backend.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake backend failed");
        });
        Self { addr, backend }
    }

    /// Base URL of the fake backend.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Create a client for the fake backend.
    pub fn client(&self, mode: CredentialMode) -> Arc<ApiClient> {
        Arc::new(
            ApiClient::with_base_url(&self.base_url(), mode).expect("Failed to create client"),
        )
    }

    /// Create a session store and board store sharing one client.
    pub fn stores_with(
        &self,
        mode: CredentialMode,
        storage: Arc<dyn SessionStorage>,
    ) -> (Arc<SessionStore>, BoardStore) {
        let client = self.client(mode);
        let session = Arc::new(SessionStore::new(client.clone(), storage));
        let board = BoardStore::new(client, session.clone());
        (session, board)
    }

    /// Create stores with in-memory storage and credentials included.
    pub fn stores(&self) -> (Arc<SessionStore>, BoardStore) {
        self.stores_with(CredentialMode::Include, Arc::new(MemoryStorage::new()))
    }
}

/// Base URL where nothing listens.
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read local addr");
    drop(listener);
    format!("http://{addr}")
}

fn create_router(backend: Backend) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/find-id", post(find_id))
        .route("/api/auth/password/reset", patch(reset_password))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/user/password/change", patch(change_password))
        .route("/api/user/withdrawal", delete(withdraw))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/:id", put(update_post).delete(delete_post))
        .with_state(backend)
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

// ============================================================================
// Auth Routes
// ============================================================================

async fn login(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit("POST /api/auth/login");
    let (profile, sets_cookie) = {
        let mut data = backend.data();
        data.last_login_body = Some(body.clone());
        (data.login_profile.clone(), data.login_sets_cookie)
    };
    if body["emailOrIdOrPhone"] != LOGIN_ID || body["password"] != PASSWORD {
        return message(StatusCode::UNAUTHORIZED, "Invalid credentials.");
    }
    if !sets_cookie {
        return Json(profile).into_response();
    }
    (
        StatusCode::OK,
        [(SET_COOKIE, format!("{SESSION_COOKIE}; Path=/; HttpOnly"))],
        Json(profile),
    )
        .into_response()
}

async fn register(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit("POST /api/auth/register");
    let (status, response) = {
        let mut data = backend.data();
        data.last_register_body = Some(body);
        data.register_response.clone()
    };
    match response {
        Value::String(text) => (status, text).into_response(),
        other => (status, Json(other)).into_response(),
    }
}

async fn find_id(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit("POST /api/auth/find-id");
    if body["username"] == "Kim" && body["phoneNumber"] == "010-1234-5678" {
        Json(json!({
            "maskedUserId": "ki***",
            "email": "k***@email.com",
            "message": "Account found."
        }))
        .into_response()
    } else {
        message(StatusCode::NOT_FOUND, "No matching account.")
    }
}

async fn reset_password(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit("PATCH /api/auth/password/reset");
    if body["userId"] == "kim01" && body["phoneNumber"] == "010-1234-5678" {
        message(StatusCode::OK, "Password has been reset.")
    } else {
        message(StatusCode::BAD_REQUEST, "User ID and phone number do not match.")
    }
}

async fn refresh(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.hit("POST /api/auth/refresh");
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer != Some(REFRESH_TOKEN) {
        return message(StatusCode::UNAUTHORIZED, "Invalid refresh token.");
    }
    let gate = backend.data().refresh_gate.clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
    let mut data = backend.data();
    data.tokens.remove(ACCESS_TOKEN);
    data.tokens
        .insert("token-alice-2".to_string(), "alice".to_string());
    Json(json!({ "accessToken": "token-alice-2" })).into_response()
}

async fn change_password(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.hit("PATCH /api/user/password/change");
    if backend.caller(&headers).is_none() {
        return message(StatusCode::FORBIDDEN, "Login required.");
    }
    if body["oldPassword"] != PASSWORD {
        return message(StatusCode::BAD_REQUEST, "Current password is incorrect.");
    }
    (StatusCode::OK, "Password changed.").into_response()
}

async fn withdraw(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.hit("DELETE /api/user/withdrawal");
    if backend.caller(&headers).is_none() {
        return message(StatusCode::FORBIDDEN, "Login required.");
    }
    if body["currentPassword"] != PASSWORD {
        return message(StatusCode::BAD_REQUEST, "Current password is incorrect.");
    }
    message(StatusCode::OK, "Account deleted.")
}

// ============================================================================
// Post Routes
// ============================================================================

async fn list_posts(State(backend): State<Backend>) -> Response {
    backend.hit("GET /api/posts");
    let data = backend.data();
    let posts = Value::Array(data.posts.clone());
    match data.list_mode {
        ListMode::Array => Json(posts).into_response(),
        ListMode::DataEnvelope => Json(json!({ "data": posts })).into_response(),
        ListMode::PageEnvelope => {
            let items: Vec<Value> = data.posts.iter().map(list_item).collect();
            Json(json!({ "data": { "content": items, "totalPages": 1 } })).into_response()
        }
        ListMode::NotAList => Json(json!({ "message": "ok" })).into_response(),
        ListMode::Fail => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Paged list item: `postId` instead of `id`, no content or views.
fn list_item(post: &Value) -> Value {
    json!({
        "postId": post["id"],
        "title": post["title"],
        "authorUsername": post["authorUsername"],
        "createdAt": post["createdAt"]
    })
}

fn forced_failure(backend: &Backend) -> Option<Response> {
    backend
        .data()
        .write_failure
        .clone()
        .map(|(status, body)| (status, body).into_response())
}

async fn create_post(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.hit("POST /api/posts");
    let Some(user) = backend.caller(&headers) else {
        return StatusCode::FORBIDDEN.into_response();
    };
    if let Some(response) = forced_failure(&backend) {
        return response;
    }

    let mut data = backend.data();
    data.last_write_body = Some(body.clone());
    let id = data.next_id;
    data.next_id += 1;
    let post = json!({
        "id": id,
        "title": body["title"],
        "content": body["content"],
        "authorUsername": user,
        "createdAt": "2024-05-02T09:30:00",
        "views": 0
    });
    data.posts.push(post.clone());
    (StatusCode::CREATED, Json(post)).into_response()
}

/// Check that `user` may modify post `id`. Returns the post index.
fn owned_post(backend: &Backend, id: i64, user: &str) -> Result<usize, Response> {
    let data = backend.data();
    let index = data
        .posts
        .iter()
        .position(|p| p["id"] == id)
        .ok_or_else(|| message(StatusCode::NOT_FOUND, "Post not found."))?;
    if data.posts[index]["authorUsername"] != user {
        return Err(message(StatusCode::FORBIDDEN, "Not your post."));
    }
    Ok(index)
}

async fn update_post(
    State(backend): State<Backend>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.hit("PUT /api/posts/:id");
    let Some(user) = backend.caller(&headers) else {
        return StatusCode::FORBIDDEN.into_response();
    };
    if let Some(response) = forced_failure(&backend) {
        return response;
    }
    let index = match owned_post(&backend, id, &user) {
        Ok(index) => index,
        Err(response) => return response,
    };

    let mut data = backend.data();
    data.last_write_body = Some(body.clone());
    let post = &mut data.posts[index];
    post["title"] = body["title"].clone();
    post["content"] = body["content"].clone();
    Json(post.clone()).into_response()
}

async fn delete_post(
    State(backend): State<Backend>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    backend.hit("DELETE /api/posts/:id");
    let Some(user) = backend.caller(&headers) else {
        return StatusCode::FORBIDDEN.into_response();
    };
    if let Some(response) = forced_failure(&backend) {
        return response;
    }
    let index = match owned_post(&backend, id, &user) {
        Ok(index) => index,
        Err(response) => return response,
    };

    backend.data().posts.remove(index);
    StatusCode::NO_CONTENT.into_response()
}
