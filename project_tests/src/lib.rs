//! # Mock Leaderboard Backend
//!
//! An in-process stand-in for the leaderboard backend, served by `axum` on an
//! ephemeral local port. Integration tests point a real `ApiClient` at it and
//! script its replies.
//!
//! ## Routes:
//! - `GET /auth/refresh`: exchanges the refresh token per [`RefreshMode`].
//! - `GET /api/v1/auth/verify`: resolves a bearer token to a user.
//! - `ANY /echo`: authenticated; echoes method, headers, query and body.
//! - `GET /errors/{kind}`: canned failures (`message`, `detail`, `plain`).
//! - `GET /profile?user=`: authenticated; scripted per handle.
//! - `GET /leaderboard`, `/registrations`, `/projects`, `/issues/{repo_id}`,
//!   `/updates/latest`: scripted [`Reply`] values.
//! - `GET /updates/live`: raw `text/event-stream`, fed by [`MockBackend::send_live`].
//!
//! Every request records its path and `Authorization` header.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use board_common::session::{Identity, MemorySessionStore, Session};
use board_common::{ApiClient, ClientConfig, SessionService};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Token the backend accepts on authenticated routes until a refresh changes it.
pub const INITIAL_ACCESS_TOKEN: &str = "a1";
/// Refresh token the backend expects on `/auth/refresh`.
pub const REFRESH_TOKEN: &str = "r1";

/// How `/auth/refresh` answers.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshMode {
    /// Issue this token and start accepting it.
    Issue(String),
    /// Issue this token but keep rejecting it.
    IssueRejected(String),
    /// Fail with this status.
    Reject(u16),
    /// Answer 200 without an `accessKey`.
    MissingKey,
}

/// A scripted reply for a data route.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    Fail(u16, Value),
    /// 200 with a body that is not JSON.
    Garbage,
}

impl Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Json(body) => (StatusCode::OK, Json(body)).into_response(),
            Self::Fail(code, body) => (status(code), Json(body)).into_response(),
            Self::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
        }
    }
}

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub path: String,
    pub authorization: Option<String>,
}

struct MockState {
    accepted_token: Mutex<String>,
    refresh_mode: Mutex<RefreshMode>,
    users: Mutex<HashMap<String, Value>>,
    leaderboard: Mutex<Reply>,
    projects: Mutex<Reply>,
    issues: Mutex<HashMap<String, Value>>,
    profiles: Mutex<HashMap<String, Value>>,
    registrations: Mutex<Reply>,
    recent: Mutex<Reply>,
    live: Mutex<broadcast::Sender<String>>,
    live_status: Mutex<u16>,
    seen: Mutex<Vec<Seen>>,
    refresh_calls: AtomicUsize,
    hits: Mutex<HashMap<&'static str, usize>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn bearer_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

impl MockState {
    fn record(&self, path: &str, headers: &HeaderMap) {
        lock(&self.seen).push(Seen {
            path: path.to_string(),
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });
    }

    fn hit(&self, route: &'static str) {
        *lock(&self.hits).entry(route).or_default() += 1;
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        bearer_of(headers).is_some_and(|t| t == *lock(&self.accepted_token))
    }
}

/// A running mock backend. The server task stops on drop.
pub struct MockBackend {
    state: Arc<MockState>,
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Bind `127.0.0.1:0` and serve. Starts with empty data and
    /// [`RefreshMode::Issue`]`("a2")`.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        Self::serve(listener)
    }

    /// Serve on an already bound listener.
    pub fn serve(listener: TcpListener) -> Self {
        let addr = listener.local_addr().expect("mock backend address");
        let (live_tx, _) = broadcast::channel(64);
        let state = Arc::new(MockState {
            accepted_token: Mutex::new(INITIAL_ACCESS_TOKEN.to_string()),
            refresh_mode: Mutex::new(RefreshMode::Issue("a2".to_string())),
            users: Mutex::new(HashMap::new()),
            leaderboard: Mutex::new(Reply::Json(json!({"leaderboards": {"fullstack": [], "aiml": []}}))),
            projects: Mutex::new(Reply::Json(json!({"projects": []}))),
            issues: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            registrations: Mutex::new(Reply::Json(json!({"profiles": []}))),
            recent: Mutex::new(Reply::Json(json!({"updates": []}))),
            live: Mutex::new(live_tx),
            live_status: Mutex::new(200),
            seen: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            hits: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/auth/refresh", get(refresh))
            .route("/api/v1/auth/verify", get(verify))
            .route("/echo", any(echo))
            .route("/errors/{kind}", get(errors))
            .route("/leaderboard", get(leaderboard))
            .route("/projects", get(projects))
            .route("/issues/{repo_id}", get(issues))
            .route("/profile", get(profile))
            .route("/registrations", get(registrations))
            .route("/updates/latest", get(recent))
            .route("/updates/live", get(live))
            .with_state(Arc::clone(&state));

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock backend stopped: {e}");
            }
        });

        Self {
            state,
            addr,
            server,
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client configuration aimed at this backend with short timeouts.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::for_backend(self.url()).expect("mock backend url");
        config.request_timeout_secs = 5;
        config
    }

    pub fn accept_token(&self, token: &str) {
        *lock(&self.state.accepted_token) = token.to_string();
    }

    pub fn set_refresh(&self, mode: RefreshMode) {
        *lock(&self.state.refresh_mode) = mode;
    }

    /// Make `/api/v1/auth/verify` resolve `token` to `user`.
    pub fn add_user(&self, token: &str, user: Value) {
        lock(&self.state.users).insert(token.to_string(), user);
    }

    pub fn set_leaderboard(&self, reply: Reply) {
        *lock(&self.state.leaderboard) = reply;
    }

    pub fn set_projects(&self, reply: Reply) {
        *lock(&self.state.projects) = reply;
    }

    pub fn set_issues(&self, repo_id: &str, issues: Value) {
        lock(&self.state.issues).insert(repo_id.to_string(), issues);
    }

    pub fn set_profile(&self, handle: &str, profile: Value) {
        lock(&self.state.profiles).insert(handle.to_string(), profile);
    }

    pub fn set_registrations(&self, reply: Reply) {
        *lock(&self.state.registrations) = reply;
    }

    pub fn set_recent(&self, reply: Reply) {
        *lock(&self.state.recent) = reply;
    }

    /// Status returned by `/updates/live`; anything but 200 refuses the stream.
    pub fn set_live_status(&self, code: u16) {
        *lock(&self.state.live_status) = code;
    }

    /// Push a raw chunk to every open live stream.
    pub fn send_live(&self, chunk: impl Into<String>) {
        let _ = lock(&self.state.live).send(chunk.into());
    }

    /// Push one `message` event carrying `data`.
    pub fn send_live_message(&self, data: &str) {
        self.send_live(format!("data: {data}\n\n"));
    }

    /// End every open live stream from the server side.
    pub fn disconnect_live(&self) {
        let (fresh, _) = broadcast::channel(64);
        *lock(&self.state.live) = fresh;
    }

    /// Wait until `count` clients hold the live stream open.
    pub async fn wait_for_live_clients(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while lock(&self.state.live).receiver_count() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("live clients did not connect in time");
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of requests served by the named data route
    /// (`leaderboard`, `profile`, `registrations`, `projects`, `issues`,
    /// `recent`, `live`).
    #[must_use]
    pub fn hits(&self, route: &str) -> usize {
        lock(&self.state.hits).get(route).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn seen(&self) -> Vec<Seen> {
        lock(&self.state.seen).clone()
    }

    /// Authorization headers recorded for `path`, in arrival order.
    #[must_use]
    pub fn authorizations_for(&self, path: &str) -> Vec<Option<String>> {
        self.seen()
            .into_iter()
            .filter(|s| s.path == path)
            .map(|s| s.authorization)
            .collect()
    }
}

/// Identity as the verify endpoint would have produced it for `handle`.
#[must_use]
pub fn identity(handle: &str) -> Identity {
    Identity {
        handle: handle.to_string(),
        display_name: None,
        email: None,
        category: "fullstack".to_string(),
        points: 0,
        pull_request_count: 0,
        issues_solved_count: 0,
    }
}

/// Session for `octocat` holding `access_token` and, optionally, the
/// backend's refresh token.
#[must_use]
pub fn session(access_token: &str, with_refresh: bool) -> Session {
    let session = Session::new(access_token, identity("octocat"));
    if with_refresh {
        session.with_refresh_token(REFRESH_TOKEN)
    } else {
        session
    }
}

/// Client for `config` whose session starts as `session` and persists to the
/// returned in-memory store.
#[must_use]
pub fn client_with(
    config: ClientConfig,
    session: Option<Session>,
) -> (Arc<ApiClient>, Arc<MemorySessionStore>) {
    let store = Arc::new(match session {
        Some(session) => MemorySessionStore::with_session(session),
        None => MemorySessionStore::new(),
    });
    let service = Arc::new(SessionService::open(store.clone()));
    let client = ApiClient::new(config, service).expect("build api client");
    (Arc::new(client), store)
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

type Shared = State<Arc<MockState>>;

async fn refresh(State(s): Shared, headers: HeaderMap) -> Response {
    s.record("/auth/refresh", &headers);
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);

    if bearer_of(&headers).as_deref() != Some(REFRESH_TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid refresh token"})))
            .into_response();
    }

    let mode = lock(&s.refresh_mode).clone();
    match mode {
        RefreshMode::Issue(token) => {
            *lock(&s.accepted_token) = token.clone();
            Json(json!({"accessKey": token})).into_response()
        }
        RefreshMode::IssueRejected(token) => Json(json!({"accessKey": token})).into_response(),
        RefreshMode::Reject(code) => {
            (status(code), Json(json!({"detail": "Refresh token expired"}))).into_response()
        }
        RefreshMode::MissingKey => Json(json!({"message": "ok"})).into_response(),
    }
}

async fn verify(State(s): Shared, headers: HeaderMap) -> Response {
    s.record("/api/v1/auth/verify", &headers);
    let user = bearer_of(&headers).and_then(|t| lock(&s.users).get(&t).cloned());
    match user {
        Some(user) => Json(json!({"user": user})).into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid token"}))).into_response(),
    }
}

async fn echo(
    State(s): Shared,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    s.record("/echo", &headers);
    if !s.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Token expired"}))).into_response();
    }
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "method": method.as_str(),
        "authorization": header("authorization"),
        "contentType": header("content-type"),
        "custom": header("x-custom"),
        "query": query,
        "body": body,
    }))
    .into_response()
}

async fn errors(State(s): Shared, headers: HeaderMap, Path(kind): Path<String>) -> Response {
    s.record(&format!("/errors/{kind}"), &headers);
    match kind.as_str() {
        "message" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Bad input", "detail": "ignored"})),
        )
            .into_response(),
        "detail" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "Field missing"})),
        )
            .into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

async fn leaderboard(State(s): Shared, headers: HeaderMap) -> Response {
    s.record("/leaderboard", &headers);
    s.hit("leaderboard");
    lock(&s.leaderboard).clone().into_response()
}

async fn projects(State(s): Shared, headers: HeaderMap) -> Response {
    s.record("/projects", &headers);
    s.hit("projects");
    lock(&s.projects).clone().into_response()
}

async fn issues(State(s): Shared, headers: HeaderMap, Path(repo_id): Path<String>) -> Response {
    s.record(&format!("/issues/{repo_id}"), &headers);
    s.hit("issues");
    match lock(&s.issues).get(&repo_id).cloned() {
        Some(issues) => Json(json!({"issues": issues})).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Repository not found"}))).into_response(),
    }
}

async fn profile(
    State(s): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    s.record("/profile", &headers);
    s.hit("profile");
    if !s.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Token expired"}))).into_response();
    }
    let found = query
        .get("user")
        .and_then(|user| lock(&s.profiles).get(user).cloned());
    match found {
        Some(profile) => Json(profile).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "User not found"}))).into_response(),
    }
}

async fn registrations(State(s): Shared, headers: HeaderMap) -> Response {
    s.record("/registrations", &headers);
    s.hit("registrations");
    lock(&s.registrations).clone().into_response()
}

async fn recent(State(s): Shared, headers: HeaderMap) -> Response {
    s.record("/updates/latest", &headers);
    s.hit("recent");
    lock(&s.recent).clone().into_response()
}

async fn live(State(s): Shared, headers: HeaderMap) -> Response {
    s.record("/updates/live", &headers);
    s.hit("live");

    let code = *lock(&s.live_status);
    if code != 200 {
        return (status(code), Json(json!({"detail": "Live updates unavailable"}))).into_response();
    }

    let rx = lock(&s.live).subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(chunk) => return Some((Ok::<_, Infallible>(chunk), rx)),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    ([(CONTENT_TYPE, "text/event-stream")], Body::from_stream(stream)).into_response()
}
