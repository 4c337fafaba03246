//! In-process stand-in for the vault backend, served over real HTTP.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::{
    domain::VaultEntry,
    protocol::{AddEntryRequest, RegisterRequest, VerifyTotpRequest},
};
use tokio::{net::TcpListener, sync::Mutex};

pub const ACCEPTED_CODE: &str = "123456";
pub const QR_CODE: &str = "Zm9v";
pub const SHARED_SECRET: &str = "ABC123";
pub const ROTATED_AT: &str = "2024-01-01 00:00:00";

#[derive(Default)]
struct StubBackendState {
    users: Vec<String>,
    entries: HashMap<String, Vec<VaultEntry>>,
    requests: Vec<String>,
    added: Vec<(String, AddEntryRequest)>,
    searches: Vec<(String, String)>,
    register_override: Option<(StatusCode, String)>,
    fail_searches: bool,
    fail_adds: bool,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct StubBackend {
    inner: Arc<Mutex<StubBackendState>>,
}

impl StubBackend {
    pub async fn seed_user(&self, username: &str, entries: Vec<VaultEntry>) {
        let mut state = self.inner.lock().await;
        state.users.push(username.to_string());
        state.entries.insert(username.to_string(), entries);
    }

    pub async fn override_register(&self, status: StatusCode, body: impl Into<String>) {
        self.inner.lock().await.register_override = Some((status, body.into()));
    }

    pub async fn set_fail_searches(&self, fail: bool) {
        self.inner.lock().await.fail_searches = fail;
    }

    pub async fn set_fail_adds(&self, fail: bool) {
        self.inner.lock().await.fail_adds = fail;
    }

    pub async fn set_delay(&self, delay: Duration) {
        self.inner.lock().await.delay = Some(delay);
    }

    pub async fn requests(&self) -> Vec<String> {
        self.inner.lock().await.requests.clone()
    }

    pub async fn added(&self) -> Vec<(String, AddEntryRequest)> {
        self.inner.lock().await.added.clone()
    }

    pub async fn searches(&self) -> Vec<(String, String)> {
        self.inner.lock().await.searches.clone()
    }

    async fn record(&self, request: String) {
        let delay = {
            let mut state = self.inner.lock().await;
            state.requests.push(request);
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn entry(service: &str, username: &str, password: &str) -> VaultEntry {
    VaultEntry {
        service: service.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        last_rotated: Some(ROTATED_AT.to_string()),
    }
}

fn reject(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn handle_register(
    State(backend): State<StubBackend>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    backend.record("POST /register".into()).await;
    let mut state = backend.inner.lock().await;
    if let Some((status, raw)) = state.register_override.clone() {
        return (status, raw).into_response();
    }
    if state.users.contains(&body.username) {
        return reject(StatusCode::BAD_REQUEST, "Username already registered");
    }
    state.users.push(body.username.clone());
    state.entries.entry(body.username).or_default();
    Json(json!({
        "message": "User registered successfully",
        "qr_code": QR_CODE,
        "secret": SHARED_SECRET,
    }))
    .into_response()
}

async fn handle_verify_totp(
    State(backend): State<StubBackend>,
    Json(body): Json<VerifyTotpRequest>,
) -> Response {
    backend.record("POST /verify-totp".into()).await;
    let state = backend.inner.lock().await;
    if !state.users.contains(&body.username) {
        return reject(StatusCode::NOT_FOUND, "User not found");
    }
    if body.code != ACCEPTED_CODE {
        return reject(StatusCode::UNAUTHORIZED, "Invalid TOTP code");
    }
    Json(json!({ "message": "Authentication successful" })).into_response()
}

async fn handle_search(
    State(backend): State<StubBackend>,
    Path((username, search_term)): Path<(String, String)>,
) -> Response {
    backend.record("GET /passwords".into()).await;
    let mut state = backend.inner.lock().await;
    state.searches.push((username.clone(), search_term.clone()));
    if state.fail_searches {
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "search unavailable");
    }
    let Some(entries) = state.entries.get(&username) else {
        return reject(StatusCode::NOT_FOUND, "User not found");
    };
    let needle = search_term.to_lowercase();
    let matches = entries
        .iter()
        .filter(|entry| entry.service.to_lowercase().contains(&needle))
        .cloned()
        .collect::<Vec<_>>();
    Json(matches).into_response()
}

async fn handle_add(
    State(backend): State<StubBackend>,
    Path(username): Path<String>,
    Json(body): Json<AddEntryRequest>,
) -> Response {
    backend.record("POST /passwords".into()).await;
    let mut state = backend.inner.lock().await;
    if state.fail_adds {
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable");
    }
    if !state.users.contains(&username) {
        return reject(StatusCode::NOT_FOUND, "User not found");
    }
    state.added.push((username.clone(), body.clone()));
    state.entries.entry(username).or_default().push(VaultEntry {
        service: body.service,
        username: body.service_username,
        password: body.encrypted_password,
        last_rotated: Some(ROTATED_AT.to_string()),
    });
    Json(json!({ "message": "Password added successfully" })).into_response()
}

fn router(backend: StubBackend) -> Router {
    Router::new()
        .route("/register", post(handle_register))
        .route("/verify-totp", post(handle_verify_totp))
        .route("/passwords/:username/:search_term", get(handle_search))
        .route("/passwords/:username", post(handle_add))
        .with_state(backend)
}

/// Serves `backend` on an ephemeral port, mounted under `prefix` when it is
/// non-empty, and returns the base URL to hand to the client.
pub async fn spawn_stub_backend_at(backend: StubBackend, prefix: &str) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = if prefix.is_empty() {
        router(backend)
    } else {
        Router::new().nest(prefix, router(backend))
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}{prefix}"))
}

pub async fn spawn_stub_backend(backend: StubBackend) -> Result<String> {
    spawn_stub_backend_at(backend, "").await
}

/// A base URL nothing is listening on.
pub async fn unreachable_base_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}
