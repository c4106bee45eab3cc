//! In-process mock of the hosted row and auth APIs.
//!
//! Binds an Axum router to an ephemeral localhost port so the real
//! `reqwest`-based clients can be exercised end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use flowline_core::{Session, SessionUser};
use serde_json::{json, Value};

pub const API_KEY: &str = "anon-test-key";
pub const ACCESS_TOKEN: &str = "test-access-token";
pub const USER_ID: &str = "user-1";
pub const EMAIL: &str = "jd@flowline.app";
pub const PASSWORD: &str = "correct-horse";
pub const REFRESH_TOKEN: &str = "refresh-1";

#[derive(Default)]
pub struct MockState {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    requests: AtomicUsize,
}

impl MockState {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
}

/// Start the mock on `127.0.0.1:0` and return its base URL.
pub async fn start() -> MockServer {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route(
            "/rest/v1/{table}",
            get(select_rows)
                .post(insert_rows)
                .patch(update_rows)
                .delete(delete_rows),
        )
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/logout", post(logout))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base_url: format!("http://{addr}"),
        state,
    }
}

/// A live session matching the token the mock accepts.
pub fn session() -> Session {
    Session {
        access_token: ACCESS_TOKEN.to_string(),
        refresh_token: Some(REFRESH_TOKEN.to_string()),
        user: SessionUser {
            id: USER_ID.to_string(),
            email: Some(EMAIL.to_string()),
        },
        expires_at: Utc::now() + Duration::hours(1),
    }
}

pub fn expired_session() -> Session {
    Session {
        expires_at: Utc::now() - Duration::minutes(1),
        ..session()
    }
}

pub fn lead_row(id: &str, name: &str, status: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "user_id": USER_ID,
        "name": name,
        "company": "Acme",
        "email": "",
        "status": status,
        "value": 1000.0,
        "owner": "JD",
        "source": "Web",
        "created_at": created_at,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "JWT invalid", "code": "PGRST301"})),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let api_key = headers.get("apikey").and_then(|v| v.to_str().ok());
    let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
    let expected = format!("Bearer {ACCESS_TOKEN}");
    api_key == Some(API_KEY) && bearer == Some(expected.as_str())
}

fn id_filter(query: &HashMap<String, String>) -> Option<String> {
    query.get("id")?.strip_prefix("eq.").map(str::to_string)
}

async fn select_rows(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut rows = state.rows(&table);
    rows.sort_by(|a, b| {
        let ka = a["created_at"].as_str().unwrap_or_default();
        let kb = b["created_at"].as_str().unwrap_or_default();
        kb.cmp(ka)
    });
    Json(Value::Array(rows)).into_response()
}

async fn insert_rows(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    let incoming = match body {
        Value::Array(rows) => rows,
        row => vec![row],
    };
    let mut stored = Vec::new();
    let mut tables = state.tables.lock().unwrap();
    let rows = tables.entry(table).or_default();
    for mut row in incoming {
        row["id"] = Value::String(uuid::Uuid::new_v4().to_string());
        rows.push(row.clone());
        stored.push(row);
    }
    (StatusCode::CREATED, Json(Value::Array(stored))).into_response()
}

async fn update_rows(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    let Some(id) = id_filter(&query) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut tables = state.tables.lock().unwrap();
    let mut updated = Vec::new();
    if let Some(rows) = tables.get_mut(&table) {
        for row in rows.iter_mut().filter(|r| r["id"] == id.as_str()) {
            if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
    }
    Json(Value::Array(updated)).into_response()
}

async fn delete_rows(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    let Some(id) = id_filter(&query) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut tables = state.tables.lock().unwrap();
    let mut removed = Vec::new();
    if let Some(rows) = tables.get_mut(&table) {
        rows.retain(|r| {
            if r["id"] == id.as_str() {
                removed.push(r.clone());
                false
            } else {
                true
            }
        });
    }
    Json(Value::Array(removed)).into_response()
}

fn grant() -> Value {
    json!({
        "access_token": ACCESS_TOKEN,
        "refresh_token": REFRESH_TOKEN,
        "token_type": "bearer",
        "expires_in": 3600,
        "user": {"id": USER_ID, "email": EMAIL},
    })
}

async fn token(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let ok = match query.get("grant_type").map(String::as_str) {
        Some("password") => body["email"] == EMAIL && body["password"] == PASSWORD,
        Some("refresh_token") => body["refresh_token"] == REFRESH_TOKEN,
        _ => false,
    };
    if ok {
        Json(grant()).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
        )
            .into_response()
    }
}

async fn signup(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let email = body["email"].as_str().unwrap_or_default();
    if email.starts_with("confirm") {
        Json(json!({"id": "new-user", "email": email})).into_response()
    } else {
        Json(grant()).into_response()
    }
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if authorized(&headers) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        unauthorized()
    }
}
