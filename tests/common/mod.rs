#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use caixahub_client::auth::{AuthTokens, TokenStore};
use caixahub_client::http::{ClientSettings, HttpClient};

pub const PASSWORD: &str = "correct-horse-battery";
pub const REFRESH_TOKEN: &str = "refresh-1";

/// What the mock backend knows, shared with the test body
pub struct MockState {
    pub access_token: Mutex<String>,
    pub refresh_allowed: AtomicBool,
    pub refresh_count: AtomicUsize,
    pub calls: Mutex<HashMap<String, usize>>,
    pub status_script: Mutex<VecDeque<Value>>,
    pub status_requests: Mutex<Vec<String>>,
    pub status_error: Mutex<Option<u16>>,
    pub transactions: Mutex<Vec<Value>>,
    pub connections: Mutex<Vec<Value>>,
    pub usage: Mutex<Value>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            access_token: Mutex::new("access-1".to_string()),
            refresh_allowed: AtomicBool::new(true),
            refresh_count: AtomicUsize::new(0),
            calls: Mutex::new(HashMap::new()),
            status_script: Mutex::new(VecDeque::from([json!({
                "status": "UPDATED",
                "execution_status": "SUCCESS",
                "sync_complete": true
            })])),
            status_requests: Mutex::new(Vec::new()),
            status_error: Mutex::new(None),
            transactions: Mutex::new(vec![
                transaction("tx_1", "UBER *TRIP", "-25.90", "transport"),
                transaction("tx_2", "PAO DE ACUCAR", "-180.35", "groceries"),
                transaction("tx_3", "SALARIO", "7500.00", "salary"),
            ]),
            connections: Mutex::new(vec![connection("conn_1", "UPDATED"), connection("conn_2", "LOGIN_ERROR")]),
            usage: Mutex::new(json!({
                "transactions": {"used": 410, "limit": 500, "percentage": 82.0},
                "bank_accounts": {"used": 1, "limit": 2, "percentage": 50.0},
                "ai_requests": {"used": 100, "limit": 100, "percentage": 100.0}
            })),
        }
    }
}

impl MockState {
    pub fn calls(&self, route: &str) -> usize {
        self.calls.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    /// Replace the scripted status responses; the last one repeats forever
    pub fn script_status(&self, responses: Vec<Value>) {
        *self.status_script.lock().unwrap() = responses.into();
    }

    /// Server-side rotation: the client's current access token stops working
    pub fn expire_access_token(&self) {
        *self.access_token.lock().unwrap() = "access-rotated".to_string();
    }

    fn hit(&self, route: &str) {
        *self.calls.lock().unwrap().entry(route.to_string()).or_insert(0) += 1;
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let expected = format!("Bearer {}", self.access_token.lock().unwrap());
        match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some(value) if value == expected => Ok(()),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"})),
            )
                .into_response()),
        }
    }
}

pub fn transaction(id: &str, description: &str, amount: &str, category: &str) -> Value {
    json!({
        "id": id,
        "account_id": "acc_1",
        "description": description,
        "amount": amount,
        "date": "2026-03-01T12:00:00Z",
        "category": category,
        "category_name": category
    })
}

pub fn connection(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "item_id": format!("item_{}", id),
        "connector": {"id": 201, "name": "Nubank"},
        "status": status,
        "accounts_count": 1
    })
}

pub struct MockServer {
    pub base_url: String,
    pub api_url: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let state = Arc::new(MockState::default());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock backend")?;
        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            api_url: format!("{}/api", base_url),
            base_url,
            state,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("mock backend did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn anonymous_client(&self) -> Result<HttpClient> {
        Ok(HttpClient::new(ClientSettings::new(&self.api_url), TokenStore::new())?)
    }

    /// Client already holding the tokens the mock accepts
    pub fn logged_in_client(&self) -> Result<HttpClient> {
        let access = self.state.access_token.lock().unwrap().clone();
        let tokens = TokenStore::with_tokens(AuthTokens::new(access, REFRESH_TOKEN));
        Ok(HttpClient::new(ClientSettings::new(&self.api_url), tokens)?)
    }
}

type Shared = State<Arc<MockState>>;

fn router(state: Arc<MockState>) -> Router {
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/profile", get(profile))
        .route("/accounts", get(list_accounts))
        .route("/transactions", get(list_transactions))
        .route("/transactions/:id", patch(update_transaction))
        .route("/connections", get(list_connections))
        .route("/connections/:id", axum::routing::delete(disconnect))
        .route("/connections/:id/status", get(connection_status))
        .route("/connections/:id/sync", post(sync_connection))
        .route("/subscriptions/status", get(subscription_status))
        .route("/subscriptions/usage", get(usage))
        .route("/categories/rules", get(list_rules).post(create_rule))
        .with_state(state);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
}

fn user() -> Value {
    json!({
        "id": "u_1",
        "email": "ana@example.com",
        "first_name": "Ana",
        "last_name": "Souza",
        "is_email_verified": true
    })
}

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit("POST /auth/login");
    if body["password"] != PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid email or password"}))).into_response();
    }
    let access = state.access_token.lock().unwrap().clone();
    Json(json!({
        "user": user(),
        "tokens": {"access": access, "refresh": REFRESH_TOKEN}
    }))
    .into_response()
}

async fn refresh(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit("POST /auth/refresh");
    if !state.refresh_allowed.load(Ordering::SeqCst) || body["refresh"] != REFRESH_TOKEN {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired", "code": "token_not_valid"})),
        )
            .into_response();
    }
    let n = state.refresh_count.fetch_add(1, Ordering::SeqCst) + 2;
    let access = format!("access-{}", n);
    *state.access_token.lock().unwrap() = access.clone();
    Json(json!({ "access": access })).into_response()
}

async fn logout(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("POST /auth/logout");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn profile(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("GET /auth/profile");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(user()).into_response()
}

async fn list_accounts(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("GET /accounts");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(json!([
        {"id": "acc_1", "name": "Conta Corrente", "type": "BANK", "balance": "1520.75", "institution_name": "Nubank"}
    ]))
    .into_response()
}

async fn list_transactions(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.hit("GET /transactions");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let results: Vec<Value> = state
        .transactions
        .lock()
        .unwrap()
        .iter()
        .filter(|tx| query.get("category").map_or(true, |c| tx["category"] == c.as_str()))
        .cloned()
        .collect();
    Json(json!({
        "count": results.len(),
        "next": null,
        "previous": null,
        "results": results
    }))
    .into_response()
}

async fn update_transaction(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.hit("PATCH /transactions/:id");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let mut transactions = state.transactions.lock().unwrap();
    let Some(tx) = transactions.iter_mut().find(|tx| tx["id"] == id.as_str()) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    if let Value::Object(fields) = body {
        for (key, value) in fields {
            tx[key.as_str()] = value;
        }
    }
    Json(tx.clone()).into_response()
}

async fn list_connections(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("GET /connections");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let connections = state.connections.lock().unwrap().clone();
    Json(json!({ "count": connections.len(), "results": connections })).into_response()
}

async fn disconnect(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.hit("DELETE /connections/:id");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let mut connections = state.connections.lock().unwrap();
    let before = connections.len();
    connections.retain(|c| c["id"] != id.as_str());
    if connections.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn connection_status(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.hit("GET /connections/:id/status");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    state.status_requests.lock().unwrap().push(id);

    if let Some(code) = *state.status_error.lock().unwrap() {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({"detail": "Upstream aggregator unavailable"}))).into_response();
    }

    let mut script = state.status_script.lock().unwrap();
    let next = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };
    Json(next.unwrap_or(Value::Null)).into_response()
}

async fn sync_connection(State(state): Shared, headers: HeaderMap, Path(_id): Path<String>) -> Response {
    state.hit("POST /connections/:id/sync");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(json!({"message": "Sync started", "status": "UPDATING", "sync_started": true})).into_response()
}

async fn subscription_status(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("GET /subscriptions/status");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(json!({
        "status": "trialing",
        "plan": {"slug": "pro", "name": "Pro", "price_monthly": "29.90"},
        "trial_ends_at": "2099-01-01T00:00:00Z"
    }))
    .into_response()
}

async fn usage(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("GET /subscriptions/usage");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let usage = state.usage.lock().unwrap().clone();
    Json(usage).into_response()
}

async fn list_rules(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("GET /categories/rules");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(json!([])).into_response()
}

async fn create_rule(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.hit("POST /categories/rules");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    if body["category"] == "missing" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"category": ["Category does not exist."]})),
        )
            .into_response();
    }
    let mut rule = body;
    rule["id"] = json!("rule_1");
    Json(rule).into_response()
}
