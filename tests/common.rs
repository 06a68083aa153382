#![allow(dead_code)]

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use jsonwebtoken::{EncodingKey, Header};
use mission_client::Client;
use mission_client::config::{
    ApiConfig, Config, LogFormat, RetryConfig, StoreBackend, StoreConfig, TelemetryConfig,
};
use mission_client::storage::CredentialStore;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("mission_client=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Mints an HS256 token; the client never verifies the signature.
pub fn mint_token(subject: &str, exp: i64) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &Claims { sub: subject.to_string(), exp },
        &EncodingKey::from_secret(b"mock-backend-secret"),
    )
    .unwrap()
}

pub fn fresh_token(subject: &str) -> String {
    mint_token(subject, time::OffsetDateTime::now_utc().unix_timestamp() + 3600)
}

#[derive(Clone)]
struct Account {
    password: String,
    profile: Value,
}

#[derive(Default)]
pub struct BackendState {
    accounts: Mutex<HashMap<String, Account>>,
    access_tokens: Mutex<HashMap<String, String>>,
    refresh_tokens: Mutex<HashMap<String, String>>,
    revoked: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub flaky_calls: AtomicUsize,
}

impl BackendState {
    fn issue(&self, email: &str) -> (String, String) {
        let access = fresh_token(email);
        let refresh = format!("refresh-{}", Uuid::new_v4());
        self.access_tokens.lock().unwrap().insert(access.clone(), email.to_string());
        self.refresh_tokens.lock().unwrap().insert(refresh.clone(), email.to_string());
        (access, refresh)
    }

    fn bearer_owner(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")?;
        if self.revoked.lock().unwrap().contains(token) {
            return None;
        }
        self.access_tokens.lock().unwrap().get(token).cloned()
    }

    fn profile(&self, email: &str) -> Option<Value> {
        self.accounts.lock().unwrap().get(email).map(|account| account.profile.clone())
    }

    pub fn revoke_all(&self) {
        let tokens: Vec<String> = self.access_tokens.lock().unwrap().keys().cloned().collect();
        self.revoked.lock().unwrap().extend(tokens);
    }
}

pub struct TestApp {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        setup_tracing();
        let state = Arc::new(BackendState::default());

        let app = Router::new()
            .route("/accounts/login/", post(login))
            .route("/accounts/register/", post(register))
            .route("/accounts/me/", get(me))
            .route("/accounts/logout/", post(logout))
            .route("/accounts/token/refresh/", post(refresh))
            .route("/missions/", get(missions))
            .route("/echo/", post(echo).get(echo))
            .route("/status/{code}", get(status))
            .route("/flaky/", get(flaky))
            .route("/slow/", get(slow))
            .route("/slow401/", get(slow_unauthorized))
            .route("/empty/", delete(empty))
            .route("/plain/", get(plain))
            .route("/upload/", post(upload))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url: format!("http://{addr}"), state }
    }

    pub fn seed_account(&self, email: &str, password: &str, user_type: &str) -> Value {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let profile = json!({
            "id": id,
            "email": email,
            "first_name": "Test",
            "last_name": "User",
            "user_type": user_type,
        });
        self.state
            .accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), Account { password: password.to_string(), profile: profile.clone() });
        profile
    }

    pub fn config(&self) -> Config {
        config_for(Some(self.base_url.clone()))
    }

    pub fn client(&self, store: CredentialStore) -> Client {
        Client::new(&self.config(), store).unwrap()
    }
}

pub fn config_for(base_url: Option<String>) -> Config {
    Config {
        api: ApiConfig { base_url, request_timeout_secs: 5, user_agent: "mission-client-tests".to_string() },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            path: std::env::temp_dir().join(format!("mission-session-{}.json", Uuid::new_v4())),
            redis_url: std::env::var("REDIS_URL").ok(),
            redis_key: format!("mission:test:{}", Uuid::new_v4()),
            redis_min_backoff_ms: 50,
            redis_max_backoff_ms: 200,
            redis_connect_attempts: 2,
        },
        retry: RetryConfig { max_attempts: 3, min_backoff_ms: 1, max_backoff_ms: 10 },
        telemetry: TelemetryConfig { log_format: LogFormat::Text, otlp_endpoint: None, metrics_export_interval_secs: 60 },
    }
}

/// An address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Given token not valid for any token type", "code": "token_not_valid" })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<LoginBody>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "email": ["This field is required."] }))).into_response();
    };

    let account = state.accounts.lock().unwrap().get(&email).cloned();
    match account {
        Some(account) if account.password == password => {
            let (access, refresh) = state.issue(&email);
            Json(json!({ "user": account.profile, "tokens": { "access": access, "refresh": refresh } })).into_response()
        }
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "No active account found with the given credentials" })))
            .into_response(),
    }
}

async fn register(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if state.accounts.lock().unwrap().contains_key(&email) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "email": ["user with this email already exists."] })))
            .into_response();
    }

    let id = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let profile = json!({
        "id": id,
        "email": email,
        "first_name": body["first_name"],
        "last_name": body["last_name"],
        "user_type": body["user_type"],
    });
    let password = body["password"].as_str().unwrap_or_default().to_string();
    state.accounts.lock().unwrap().insert(email, Account { password, profile: profile.clone() });

    // Registration only creates the account; the client signs in afterwards.
    (StatusCode::CREATED, Json(profile)).into_response()
}

async fn me(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    match state.bearer_owner(&headers).and_then(|email| state.profile(&email)) {
        Some(profile) => Json(profile).into_response(),
        None => unauthorized(),
    }
}

async fn logout(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if state.bearer_owner(&headers).is_none() {
        return unauthorized();
    }
    StatusCode::RESET_CONTENT.into_response()
}

async fn refresh(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    let owner = body["refresh"].as_str().and_then(|token| state.refresh_tokens.lock().unwrap().get(token).cloned());
    match owner {
        Some(email) => {
            let access = fresh_token(&email);
            state.access_tokens.lock().unwrap().insert(access.clone(), email);
            Json(json!({ "access": access })).into_response()
        }
        None => unauthorized(),
    }
}

async fn missions(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if state.bearer_owner(&headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "count": 1,
        "results": [{ "id": 1, "title": "Beach cleanup" }],
        "query": query,
    }))
    .into_response()
}

async fn echo(headers: HeaderMap, body: String) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "authorization": header("authorization"),
        "content_type": header("content-type"),
        "request_id": header("x-request-id"),
        "custom": header("x-custom"),
        "body": serde_json::from_str::<Value>(&body).ok(),
    }))
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap();
    match code {
        400 => (status, Json(json!({ "detail": "Invalid email" }))).into_response(),
        403 => (status, Json(json!({ "detail": "You do not have permission to perform this action." }))).into_response(),
        404 => (status, Json(json!({ "detail": "Not found." }))).into_response(),
        422 => (status, Json(json!({ "non_field_errors": ["Mission is full"] }))).into_response(),
        429 => (status, [(header::RETRY_AFTER, "2")], Json(json!({ "detail": "Request was throttled." }))).into_response(),
        500 => (status, "Internal Server Error").into_response(),
        _ => (status, Json(json!({ "error": format!("status {code}") }))).into_response(),
    }
}

/// Fails twice with 503, then succeeds.
async fn flaky(State(state): State<Arc<BackendState>>) -> Response {
    if state.flaky_calls.fetch_add(1, Ordering::SeqCst) < 2 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "detail": "Try again later" }))).into_response();
    }
    Json(json!({ "ok": true })).into_response()
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(10)).await;
    Json(json!({ "late": true }))
}

/// Rejects whatever token it was sent, after a delay.
async fn slow_unauthorized() -> Response {
    tokio::time::sleep(Duration::from_millis(300)).await;
    unauthorized()
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn plain() -> &'static str {
    "pong"
}

async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Json<Value> {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    let mut fields = serde_json::Map::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.unwrap();
        let value = match file_name {
            Some(file_name) => json!({ "file_name": file_name, "size": bytes.len() }),
            None => json!(String::from_utf8_lossy(&bytes)),
        };
        fields.insert(name, value);
    }
    Json(json!({ "content_type": content_type, "fields": fields }))
}
