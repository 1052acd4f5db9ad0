// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fake of the job-board REST API.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use jobboard_client::config::{ClientConfig, PollMode};
use jobboard_client::storage::{keys, KeyValueStore, MemoryStore};
use jobboard_client::token::{decode_claims, epoch_secs, unsigned_token};
use jobboard_client::JobBoardClient;

pub const CODE: &str = "123456";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Ok,
    /// 503, as from a flaky upstream.
    Unavailable,
    /// 401: the refresh token is rejected.
    Reject,
}

pub struct Backend {
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub premium_calls: AtomicUsize,
    pub refresh_mode: Mutex<RefreshMode>,
    pub refresh_delay: Mutex<Duration>,
    pub premium: Mutex<Value>,
    /// Status sequence per payment id; the last entry repeats.
    pub invoices: Mutex<HashMap<String, VecDeque<String>>>,
    pub invoice_calls: Mutex<HashMap<String, usize>>,
    pub subscriptions: Mutex<Vec<String>>,
    pub last_subscribe: Mutex<Option<Value>>,
    /// When set, new subscriptions come back with this payment id.
    pub subscribe_payment: Mutex<Option<String>>,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            premium_calls: AtomicUsize::new(0),
            refresh_mode: Mutex::new(RefreshMode::Ok),
            refresh_delay: Mutex::new(Duration::ZERO),
            premium: Mutex::new(json!(false)),
            invoices: Mutex::new(HashMap::new()),
            invoice_calls: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(vec!["41".into()]),
            last_subscribe: Mutex::new(None),
            subscribe_payment: Mutex::new(Some("p-new".into())),
        })
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn premium_checks(&self) -> usize {
        self.premium_calls.load(Ordering::SeqCst)
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub fn set_invoice(&self, id: &str, statuses: &[&str]) {
        self.invoices
            .lock()
            .unwrap()
            .insert(id.to_owned(), statuses.iter().map(|s| (*s).to_owned()).collect());
    }

    pub fn invoice_status(&self, id: &str) -> Option<String> {
        self.invoices.lock().unwrap().get(id).and_then(|q| q.front().cloned())
    }

    pub fn invoice_checks(&self, id: &str) -> usize {
        self.invoice_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

pub fn access_token(exp: u64) -> String {
    unsigned_token(exp, "access")
}

pub fn refresh_token(exp: u64) -> String {
    unsigned_token(exp, "refresh")
}

fn issue_pair() -> Value {
    let now = epoch_secs();
    json!({ "access": access_token(now + 300), "refresh": refresh_token(now + 86_400) })
}

fn user_json() -> Value {
    json!({ "id": 7, "email": "a@b.com", "first_name": "Ada", "is_verified": true })
}

fn error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// The bearer token is an unexpired access token.
fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(decode_claims)
        .is_some_and(|c| c.exp > epoch_secs() && c.token_type.as_deref() == Some("access"))
}

fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, json!({ "detail": "Given token not valid for any token type" }))
}

async fn request_verification(Json(body): Json<Value>) -> Response {
    if body.get("email").and_then(Value::as_str).is_none() {
        return error(StatusCode::BAD_REQUEST, json!({ "message": "Email is required" }));
    }
    Json(json!({})).into_response()
}

async fn verify_email(Json(body): Json<Value>) -> Response {
    if body.get("code").and_then(Value::as_str) != Some(CODE) {
        return error(StatusCode::BAD_REQUEST, json!({ "message": "Invalid verification code" }));
    }
    Json(json!({ "tokens": issue_pair(), "user": user_json() })).into_response()
}

async fn refresh(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    b.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *b.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let mode = *b.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Unavailable => {
            error(StatusCode::SERVICE_UNAVAILABLE, json!({ "detail": "try later" }))
        }
        RefreshMode::Reject => {
            error(StatusCode::UNAUTHORIZED, json!({ "detail": "Token is invalid or expired" }))
        }
        RefreshMode::Ok => {
            let valid = body
                .get("refresh")
                .and_then(Value::as_str)
                .and_then(decode_claims)
                .is_some_and(|c| c.exp > epoch_secs());
            if !valid {
                return unauthorized();
            }
            Json(issue_pair()).into_response()
        }
    }
}

async fn profile(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    b.profile_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(user_json()).into_response()
}

async fn plans() -> Json<Value> {
    Json(json!([
        { "id": 1, "name": "Monthly", "plan_type": "monthly", "price": "9.99", "features": ["ai"] },
        { "id": 2, "name": "Yearly", "plan_type": "yearly", "price": "99.00" }
    ]))
}

async fn premium_status(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    b.premium_calls.fetch_add(1, Ordering::SeqCst);
    let premium = b.premium.lock().unwrap().clone();
    Json(json!({ "has_premium": premium, "subscription": null })).into_response()
}

async fn create_subscription(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    *b.last_subscribe.lock().unwrap() = Some(body);
    let payment = b.subscribe_payment.lock().unwrap().clone();
    match payment {
        Some(id) => {
            b.set_invoice(&id, &["waiting"]);
            Json(json!({
                "subscription": { "id": 41, "status": "pending" },
                "payment": { "id": id, "order_id": null, "payment_url": format!("https://pay.test/i/{id}") }
            }))
            .into_response()
        }
        None => {
            *b.premium.lock().unwrap() = json!("active");
            Json(json!({ "subscription": { "id": 42, "status": "active" } })).into_response()
        }
    }
}

async fn list_subscriptions(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let ids = b.subscriptions.lock().unwrap().clone();
    let items: Vec<Value> = ids.iter().map(|id| json!({ "id": id, "status": "active" })).collect();
    Json(json!({ "count": items.len(), "results": items })).into_response()
}

async fn cancel_subscription(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut subs = b.subscriptions.lock().unwrap();
    match subs.iter().position(|s| *s == id) {
        Some(i) => {
            subs.remove(i);
            Json(json!({ "message": "Subscription cancelled" })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, json!({ "detail": "Not found." })),
    }
}

async fn invoice(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    *b.invoice_calls.lock().unwrap().entry(id.clone()).or_default() += 1;
    let mut invoices = b.invoices.lock().unwrap();
    let Some(statuses) = invoices.get_mut(&id) else {
        return error(StatusCode::NOT_FOUND, json!({ "detail": "Not found." }));
    };
    let status = if statuses.len() > 1 {
        statuses.pop_front().unwrap_or_default()
    } else {
        statuses.front().cloned().unwrap_or_default()
    };
    Json(json!({
        "id": id,
        "status": status,
        "is_paid": status == "finished",
        "order_id": format!("order-{id}"),
        "price_amount": "9.99",
        "price_currency": "usd",
        "expires_at": "2099-01-01T00:00:00Z",
        "can_be_paid": status == "waiting",
        "payment_url": format!("https://pay.test/i/{id}")
    }))
    .into_response()
}

async fn cancel_invoice(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut invoices = b.invoices.lock().unwrap();
    let Some(statuses) = invoices.get_mut(&id) else {
        return error(StatusCode::NOT_FOUND, json!({ "detail": "Not found." }));
    };
    let current = statuses.front().cloned().unwrap_or_default();
    if matches!(current.as_str(), "finished" | "failed" | "expired" | "refunded" | "cancelled") {
        return error(
            StatusCode::BAD_REQUEST,
            json!({ "error": format!("Payment cannot be cancelled: already {current}") }),
        );
    }
    *statuses = VecDeque::from(["cancelled".to_owned()]);
    Json(json!({ "message": "Payment cancelled" })).into_response()
}

async fn invoice_list(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let invoices = b.invoices.lock().unwrap();
    let results: Vec<Value> = invoices
        .iter()
        .map(|(id, s)| json!({ "id": id, "status": s.front().cloned().unwrap_or_default() }))
        .collect();
    Json(json!({ "count": results.len(), "results": results })).into_response()
}

pub fn router(backend: Arc<Backend>) -> Router {
    Router::new()
        .route("/api/v1/user/auth/request-verification/", post(request_verification))
        .route("/api/v1/user/auth/verify-email/", post(verify_email))
        .route("/api/v1/user/auth/refresh/", post(refresh))
        .route("/api/v1/user/profile/", get(profile))
        .route("/api/v1/user/subscriptions/plans/", get(plans))
        .route("/api/v1/user/subscriptions/", get(list_subscriptions).post(create_subscription))
        .route("/api/v1/user/subscriptions/{id}/cancel/", post(cancel_subscription))
        .route("/api/v1/user/premium-status/", get(premium_status))
        .route("/api/v1/user/payments/invoices/", get(invoice_list))
        .route("/api/v1/user/payments/invoices/{id}/", get(invoice))
        .route("/api/v1/user/payments/invoices/{id}/cancel/", post(cancel_invoice))
        .with_state(backend)
}

/// Serve `router` on an ephemeral port; returns the base URL.
pub async fn serve(router: Router) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

/// Start a fake backend. Returns it and the API base URL.
pub async fn start_backend() -> anyhow::Result<(Arc<Backend>, String)> {
    let backend = Backend::new();
    let base = serve(router(Arc::clone(&backend))).await?;
    Ok((backend, format!("{base}/api/v1/")))
}

pub fn test_config(api_base: &str) -> ClientConfig {
    ClientConfig {
        api_base: api_base.to_owned(),
        app_origin: "https://app.test".to_owned(),
        refresh_horizon_secs: 60,
        access_token_lifetime_secs: 300,
        refresh_check_ms: 3_600_000,
        payment_poll_mode: PollMode::Auto,
        payment_poll_ms: 20,
        payment_poll_max_ms: 2_000,
        request_timeout_ms: 5_000,
        ..Default::default()
    }
}

pub fn test_client(config: ClientConfig) -> anyhow::Result<(JobBoardClient, Arc<MemoryStore>)> {
    let store = Arc::new(MemoryStore::new());
    let client = JobBoardClient::new(config, store.clone())?;
    Ok((client, store))
}

/// Store a token pair with the given expiries (epoch seconds).
pub fn seed_tokens(store: &MemoryStore, access_exp: u64, refresh_exp: u64) -> anyhow::Result<()> {
    store.set(keys::ACCESS_TOKEN, &access_token(access_exp))?;
    store.set(keys::REFRESH_TOKEN, &refresh_token(refresh_exp))?;
    Ok(())
}

/// Store a valid session.
pub fn seed_session(store: &MemoryStore) -> anyhow::Result<()> {
    let now = epoch_secs();
    seed_tokens(store, now + 300, now + 86_400)
}
