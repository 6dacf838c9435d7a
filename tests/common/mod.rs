//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use bridge_watchdog::health::probe::{HealthCheckResult, HealthProbe, HealthThresholds};
use bridge_watchdog::notify::{Notification, NotificationGateway, NotifyError};
use bridge_watchdog::recovery::trigger::{DispatchError, RemoteExecutor};

pub fn healthy() -> HealthCheckResult {
    HealthCheckResult::evaluate(Utc::now(), true, Some(1.0), 1.0, &HealthThresholds::default())
}

pub fn unhealthy() -> HealthCheckResult {
    HealthCheckResult::unreachable(Utc::now(), &HealthThresholds::default())
        .with_detail("connection refused")
}

/// Account entry whose data was last updated `minutes_ago`.
pub fn account(id: u32, minutes_ago: i64) -> Value {
    let updated = Utc::now() - chrono::Duration::minutes(minutes_ago);
    json!({ "id": id, "lastUpdated": updated.to_rfc3339() })
}

// -- In-process fakes -------------------------------------------------------

/// Probe that replays queued results, then repeats a fallback.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<HealthCheckResult>>,
    fallback: Mutex<HealthCheckResult>,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(fallback: HealthCheckResult) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicU32::new(0),
        })
    }

    pub fn push(&self, result: HealthCheckResult) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn set_fallback(&self, result: HealthCheckResult) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn check(&self) -> HealthCheckResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

/// Executor that counts dispatches and can be told to fail or stall.
#[derive(Default)]
pub struct FakeExecutor {
    calls: AtomicU32,
    fail: AtomicBool,
    delay: Mutex<Duration>,
    reasons: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let executor = Self::default();
        executor.fail.store(true, Ordering::SeqCst);
        Arc::new(executor)
    }

    /// Fails, but only after `delay`.
    pub fn slow_failing(delay: Duration) -> Arc<Self> {
        let executor = Self::default();
        executor.fail.store(true, Ordering::SeqCst);
        *executor.delay.lock().unwrap() = delay;
        Arc::new(executor)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reasons(&self) -> Vec<String> {
        self.reasons.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn dispatch(&self, reason: &str) -> Result<(), DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reasons.lock().unwrap().push(reason.to_string());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Rejected {
                status: 503,
                body: "automation API down".to_string(),
            });
        }
        Ok(())
    }
}

/// Gateway that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Poll `condition` until it holds or `within` elapses.
pub async fn eventually<F>(within: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

// -- Mock HTTP servers ------------------------------------------------------

/// Programmable bridge: `/health` and `/accounts` answer with whatever the
/// test last configured.
#[derive(Clone)]
pub struct MockBridge {
    pub status: Arc<AtomicU16>,
    pub health: Arc<Mutex<Value>>,
    pub accounts: Arc<Mutex<Value>>,
    pub delay: Arc<Mutex<Duration>>,
    pub hits: Arc<AtomicU32>,
}

impl MockBridge {
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn set_health(&self, body: Value) {
        *self.health.lock().unwrap() = body;
    }

    pub fn set_accounts(&self, body: Value) {
        *self.accounts.lock().unwrap() = body;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn bridge_respond(bridge: &MockBridge, body: Value) -> (StatusCode, Json<Value>) {
    bridge.hits.fetch_add(1, Ordering::SeqCst);
    let delay = *bridge.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let status = StatusCode::from_u16(bridge.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body))
}

async fn bridge_health(State(bridge): State<MockBridge>) -> (StatusCode, Json<Value>) {
    let body = bridge.health.lock().unwrap().clone();
    bridge_respond(&bridge, body).await
}

async fn bridge_accounts(State(bridge): State<MockBridge>) -> (StatusCode, Json<Value>) {
    let body = bridge.accounts.lock().unwrap().clone();
    bridge_respond(&bridge, body).await
}

pub async fn start_mock_bridge(addr: SocketAddr) -> MockBridge {
    let bridge = MockBridge {
        status: Arc::new(AtomicU16::new(200)),
        health: Arc::new(Mutex::new(json!({
            "status": "ok",
            "reachable": true,
            "accounts": [account(1, 1), account(2, 2)],
        }))),
        accounts: Arc::new(Mutex::new(json!([]))),
        delay: Arc::new(Mutex::new(Duration::ZERO)),
        hits: Arc::new(AtomicU32::new(0)),
    };

    let app = Router::new()
        .route("/health", get(bridge_health))
        .route("/accounts", get(bridge_accounts))
        .with_state(bridge.clone());

    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    bridge
}

/// A request captured by [`start_recording_server`].
#[derive(Debug, Clone)]
pub struct Captured {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
pub struct RecordingServer {
    pub status: Arc<AtomicU16>,
    pub requests: Arc<Mutex<Vec<Captured>>>,
}

impl RecordingServer {
    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(server): State<RecordingServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    server
        .requests
        .lock()
        .unwrap()
        .push(Captured { authorization, body });
    StatusCode::from_u16(server.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
}

/// Accepts JSON POSTs on any path and answers with a settable status.
/// Stands in for both the automation API and the notification gateway.
pub async fn start_recording_server(addr: SocketAddr, status: u16) -> RecordingServer {
    let server = RecordingServer {
        status: Arc::new(AtomicU16::new(status)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/", post(record))
        .route("/{*path}", post(record))
        .with_state(server.clone());

    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    server
}
