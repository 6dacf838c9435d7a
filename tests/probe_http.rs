//! HTTP collaborators against mock servers: bridge probe, restart hook,
//! notification webhook.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::json;

use bridge_watchdog::config::{BridgeConfig, RemoteExecutionConfig};
use bridge_watchdog::health::probe::{BridgeProbe, HealthCheck, HealthProbe};
use bridge_watchdog::health::state::WatchdogState;
use bridge_watchdog::notify::{Notification, NotificationGateway, WebhookGateway};
use bridge_watchdog::recovery::attempt::{AttemptOutcome, PendingAttempt, RecoveryLog};
use bridge_watchdog::recovery::trigger::{DispatchError, RemoteExecutor, WorkflowDispatcher};

mod common;
use common::account;

fn bridge_config(addr: SocketAddr) -> BridgeConfig {
    BridgeConfig {
        base_url: format!("http://{}", addr),
        timeout_secs: 1,
        ..BridgeConfig::default()
    }
}

#[tokio::test]
async fn test_probe_healthy_bridge() {
    let addr: SocketAddr = "127.0.0.1:28281".parse().unwrap();
    let _bridge = common::start_mock_bridge(addr).await;

    let result = BridgeProbe::new(&bridge_config(addr)).check().await;

    assert!(result.is_healthy(), "{result:?}");
    assert!(result.bridge_reachable());
    assert_eq!(result.synced_fraction(), 1.0);
    assert!(result.data_freshness_minutes().unwrap() < 2.0);
}

#[tokio::test]
async fn test_probe_stale_accounts_fail_coverage() {
    let addr: SocketAddr = "127.0.0.1:28282".parse().unwrap();
    let bridge = common::start_mock_bridge(addr).await;
    bridge.set_health(json!({
        "status": "ok",
        "accounts": [account(1, 1), account(2, 45), account(3, 90)],
    }));

    let result = BridgeProbe::new(&bridge_config(addr)).check().await;

    assert!(!result.is_healthy());
    assert!(result.bridge_reachable());
    assert_eq!(result.failed_checks(), &[HealthCheck::SyncCoverage]);
}

#[tokio::test]
async fn test_probe_error_status_is_unreachable() {
    let addr: SocketAddr = "127.0.0.1:28283".parse().unwrap();
    let bridge = common::start_mock_bridge(addr).await;
    bridge.set_status(503);

    let result = BridgeProbe::new(&bridge_config(addr)).check().await;

    assert!(!result.bridge_reachable());
    assert!(result.failed_checks().contains(&HealthCheck::BridgeReachable));
    assert!(result.detail().unwrap().contains("503"));
}

#[tokio::test]
async fn test_probe_timeout_is_unreachable() {
    let addr: SocketAddr = "127.0.0.1:28284".parse().unwrap();
    let bridge = common::start_mock_bridge(addr).await;
    bridge.set_delay(Duration::from_secs(3));

    let started = std::time::Instant::now();
    let result = BridgeProbe::new(&bridge_config(addr)).check().await;

    assert!(!result.bridge_reachable());
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(result.detail().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_probe_connection_refused_is_unreachable() {
    let addr: SocketAddr = "127.0.0.1:28285".parse().unwrap();

    let result = BridgeProbe::new(&bridge_config(addr)).check().await;

    assert!(!result.bridge_reachable());
    assert!(!result.is_healthy());
}

#[tokio::test]
async fn test_probe_self_reported_outage() {
    let addr: SocketAddr = "127.0.0.1:28286".parse().unwrap();
    let bridge = common::start_mock_bridge(addr).await;
    bridge.set_health(json!({ "status": "mt5 disconnected", "reachable": false }));

    let result = BridgeProbe::new(&bridge_config(addr)).check().await;

    assert!(!result.bridge_reachable());
    assert!(result.detail().unwrap().contains("mt5 disconnected"));
}

#[tokio::test]
async fn test_probe_reads_separate_accounts_endpoint() {
    let addr: SocketAddr = "127.0.0.1:28287".parse().unwrap();
    let bridge = common::start_mock_bridge(addr).await;
    bridge.set_health(json!({ "status": "ok" }));
    bridge.set_accounts(json!({ "accounts": [account(1, 3), account(2, 4)] }));

    let config = BridgeConfig {
        accounts_path: Some("/accounts".to_string()),
        ..bridge_config(addr)
    };
    let result = BridgeProbe::new(&config).check().await;

    assert!(result.is_healthy(), "{result:?}");
    assert_eq!(bridge.hits(), 2);
}

#[tokio::test]
async fn test_dispatcher_posts_workflow_with_credential() {
    let addr: SocketAddr = "127.0.0.1:28288".parse().unwrap();
    let hook = common::start_recording_server(addr, 204).await;

    let dispatcher = WorkflowDispatcher::new(&RemoteExecutionConfig {
        endpoint: format!("http://{}/repos/ops/bridge/actions/dispatches", addr),
        credential: Some("ci-token".to_string()),
        ..RemoteExecutionConfig::default()
    });
    dispatcher.dispatch("3 consecutive failed health checks").await.unwrap();

    let requests = hook.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer ci-token"));
    assert_eq!(requests[0].body["workflow"], "restart-bridge.yml");
    assert_eq!(requests[0].body["ref"], "main");
    assert_eq!(
        requests[0].body["inputs"]["reason"],
        "3 consecutive failed health checks"
    );
}

#[tokio::test]
async fn test_dispatcher_surfaces_rejection() {
    let addr: SocketAddr = "127.0.0.1:28289".parse().unwrap();
    let _hook = common::start_recording_server(addr, 401).await;

    let dispatcher = WorkflowDispatcher::new(&RemoteExecutionConfig {
        endpoint: format!("http://{}/dispatches", addr),
        ..RemoteExecutionConfig::default()
    });
    let err = dispatcher.dispatch("test").await.unwrap_err();

    assert!(matches!(err, DispatchError::Rejected { status: 401, .. }));
}

#[tokio::test]
async fn test_webhook_gateway_sends_structured_message() {
    let addr: SocketAddr = "127.0.0.1:28290".parse().unwrap();
    let relay = common::start_recording_server(addr, 200).await;

    let attempt = PendingAttempt::new(chrono::Utc::now(), "remote-workflow-restart", "test", false)
        .finalize(AttemptOutcome::StillUnhealthy, chrono::Utc::now(), None);
    let snapshot = WatchdogState::new(3).snapshot(&RecoveryLog::new(0, None));
    let notification = Notification::unrecovered("ops@example.com", &attempt, &snapshot);

    let gateway = WebhookGateway::new(
        format!("http://{}/send", addr),
        Some("relay-key".to_string()),
        Duration::from_secs(2),
    );
    gateway.send(&notification).await.unwrap();

    let requests = relay.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer relay-key"));
    assert_eq!(requests[0].body["to"], "ops@example.com");
    assert_eq!(requests[0].body["severity"], "critical");
    assert_eq!(requests[0].body["body"]["attempt"]["succeeded"], false);
}
