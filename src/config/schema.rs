//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the watchdog.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the watchdog service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Loop timing, thresholds and cooldown.
    pub watchdog: LoopConfig,

    /// Remote bridge being monitored.
    pub bridge: BridgeConfig,

    /// Remote-execution hook used to restart the bridge.
    pub remote_execution: RemoteExecutionConfig,

    /// Operator notification gateway.
    pub notification: NotificationConfig,

    /// Recovery attempt audit trail.
    pub audit: AuditConfig,

    /// Status and control API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Watchdog loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Seconds between scheduled probes.
    pub check_interval_secs: u64,

    /// Consecutive unhealthy probes before a heal is attempted.
    pub failure_threshold: u32,

    /// Minimum seconds between two recovery attempts.
    pub healing_cooldown_secs: u64,

    /// Seconds between dispatching the restart and re-probing.
    pub verification_delay_secs: u64,

    /// Consecutive dispatch failures before the operator is alerted.
    pub dispatch_failure_alert_threshold: u32,

    /// Upper bound on how long shutdown waits for an in-flight recovery.
    pub shutdown_grace_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            failure_threshold: 3,
            healing_cooldown_secs: 300,
            verification_delay_secs: 25,
            dispatch_failure_alert_threshold: 3,
            shutdown_grace_secs: 60,
        }
    }
}

impl LoopConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn healing_cooldown(&self) -> Duration {
        Duration::from_secs(self.healing_cooldown_secs)
    }

    pub fn verification_delay(&self) -> Duration {
        Duration::from_secs(self.verification_delay_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Bridge health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the bridge (e.g., "http://10.0.0.5:8000").
    pub base_url: String,

    /// Path of the status endpoint.
    pub health_path: String,

    /// Optional path returning per-account sync timestamps. When unset the
    /// accounts are read from the health response body.
    pub accounts_path: Option<String>,

    /// Timeout for each probe request in seconds.
    pub timeout_secs: u64,

    /// Maximum data age, in minutes, that still counts as fresh.
    pub data_freshness_threshold_minutes: f64,

    /// Minimum share of accounts with fresh data.
    pub min_synced_fraction: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            health_path: "/health".to_string(),
            accounts_path: None,
            timeout_secs: 10,
            data_freshness_threshold_minutes: 15.0,
            min_synced_fraction: 0.5,
        }
    }
}

/// Remote-execution (CI/CD automation) hook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteExecutionConfig {
    /// Dispatch endpoint of the automation API.
    pub endpoint: String,

    /// Bearer credential for the automation API.
    pub credential: Option<String>,

    /// Name of the restart workflow.
    pub workflow: String,

    /// Git ref the workflow runs on.
    pub git_ref: String,

    /// Label recorded on each recovery attempt.
    pub method: String,

    /// Dispatch request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RemoteExecutionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8090/dispatches".to_string(),
            credential: None,
            workflow: "restart-bridge.yml".to_string(),
            git_ref: "main".to_string(),
            method: "remote-workflow-restart".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Notification gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Gateway URL. Without one, notifications are only logged.
    pub gateway_url: Option<String>,

    /// Bearer credential for the gateway.
    pub credential: Option<String>,

    /// Operator address the messages go to.
    pub recipient: String,

    /// Send timeout in seconds.
    pub timeout_secs: u64,

    /// Attempts per message before it is dropped.
    pub max_attempts: u32,

    /// Base delay for retry backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for retry backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Pending messages held before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            credential: None,
            recipient: "ops@localhost".to_string(),
            timeout_secs: 10,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            queue_capacity: 64,
        }
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Optional JSON-lines file recovery attempts are appended to.
    pub path: Option<String>,

    /// Number of recent attempts kept in memory for the status endpoint.
    pub history_len: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            history_len: 20,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the status and control API.
    pub enabled: bool,

    /// Bind address for the API.
    pub bind_address: String,

    /// Bearer token required on every route when set.
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
