//! Bridge health probing.
//!
//! # Responsibilities
//! - Call the bridge status endpoint with a bounded timeout
//! - Fetch per-account sync timestamps when the bridge is reachable
//! - Reduce them to data freshness and synced fraction
//! - Always return a result; network errors become unhealthy results

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time;

use crate::config::BridgeConfig;

/// One of the three sub-checks that make up bridge health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCheck {
    BridgeReachable,
    DataFreshness,
    SyncCoverage,
}

impl std::fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthCheck::BridgeReachable => write!(f, "bridge reachable"),
            HealthCheck::DataFreshness => write!(f, "data freshness"),
            HealthCheck::SyncCoverage => write!(f, "sync coverage"),
        }
    }
}

/// Limits a probe result is judged against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    /// Maximum data age in minutes that still counts as fresh.
    pub freshness_minutes: f64,
    /// Minimum share of accounts with fresh data.
    pub min_synced_fraction: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            freshness_minutes: 15.0,
            min_synced_fraction: 0.5,
        }
    }
}

impl From<&BridgeConfig> for HealthThresholds {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            freshness_minutes: config.data_freshness_threshold_minutes,
            min_synced_fraction: config.min_synced_fraction,
        }
    }
}

/// Outcome of a single probe.
///
/// `healthy` and `failed_checks` are derived from the measured fields in
/// [`HealthCheckResult::evaluate`] and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckResult {
    timestamp: DateTime<Utc>,
    bridge_reachable: bool,
    data_freshness_minutes: Option<f64>,
    synced_fraction: f64,
    healthy: bool,
    failed_checks: Vec<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl HealthCheckResult {
    /// Judge measured values against the thresholds.
    pub fn evaluate(
        timestamp: DateTime<Utc>,
        bridge_reachable: bool,
        data_freshness_minutes: Option<f64>,
        synced_fraction: f64,
        thresholds: &HealthThresholds,
    ) -> Self {
        let synced_fraction = synced_fraction.clamp(0.0, 1.0);

        let mut failed_checks = Vec::new();
        if !bridge_reachable {
            failed_checks.push(HealthCheck::BridgeReachable);
        }
        match data_freshness_minutes {
            Some(age) if age <= thresholds.freshness_minutes => {}
            _ => failed_checks.push(HealthCheck::DataFreshness),
        }
        if synced_fraction < thresholds.min_synced_fraction {
            failed_checks.push(HealthCheck::SyncCoverage);
        }

        Self {
            timestamp,
            bridge_reachable,
            data_freshness_minutes,
            synced_fraction,
            healthy: failed_checks.is_empty(),
            failed_checks,
            detail: None,
        }
    }

    /// Result for a bridge that could not be reached at all.
    pub fn unreachable(timestamp: DateTime<Utc>, thresholds: &HealthThresholds) -> Self {
        Self::evaluate(timestamp, false, None, 0.0, thresholds)
    }

    /// Attach a human-readable description of what went wrong.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn bridge_reachable(&self) -> bool {
        self.bridge_reachable
    }

    pub fn data_freshness_minutes(&self) -> Option<f64> {
        self.data_freshness_minutes
    }

    pub fn synced_fraction(&self) -> f64 {
        self.synced_fraction
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn failed_checks(&self) -> &[HealthCheck] {
        &self.failed_checks
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// Something that can report the bridge's health.
///
/// Implementations must not fail: every error is folded into an unhealthy
/// result.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> HealthCheckResult;
}

/// Per-account sync marker reported by the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSync {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default, rename = "lastUpdated", alias = "last_updated")]
    pub last_updated: Option<serde_json::Value>,
}

impl AccountSync {
    /// Parse `lastUpdated` as RFC 3339, a naive UTC timestamp, or epoch seconds.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        match self.last_updated.as_ref()? {
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| Utc.from_utc_datetime(&naive))
                }),
            serde_json::Value::Number(n) => {
                let secs = n.as_f64()?;
                DateTime::from_timestamp(secs as i64, 0)
            }
            _ => None,
        }
    }
}

/// Body of `GET <bridge>/health`.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeHealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_reachable")]
    pub reachable: bool,
    #[serde(default)]
    pub accounts: Vec<AccountSync>,
}

fn default_reachable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountsResponse {
    List(Vec<AccountSync>),
    Wrapped { accounts: Vec<AccountSync> },
}

impl AccountsResponse {
    fn into_accounts(self) -> Vec<AccountSync> {
        match self {
            AccountsResponse::List(accounts) => accounts,
            AccountsResponse::Wrapped { accounts } => accounts,
        }
    }
}

/// Reduce per-account timestamps to (age of newest data, fresh fraction).
///
/// Accounts without a parsable timestamp count as stale. With no accounts
/// the freshness is unknown and the fraction is zero.
pub fn summarize_accounts(
    accounts: &[AccountSync],
    now: DateTime<Utc>,
    fresh_minutes: f64,
) -> (Option<f64>, f64) {
    if accounts.is_empty() {
        return (None, 0.0);
    }

    let mut newest_age: Option<f64> = None;
    let mut fresh = 0usize;
    for account in accounts {
        let Some(updated) = account.last_updated_at() else {
            continue;
        };
        let age = ((now - updated).num_seconds().max(0) as f64) / 60.0;
        if age <= fresh_minutes {
            fresh += 1;
        }
        newest_age = Some(newest_age.map_or(age, |current| current.min(age)));
    }

    (newest_age, fresh as f64 / accounts.len() as f64)
}

/// Errors raised while talking to the bridge. Never escape the probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("non-success status {0}")]
    Status(reqwest::StatusCode),

    #[error("bridge reports itself unreachable (status: {0})")]
    Reported(String),
}

/// HTTP probe against the bridge's status and accounts endpoints.
pub struct BridgeProbe {
    client: Client,
    health_url: String,
    accounts_url: Option<String>,
    timeout: Duration,
    thresholds: HealthThresholds,
}

impl BridgeProbe {
    pub fn new(config: &BridgeConfig) -> Self {
        let base = config.base_url.trim_end_matches('/');
        Self {
            client: Client::new(),
            health_url: format!("{}{}", base, config.health_path),
            accounts_url: config
                .accounts_path
                .as_ref()
                .map(|path| format!("{}{}", base, path)),
            timeout: Duration::from_secs(config.timeout_secs),
            thresholds: HealthThresholds::from(config),
        }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ProbeError> {
        let request = self
            .client
            .get(url)
            .header("user-agent", "bridge-watchdog-health-check")
            .send();

        let response = match time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProbeError::Http(e)),
            Err(_) => return Err(ProbeError::Timeout(self.timeout)),
        };

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status()));
        }
        Ok(response)
    }

    async fn fetch_health(&self) -> Result<BridgeHealthResponse, ProbeError> {
        let response = self.get(&self.health_url).await?;
        let body = match time::timeout(self.timeout, response.json::<BridgeHealthResponse>()).await {
            Ok(body) => body?,
            Err(_) => return Err(ProbeError::Timeout(self.timeout)),
        };

        if !body.reachable {
            return Err(ProbeError::Reported(
                body.status.clone().unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        Ok(body)
    }

    async fn fetch_accounts(&self, url: &str) -> Result<Vec<AccountSync>, ProbeError> {
        let response = self.get(url).await?;
        match time::timeout(self.timeout, response.json::<AccountsResponse>()).await {
            Ok(body) => Ok(body?.into_accounts()),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl HealthProbe for BridgeProbe {
    async fn check(&self) -> HealthCheckResult {
        let health = match self.fetch_health().await {
            Ok(health) => health,
            Err(e) => {
                tracing::warn!(url = %self.health_url, error = %e, "Bridge health check failed");
                return HealthCheckResult::unreachable(Utc::now(), &self.thresholds)
                    .with_detail(e.to_string());
            }
        };

        let (accounts, detail) = match &self.accounts_url {
            Some(url) => match self.fetch_accounts(url).await {
                Ok(accounts) => (accounts, None),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Bridge accounts fetch failed");
                    (Vec::new(), Some(format!("accounts unavailable: {}", e)))
                }
            },
            None => (health.accounts, None),
        };

        let now = Utc::now();
        let (freshness, fraction) =
            summarize_accounts(&accounts, now, self.thresholds.freshness_minutes);
        let result = HealthCheckResult::evaluate(now, true, freshness, fraction, &self.thresholds);

        if !result.is_healthy() {
            tracing::warn!(
                accounts = accounts.len(),
                data_freshness_minutes = ?freshness,
                synced_fraction = fraction,
                failed_checks = ?result.failed_checks(),
                "Bridge reachable but data is stale"
            );
        }

        match detail {
            Some(detail) => result.with_detail(detail),
            None => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn account(minutes_ago: i64, now: DateTime<Utc>) -> AccountSync {
        AccountSync {
            id: serde_json::json!(minutes_ago),
            last_updated: Some(serde_json::json!(
                (now - ChronoDuration::minutes(minutes_ago)).to_rfc3339()
            )),
        }
    }

    #[test]
    fn test_stale_freshness_alone_fails() {
        let result =
            HealthCheckResult::evaluate(Utc::now(), true, Some(20.0), 1.0, &HealthThresholds::default());

        assert!(!result.is_healthy());
        assert_eq!(result.failed_checks(), &[HealthCheck::DataFreshness]);
    }

    #[test]
    fn test_all_checks_pass() {
        let result =
            HealthCheckResult::evaluate(Utc::now(), true, Some(2.0), 0.8, &HealthThresholds::default());

        assert!(result.is_healthy());
        assert!(result.failed_checks().is_empty());
    }

    #[test]
    fn test_unreachable_reports_every_failed_check() {
        let result = HealthCheckResult::unreachable(Utc::now(), &HealthThresholds::default())
            .with_detail("connection refused");

        assert!(!result.is_healthy());
        assert!(!result.bridge_reachable());
        assert_eq!(result.failed_checks().len(), 3);
        assert_eq!(result.detail(), Some("connection refused"));
    }

    #[test]
    fn test_low_coverage_fails_even_with_fresh_newest_record() {
        let now = Utc::now();
        let accounts = vec![account(1, now), account(40, now), account(90, now)];
        let (freshness, fraction) = summarize_accounts(&accounts, now, 15.0);

        assert_eq!(freshness, Some(1.0));
        assert!((fraction - 1.0 / 3.0).abs() < 1e-9);

        let result =
            HealthCheckResult::evaluate(now, true, freshness, fraction, &HealthThresholds::default());
        assert_eq!(result.failed_checks(), &[HealthCheck::SyncCoverage]);
    }

    #[test]
    fn test_unparsable_timestamps_count_as_stale() {
        let now = Utc::now();
        let accounts = vec![
            account(3, now),
            AccountSync {
                id: serde_json::json!("acct-2"),
                last_updated: Some(serde_json::json!("yesterday-ish")),
            },
        ];
        let (freshness, fraction) = summarize_accounts(&accounts, now, 15.0);

        assert_eq!(freshness, Some(3.0));
        assert_eq!(fraction, 0.5);
    }

    #[test]
    fn test_no_accounts_means_unknown_freshness() {
        assert_eq!(summarize_accounts(&[], Utc::now(), 15.0), (None, 0.0));
    }

    #[test]
    fn test_timestamp_formats() {
        let naive = AccountSync {
            id: serde_json::Value::Null,
            last_updated: Some(serde_json::json!("2024-03-01 12:30:00")),
        };
        let epoch = AccountSync {
            id: serde_json::Value::Null,
            last_updated: Some(serde_json::json!(1_709_296_200)),
        };

        assert_eq!(naive.last_updated_at(), epoch.last_updated_at());
    }

    #[test]
    fn test_health_body_defaults() {
        let body: BridgeHealthResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(body.reachable);
        assert!(body.accounts.is_empty());
    }
}
