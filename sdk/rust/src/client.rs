use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("watchdog returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result of one health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub timestamp: String,
    pub bridge_reachable: bool,
    pub data_freshness_minutes: Option<f64>,
    pub synced_fraction: f64,
    pub healthy: bool,
    #[serde(default)]
    pub failed_checks: Vec<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// A pending or finished recovery attempt. Fields only present on finished
/// attempts are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub id: String,
    pub triggered_at: String,
    pub method: String,
    pub reason: String,
    pub forced: bool,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub succeeded: Option<bool>,
    #[serde(default)]
    pub downtime_secs: Option<u64>,
    #[serde(default)]
    pub outcome: Option<Value>,
}

/// `GET /watchdog/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogStatus {
    pub phase: String,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub healing_in_progress: bool,
    pub current_attempt: Option<AttemptSummary>,
    pub last_healing_attempt_at: Option<String>,
    pub last_check_at: Option<String>,
    pub last_result: Option<ProbeResult>,
    pub dispatch_failures: u32,
    pub outage_started_at: Option<String>,
    #[serde(default)]
    pub recent_attempts: Vec<AttemptSummary>,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub generated_at: String,
}

/// `POST /watchdog/force-heal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HealDecision {
    Dispatched {
        id: String,
        triggered_at: String,
        reason: String,
    },
    Skipped {
        reason: String,
        #[serde(default)]
        remaining_secs: Option<u64>,
    },
}

#[derive(Clone)]
pub struct WatchdogClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl WatchdogClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub async fn status(&self) -> Result<WatchdogStatus, ClientError> {
        self.decode(self.status_raw().await?)
    }

    pub async fn force_sync(&self) -> Result<ProbeResult, ClientError> {
        self.decode(self.force_sync_raw().await?)
    }

    pub async fn force_heal(&self, reason: Option<&str>) -> Result<HealDecision, ClientError> {
        self.decode(self.force_heal_raw(reason).await?)
    }

    pub async fn status_raw(&self) -> Result<Value, ClientError> {
        self.send(self.client.get(self.url("/watchdog/status"))).await
    }

    pub async fn force_sync_raw(&self) -> Result<Value, ClientError> {
        self.send(self.client.post(self.url("/watchdog/force-sync"))).await
    }

    pub async fn force_heal_raw(&self, reason: Option<&str>) -> Result<Value, ClientError> {
        let mut request = self.client.post(self.url("/watchdog/force-heal"));
        if let Some(reason) = reason {
            request = request.json(&serde_json::json!({ "reason": reason }));
        }
        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, mut request: RequestBuilder) -> Result<Value, ClientError> {
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status { status, body: text });
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T, ClientError> {
        Ok(serde_json::from_value(value)?)
    }
}
