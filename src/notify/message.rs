//! Operator messages.
//!
//! Messages are built from immutable copies of the attempt and the state
//! snapshot, so they can be sent from another task without touching the
//! watchdog state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::health::probe::HealthCheck;
use crate::health::state::StatusSnapshot;
use crate::recovery::attempt::RecoveryAttempt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Informational: the bridge came back after a restart.
    Recovered,
    /// Manual intervention required.
    Critical,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Recovered => "recovered",
            NotificationKind::Critical => "critical",
        }
    }
}

/// Diagnostic context carried by every message.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationBody {
    pub summary: String,
    pub attempt: RecoveryAttempt,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub last_healing_attempt_at: Option<DateTime<Utc>>,
    pub dispatch_failures: u32,
    pub failed_checks: Vec<HealthCheck>,
    pub data_freshness_minutes: Option<f64>,
    pub synced_fraction: Option<f64>,
    pub probe_detail: Option<String>,
}

/// A message for the notification gateway.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub body: NotificationBody,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// The bridge is healthy again after a restart.
    pub fn recovered(recipient: &str, attempt: &RecoveryAttempt, snapshot: &StatusSnapshot) -> Self {
        let summary = format!(
            "Bridge recovered after {} (downtime {}s).",
            attempt.method, attempt.downtime_secs
        );
        Self::build(
            NotificationKind::Recovered,
            recipient,
            "[bridge-watchdog] Bridge recovered".to_string(),
            summary,
            attempt,
            snapshot,
        )
    }

    /// The bridge is still unhealthy after a restart.
    pub fn unrecovered(recipient: &str, attempt: &RecoveryAttempt, snapshot: &StatusSnapshot) -> Self {
        let summary = format!(
            "Bridge still unhealthy after {}. Manual intervention required.",
            attempt.method
        );
        Self::build(
            NotificationKind::Critical,
            recipient,
            "[bridge-watchdog] CRITICAL: bridge did not recover".to_string(),
            summary,
            attempt,
            snapshot,
        )
    }

    /// The restart hook has failed repeatedly.
    pub fn dispatch_failing(recipient: &str, attempt: &RecoveryAttempt, snapshot: &StatusSnapshot) -> Self {
        let summary = format!(
            "Restart hook failed {} times in a row; the bridge cannot be healed automatically.",
            snapshot.dispatch_failures
        );
        Self::build(
            NotificationKind::Critical,
            recipient,
            "[bridge-watchdog] CRITICAL: restart hook unreachable".to_string(),
            summary,
            attempt,
            snapshot,
        )
    }

    fn build(
        kind: NotificationKind,
        recipient: &str,
        subject: String,
        summary: String,
        attempt: &RecoveryAttempt,
        snapshot: &StatusSnapshot,
    ) -> Self {
        let last = snapshot.last_result.as_ref();
        Self {
            kind,
            recipient: recipient.to_string(),
            subject,
            body: NotificationBody {
                summary,
                attempt: attempt.clone(),
                consecutive_failures: snapshot.consecutive_failures,
                failure_threshold: snapshot.failure_threshold,
                last_healing_attempt_at: snapshot.last_healing_attempt_at,
                dispatch_failures: snapshot.dispatch_failures,
                failed_checks: last.map(|r| r.failed_checks().to_vec()).unwrap_or_default(),
                data_freshness_minutes: last.and_then(|r| r.data_freshness_minutes()),
                synced_fraction: last.map(|r| r.synced_fraction()),
                probe_detail: last.and_then(|r| r.detail().map(str::to_string)),
            },
            created_at: Utc::now(),
        }
    }

    /// Plain-text rendering for mail-style gateways.
    pub fn text(&self) -> String {
        let body = &self.body;
        let failed = if body.failed_checks.is_empty() {
            "none".to_string()
        } else {
            body.failed_checks
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let last_heal = body
            .last_healing_attempt_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let freshness = body
            .data_freshness_minutes
            .map(|m| format!("{:.1} min", m))
            .unwrap_or_else(|| "unknown".to_string());

        let mut text = format!(
            "{}\n\n\
             Attempt: {} ({})\n\
             Triggered: {}\n\
             Consecutive failures: {} (threshold {})\n\
             Last healing attempt: {}\n\
             Failed checks: {}\n\
             Data freshness: {}\n",
            body.summary,
            body.attempt.id,
            body.attempt.reason,
            body.attempt.triggered_at.format("%Y-%m-%d %H:%M:%S UTC"),
            body.consecutive_failures,
            body.failure_threshold,
            last_heal,
            failed,
            freshness,
        );
        if let Some(fraction) = body.synced_fraction {
            text.push_str(&format!("Synced accounts: {:.0}%\n", fraction * 100.0));
        }
        if let Some(detail) = &body.probe_detail {
            text.push_str(&format!("Probe detail: {}\n", detail));
        }
        text
    }
}
