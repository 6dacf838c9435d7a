//! Recovery triggering.
//!
//! # Responsibilities
//! - Guard against concurrent heals and restart storms (cooldown)
//! - Record the attempt and move the state to Healing
//! - Dispatch the remote restart hook as a tracked background task
//! - Fold a failed dispatch back into a failed attempt
//!
//! # Design Decisions
//! - A skipped heal has no side effects at all
//! - The hook is fire-and-forget: it only starts the remote workflow, the
//!   verifier decides whether the bridge actually came back
//! - Dispatch tasks live in the loop's JoinSet so shutdown can join them

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::config::{LoopConfig, RemoteExecutionConfig};
use crate::health::state::WatchdogState;
use crate::observability::metrics;
use crate::recovery::attempt::{AttemptOutcome, PendingAttempt, RecoveryAttempt};

/// Errors raised while dispatching the restart hook.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("automation API rejected dispatch with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// The remote-execution hook that restarts the bridge.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Ask the automation system to start the restart workflow. Returns as
    /// soon as the request is accepted.
    async fn dispatch(&self, reason: &str) -> Result<(), DispatchError>;
}

#[derive(Serialize)]
struct DispatchRequest<'a> {
    workflow: &'a str,
    #[serde(rename = "ref")]
    git_ref: &'a str,
    inputs: DispatchInputs<'a>,
}

#[derive(Serialize)]
struct DispatchInputs<'a> {
    reason: &'a str,
}

/// CI/CD workflow dispatch over HTTP.
pub struct WorkflowDispatcher {
    client: Client,
    endpoint: String,
    credential: Option<String>,
    workflow: String,
    git_ref: String,
    timeout: Duration,
}

impl WorkflowDispatcher {
    pub fn new(config: &RemoteExecutionConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            credential: config.credential.clone(),
            workflow: config.workflow.clone(),
            git_ref: config.git_ref.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl RemoteExecutor for WorkflowDispatcher {
    async fn dispatch(&self, reason: &str) -> Result<(), DispatchError> {
        let body = DispatchRequest {
            workflow: &self.workflow,
            git_ref: &self.git_ref,
            inputs: DispatchInputs { reason },
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("accept", "application/json")
            .header("user-agent", "bridge-watchdog")
            .json(&body);
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential);
        }

        let response = match time::timeout(self.timeout, request.send()).await {
            Ok(response) => response?,
            Err(_) => return Err(DispatchError::Timeout(self.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Result of a dispatch task, handed back to the loop.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub attempt_id: Uuid,
    pub result: Result<(), DispatchError>,
}

/// Why a heal request did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    InProgress,
    CoolingDown { remaining_secs: u64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InProgress => write!(f, "a recovery is already in progress"),
            SkipReason::CoolingDown { remaining_secs } => {
                write!(f, "cooldown active for another {}s", remaining_secs)
            }
        }
    }
}

/// What `attempt_heal` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HealDecision {
    Dispatched(PendingAttempt),
    Skipped(SkipReason),
}

/// Starts remote restarts, at most one at a time and no more often than
/// the cooldown allows.
pub struct RecoveryTrigger {
    executor: Arc<dyn RemoteExecutor>,
    method: String,
    cooldown: Duration,
    verification_delay: Duration,
    dispatch_timeout: Duration,
}

impl RecoveryTrigger {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        method: impl Into<String>,
        cooldown: Duration,
        verification_delay: Duration,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            method: method.into(),
            cooldown,
            verification_delay,
            dispatch_timeout,
        }
    }

    pub fn from_config(
        executor: Arc<dyn RemoteExecutor>,
        loop_config: &LoopConfig,
        remote: &RemoteExecutionConfig,
    ) -> Self {
        Self::new(
            executor,
            remote.method.clone(),
            loop_config.healing_cooldown(),
            loop_config.verification_delay(),
            Duration::from_secs(remote.timeout_secs),
        )
    }

    /// Check the in-progress guard and the cooldown.
    pub fn check_preconditions(
        &self,
        state: &WatchdogState,
        now: DateTime<Utc>,
    ) -> Result<(), SkipReason> {
        if state.healing_in_progress() {
            return Err(SkipReason::InProgress);
        }
        if let Some(last) = state.last_healing_attempt_at() {
            let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Err(SkipReason::CoolingDown {
                    remaining_secs: remaining.as_secs_f64().ceil() as u64,
                });
            }
        }
        Ok(())
    }

    /// Start a heal unless a guard blocks it.
    ///
    /// On dispatch the state moves to Healing with verification scheduled
    /// `verification_delay` from now, and the hook call is spawned onto
    /// `inflight`.
    pub fn attempt_heal(
        &self,
        state: &mut WatchdogState,
        now: DateTime<Utc>,
        reason: &str,
        forced: bool,
        inflight: &mut JoinSet<DispatchOutcome>,
    ) -> HealDecision {
        if let Err(skip) = self.check_preconditions(state, now) {
            tracing::debug!(reason = %skip, "Heal skipped");
            metrics::record_heal_dispatch("skipped");
            return HealDecision::Skipped(skip);
        }

        let attempt = PendingAttempt::new(now, &self.method, reason, forced);
        state.begin_healing(attempt.clone(), Instant::now() + self.verification_delay);

        tracing::warn!(
            attempt_id = %attempt.id,
            method = %attempt.method,
            consecutive_failures = state.consecutive_failures(),
            forced,
            reason,
            "Dispatching remote restart"
        );

        let executor = self.executor.clone();
        let timeout = self.dispatch_timeout;
        let attempt_id = attempt.id;
        let reason = reason.to_string();
        inflight.spawn(async move {
            let result = match time::timeout(timeout, executor.dispatch(&reason)).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(timeout)),
            };
            DispatchOutcome { attempt_id, result }
        });

        HealDecision::Dispatched(attempt)
    }

    /// Apply a finished dispatch task to the state.
    ///
    /// A successful dispatch leaves the state Healing. A failed one ends the
    /// attempt immediately so a later cycle may retry. Returns the finalized
    /// attempt in that case.
    pub fn complete_dispatch(
        &self,
        state: &mut WatchdogState,
        outcome: DispatchOutcome,
        now: DateTime<Utc>,
    ) -> Option<RecoveryAttempt> {
        match outcome.result {
            Ok(()) => {
                tracing::info!(attempt_id = %outcome.attempt_id, "Remote restart dispatched");
                metrics::record_heal_dispatch("dispatched");
                state.dispatch_confirmed();
                None
            }
            Err(e) => {
                metrics::record_heal_dispatch("failed");
                let pending = state.abandon_healing(outcome.attempt_id)?;
                tracing::warn!(
                    attempt_id = %pending.id,
                    error = %e,
                    dispatch_failures = state.dispatch_failures(),
                    "Remote restart dispatch failed"
                );
                let outage = state.tracker().outage_started_at();
                Some(pending.finalize(
                    AttemptOutcome::DispatchFailed {
                        error: e.to_string(),
                    },
                    now,
                    outage,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::{HealthCheckResult, HealthThresholds};
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingExecutor {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl RemoteExecutor for CountingExecutor {
        async fn dispatch(&self, _reason: &str) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DispatchError::Rejected {
                    status: 503,
                    body: "down".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn trigger(fail: bool) -> (RecoveryTrigger, Arc<CountingExecutor>) {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicU32::new(0),
            fail,
        });
        let trigger = RecoveryTrigger::new(
            executor.clone(),
            "remote-workflow-restart",
            Duration::from_secs(300),
            Duration::from_secs(20),
            Duration::from_secs(5),
        );
        (trigger, executor)
    }

    fn failing_state() -> WatchdogState {
        let mut state = WatchdogState::new(3);
        for _ in 0..3 {
            state.record(&HealthCheckResult::unreachable(
                Utc::now(),
                &HealthThresholds::default(),
            ));
        }
        state
    }

    #[tokio::test]
    async fn test_back_to_back_heals_dispatch_once() {
        let (trigger, executor) = trigger(false);
        let mut state = failing_state();
        let mut inflight = JoinSet::new();
        let now = Utc::now();

        let first = trigger.attempt_heal(&mut state, now, "threshold", false, &mut inflight);
        let second = trigger.attempt_heal(&mut state, now, "threshold", false, &mut inflight);

        assert!(matches!(first, HealDecision::Dispatched(_)));
        assert_eq!(second, HealDecision::Skipped(SkipReason::InProgress));

        while inflight.join_next().await.is_some() {}
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.last_healing_attempt_at(), Some(now));
    }

    #[tokio::test]
    async fn test_cooldown_blocks_without_side_effects() {
        let (trigger, executor) = trigger(false);
        let mut state = failing_state();
        let mut inflight = JoinSet::new();
        let started = Utc::now();

        trigger.attempt_heal(&mut state, started, "threshold", false, &mut inflight);
        let outcome = inflight.join_next().await.unwrap().unwrap();
        trigger.complete_dispatch(&mut state, outcome, started);
        state.begin_verification();
        state.finish_verification(false);

        let later = started + ChronoDuration::seconds(100);
        let decision = trigger.attempt_heal(&mut state, later, "threshold", false, &mut inflight);

        assert_eq!(
            decision,
            HealDecision::Skipped(SkipReason::CoolingDown { remaining_secs: 200 })
        );
        assert!(inflight.is_empty());
        assert!(!state.healing_in_progress());
        assert_eq!(state.last_healing_attempt_at(), Some(started));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

        let after_cooldown = started + ChronoDuration::seconds(300);
        let decision =
            trigger.attempt_heal(&mut state, after_cooldown, "threshold", false, &mut inflight);
        assert!(matches!(decision, HealDecision::Dispatched(_)));
    }

    #[tokio::test]
    async fn test_failed_dispatch_clears_healing() {
        let (trigger, _executor) = trigger(true);
        let mut state = failing_state();
        let mut inflight = JoinSet::new();

        trigger.attempt_heal(&mut state, Utc::now(), "threshold", false, &mut inflight);
        let outcome = inflight.join_next().await.unwrap().unwrap();
        let attempt = trigger
            .complete_dispatch(&mut state, outcome, Utc::now())
            .expect("failed dispatch finalizes the attempt");

        assert!(!attempt.succeeded);
        assert!(matches!(attempt.outcome, AttemptOutcome::DispatchFailed { .. }));
        assert!(!state.healing_in_progress());
        assert_eq!(state.consecutive_failures(), 3);
        assert_eq!(state.dispatch_failures(), 1);
    }
}
