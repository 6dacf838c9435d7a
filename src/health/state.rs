//! Watchdog state machine.
//!
//! # States
//! - Monitoring: steady state, polling on interval
//! - Healing: restart dispatched, waiting for the verification delay
//! - Verifying: re-probe in progress
//!
//! # State Transitions
//! ```text
//! Monitoring → Healing:    threshold crossed (or force-heal), cooldown elapsed
//! Healing → Monitoring:    dispatch failed
//! Healing → Verifying:     verification delay elapsed
//! Verifying → Monitoring:  verdict recorded (healthy resets the counter)
//! ```
//!
//! # Design Decisions
//! - Owned by the watchdog loop alone; readers get a `StatusSnapshot`
//! - The in-flight attempt lives inside the phase, so "healing" without an
//!   attempt cannot be expressed
//! - Mutators are crate-private

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::health::probe::HealthCheckResult;
use crate::health::tracker::{FailureTracker, TrackOutcome};
use crate::recovery::attempt::{PendingAttempt, RecoveryAttempt, RecoveryLog};

/// Current phase plus the data that phase needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Monitoring,
    Healing {
        attempt: PendingAttempt,
        verify_at: Instant,
    },
    Verifying {
        attempt: PendingAttempt,
    },
}

/// Phase label used in snapshots and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Monitoring,
    Healing,
    Verifying,
}

impl Phase {
    pub fn name(&self) -> PhaseName {
        match self {
            Phase::Monitoring => PhaseName::Monitoring,
            Phase::Healing { .. } => PhaseName::Healing,
            Phase::Verifying { .. } => PhaseName::Verifying,
        }
    }

    pub fn attempt(&self) -> Option<&PendingAttempt> {
        match self {
            Phase::Monitoring => None,
            Phase::Healing { attempt, .. } | Phase::Verifying { attempt } => Some(attempt),
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseName::Monitoring => write!(f, "monitoring"),
            PhaseName::Healing => write!(f, "healing"),
            PhaseName::Verifying => write!(f, "verifying"),
        }
    }
}

/// Long-lived watchdog state, single writer.
#[derive(Debug, Clone)]
pub struct WatchdogState {
    tracker: FailureTracker,
    phase: Phase,
    last_healing_attempt_at: Option<DateTime<Utc>>,
    last_check_at: Option<DateTime<Utc>>,
    last_result: Option<HealthCheckResult>,
    dispatch_failures: u32,
}

impl WatchdogState {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            tracker: FailureTracker::new(failure_threshold),
            phase: Phase::Monitoring,
            last_healing_attempt_at: None,
            last_check_at: None,
            last_result: None,
            dispatch_failures: 0,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn healing_in_progress(&self) -> bool {
        !matches!(self.phase, Phase::Monitoring)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.tracker.consecutive_failures()
    }

    pub fn tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    pub fn last_healing_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_healing_attempt_at
    }

    pub fn last_check_at(&self) -> Option<DateTime<Utc>> {
        self.last_check_at
    }

    pub fn last_result(&self) -> Option<&HealthCheckResult> {
        self.last_result.as_ref()
    }

    pub fn dispatch_failures(&self) -> u32 {
        self.dispatch_failures
    }

    /// When the pending verification is due, if a heal is in flight.
    pub fn verification_deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Healing { verify_at, .. } => Some(*verify_at),
            _ => None,
        }
    }

    /// Feed a scheduled (or forced) probe result through the tracker.
    pub(crate) fn record(&mut self, result: &HealthCheckResult) -> TrackOutcome {
        let healing = self.healing_in_progress();
        self.last_check_at = Some(result.timestamp());
        self.last_result = Some(result.clone());
        self.tracker.record(result, healing)
    }

    /// Note a verification probe without touching the counter.
    pub(crate) fn observe(&mut self, result: &HealthCheckResult) {
        self.last_check_at = Some(result.timestamp());
        self.last_result = Some(result.clone());
    }

    pub(crate) fn begin_healing(&mut self, attempt: PendingAttempt, verify_at: Instant) {
        self.last_healing_attempt_at = Some(attempt.triggered_at);
        self.phase = Phase::Healing { attempt, verify_at };
    }

    /// Abort the in-flight heal after its dispatch failed. Ignored unless
    /// `attempt_id` is the attempt currently healing.
    pub(crate) fn abandon_healing(&mut self, attempt_id: Uuid) -> Option<PendingAttempt> {
        match &self.phase {
            Phase::Healing { attempt, .. } if attempt.id == attempt_id => {}
            _ => return None,
        }
        self.dispatch_failures = self.dispatch_failures.saturating_add(1);
        match std::mem::replace(&mut self.phase, Phase::Monitoring) {
            Phase::Healing { attempt, .. } => Some(attempt),
            _ => None,
        }
    }

    pub(crate) fn dispatch_confirmed(&mut self) {
        self.dispatch_failures = 0;
    }

    /// Healing → Verifying. Returns the attempt being verified.
    pub(crate) fn begin_verification(&mut self) -> Option<PendingAttempt> {
        match std::mem::replace(&mut self.phase, Phase::Monitoring) {
            Phase::Healing { attempt, .. } => {
                self.phase = Phase::Verifying {
                    attempt: attempt.clone(),
                };
                Some(attempt)
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Verifying → Monitoring. A recovery clears the failure counter; a
    /// failed verification leaves it untouched.
    pub(crate) fn finish_verification(&mut self, recovered: bool) -> Option<PendingAttempt> {
        match std::mem::replace(&mut self.phase, Phase::Monitoring) {
            Phase::Verifying { attempt } => {
                if recovered {
                    self.tracker.reset();
                }
                Some(attempt)
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    pub fn snapshot(&self, log: &RecoveryLog) -> StatusSnapshot {
        StatusSnapshot {
            phase: self.phase.name(),
            consecutive_failures: self.tracker.consecutive_failures(),
            failure_threshold: self.tracker.threshold(),
            healing_in_progress: self.healing_in_progress(),
            current_attempt: self.phase.attempt().cloned(),
            last_healing_attempt_at: self.last_healing_attempt_at,
            last_check_at: self.last_check_at,
            last_result: self.last_result.clone(),
            dispatch_failures: self.dispatch_failures,
            outage_started_at: self.tracker.outage_started_at(),
            recent_attempts: log.recent(),
            total_attempts: log.total(),
            successful_attempts: log.succeeded(),
            generated_at: Utc::now(),
        }
    }
}

/// Read-only copy of the state published for dashboards and notifications.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: PhaseName,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub healing_in_progress: bool,
    pub current_attempt: Option<PendingAttempt>,
    pub last_healing_attempt_at: Option<DateTime<Utc>>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_result: Option<HealthCheckResult>,
    pub dispatch_failures: u32,
    pub outage_started_at: Option<DateTime<Utc>>,
    pub recent_attempts: Vec<RecoveryAttempt>,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub generated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot of a freshly started watchdog.
    pub fn initial(failure_threshold: u32) -> Self {
        WatchdogState::new(failure_threshold).snapshot(&RecoveryLog::new(0, None))
    }
}
