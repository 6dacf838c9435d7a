//! Post-restart verification.
//!
//! Runs once the Healing deadline passes: one more probe decides whether the
//! attempt succeeded. Both verdicts return the state to Monitoring; only a
//! healthy verdict clears the failure counter.

use std::sync::Arc;

use crate::health::probe::{HealthCheckResult, HealthProbe};
use crate::health::state::WatchdogState;
use crate::observability::metrics;
use crate::recovery::attempt::{AttemptOutcome, PendingAttempt, RecoveryAttempt};

/// Verdict of a verification probe.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub attempt: RecoveryAttempt,
    pub result: HealthCheckResult,
}

pub struct RecoveryVerifier {
    probe: Arc<dyn HealthProbe>,
}

impl RecoveryVerifier {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        Self { probe }
    }

    /// Re-probe and close the in-flight attempt. Returns `None` when no heal
    /// is in progress.
    pub async fn verify(&self, state: &mut WatchdogState) -> Option<VerificationReport> {
        let pending = self.begin(state)?;
        Some(self.conclude(state, pending).await)
    }

    /// Healing → Verifying. Callers publish the state between this and
    /// [`RecoveryVerifier::conclude`] so the probe is visible as `verifying`.
    pub fn begin(&self, state: &mut WatchdogState) -> Option<PendingAttempt> {
        let pending = state.begin_verification()?;
        tracing::info!(attempt_id = %pending.id, "Verifying bridge after restart");
        Some(pending)
    }

    /// Run the verification probe and finalize `pending`.
    pub async fn conclude(
        &self,
        state: &mut WatchdogState,
        pending: PendingAttempt,
    ) -> VerificationReport {
        let result = self.probe.check().await;
        state.observe(&result);

        let recovered = result.is_healthy();
        let outage_started_at = state.tracker().outage_started_at();
        state.finish_verification(recovered);

        let outcome = if recovered {
            AttemptOutcome::Recovered
        } else {
            AttemptOutcome::StillUnhealthy
        };
        let attempt = pending.finalize(outcome, result.timestamp(), outage_started_at);
        metrics::record_recovery(recovered);

        if recovered {
            tracing::info!(
                attempt_id = %attempt.id,
                downtime_secs = attempt.downtime_secs,
                "Bridge recovered"
            );
        } else {
            tracing::error!(
                attempt_id = %attempt.id,
                consecutive_failures = state.consecutive_failures(),
                failed_checks = ?result.failed_checks(),
                "Bridge still unhealthy after restart"
            );
        }

        VerificationReport { attempt, result }
    }
}
