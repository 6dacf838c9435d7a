//! The watchdog loop.
//!
//! # Responsibilities
//! - Probe the bridge on a fixed interval, strictly one probe at a time
//! - Feed results to the failure tracker and trigger heals
//! - Apply dispatch outcomes and run verification when it falls due
//! - Serve force-sync / force-heal commands between probes
//! - Publish a snapshot after every state change
//!
//! # Design Decisions
//! - Single task owns `WatchdogState`; no locks on the hot path
//! - Shutdown stops new probes but lets an in-flight recovery verify first

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::WatchdogConfig;
use crate::health::probe::{HealthCheckResult, HealthProbe};
use crate::health::state::{StatusSnapshot, WatchdogState};
use crate::notify::Notifier;
use crate::observability::metrics;
use crate::recovery::attempt::{RecoveryAttempt, RecoveryLog};
use crate::recovery::trigger::{DispatchOutcome, HealDecision, RecoveryTrigger};
use crate::recovery::verifier::RecoveryVerifier;
use crate::watchdog::command::{WatchdogCommand, WatchdogHandle};

/// Timing and thresholds for the loop itself.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub check_interval: Duration,
    pub failure_threshold: u32,
    pub dispatch_failure_alert_threshold: u32,
    pub shutdown_grace: Duration,
    pub command_timeout: Duration,
    pub command_queue: usize,
}

impl From<&WatchdogConfig> for LoopSettings {
    fn from(config: &WatchdogConfig) -> Self {
        Self {
            check_interval: config.watchdog.check_interval(),
            failure_threshold: config.watchdog.failure_threshold,
            dispatch_failure_alert_threshold: config.watchdog.dispatch_failure_alert_threshold,
            shutdown_grace: config.watchdog.shutdown_grace(),
            command_timeout: Duration::from_secs(config.admin.request_timeout_secs),
            command_queue: 16,
        }
    }
}

enum Event {
    Shutdown,
    Tick,
    VerificationDue,
    Dispatch(Result<DispatchOutcome, JoinError>),
    Command(WatchdogCommand),
}

pub struct WatchdogLoop {
    settings: LoopSettings,
    state: WatchdogState,
    probe: Arc<dyn HealthProbe>,
    trigger: RecoveryTrigger,
    verifier: RecoveryVerifier,
    notifier: Notifier,
    log: RecoveryLog,
    published: Arc<ArcSwap<StatusSnapshot>>,
    inflight: JoinSet<DispatchOutcome>,
    commands: mpsc::Receiver<WatchdogCommand>,
}

impl WatchdogLoop {
    pub fn new(
        settings: LoopSettings,
        probe: Arc<dyn HealthProbe>,
        trigger: RecoveryTrigger,
        notifier: Notifier,
        log: RecoveryLog,
    ) -> (Self, WatchdogHandle) {
        let state = WatchdogState::new(settings.failure_threshold);
        let published = Arc::new(ArcSwap::from_pointee(state.snapshot(&log)));
        let (tx, commands) = mpsc::channel(settings.command_queue.max(1));
        let handle = WatchdogHandle::new(published.clone(), tx, settings.command_timeout);

        let watchdog = Self {
            verifier: RecoveryVerifier::new(probe.clone()),
            settings,
            state,
            probe,
            trigger,
            notifier,
            log,
            published,
            inflight: JoinSet::new(),
            commands,
        };
        (watchdog, handle)
    }

    pub fn state(&self) -> &WatchdogState {
        &self.state
    }

    pub fn recovery_log(&self) -> &RecoveryLog {
        &self.log
    }

    /// Run until the shutdown signal fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.settings.check_interval,
            failure_threshold = self.settings.failure_threshold,
            "Watchdog loop starting"
        );

        let mut ticker = time::interval(self.settings.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.state.verification_deadline();
            let has_inflight = !self.inflight.is_empty();

            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => Event::Shutdown,
                _ = wait_until(deadline), if deadline.is_some() => Event::VerificationDue,
                Some(joined) = self.inflight.join_next(), if has_inflight => Event::Dispatch(joined),
                Some(command) = self.commands.recv() => Event::Command(command),
                _ = ticker.tick() => Event::Tick,
            };

            match event {
                Event::Shutdown => {
                    tracing::info!("Watchdog received shutdown signal, exiting loop");
                    break;
                }
                Event::Tick => {
                    self.run_cycle().await;
                }
                Event::VerificationDue => {
                    self.verify_now().await;
                }
                Event::Dispatch(joined) => self.apply_joined(joined),
                Event::Command(command) => self.handle_command(command).await,
            }
        }

        self.finish().await;
        tracing::info!("Watchdog loop stopped");
    }

    /// One monitoring cycle: probe, track, heal if the threshold says so.
    pub async fn run_cycle(&mut self) -> HealthCheckResult {
        let started = std::time::Instant::now();
        let result = self.probe.check().await;
        metrics::record_probe(result.is_healthy(), result.synced_fraction(), started);

        let was_failing = self.state.consecutive_failures() > 0;
        let outcome = self.state.record(&result);
        metrics::record_consecutive_failures(outcome.consecutive_failures);

        if result.is_healthy() {
            if was_failing {
                tracing::info!("Bridge healthy again");
            } else {
                tracing::debug!(synced_fraction = result.synced_fraction(), "Bridge healthy");
            }
        } else {
            tracing::warn!(
                consecutive_failures = outcome.consecutive_failures,
                threshold = self.settings.failure_threshold,
                failed_checks = ?result.failed_checks(),
                detail = result.detail().unwrap_or(""),
                phase = %self.state.phase().name(),
                "Bridge unhealthy"
            );
        }

        let retry_due =
            !self.state.healing_in_progress() && self.state.tracker().at_or_past_threshold();
        if outcome.crossed_threshold || retry_due {
            if outcome.crossed_threshold {
                tracing::warn!(
                    consecutive_failures = outcome.consecutive_failures,
                    "Failure threshold crossed"
                );
            }
            let reason = format!(
                "{} consecutive failed health checks",
                outcome.consecutive_failures
            );
            self.attempt_heal(&reason, false);
        }

        self.publish();
        result
    }

    /// Request a heal, bypassing the counter when `forced`.
    pub fn attempt_heal(&mut self, reason: &str, forced: bool) -> HealDecision {
        let decision =
            self.trigger
                .attempt_heal(&mut self.state, Utc::now(), reason, forced, &mut self.inflight);
        self.publish();
        decision
    }

    /// Wait for every in-flight dispatch and apply the outcomes.
    pub async fn settle_dispatches(&mut self) {
        while let Some(joined) = self.inflight.join_next().await {
            self.apply_joined(joined);
        }
    }

    /// Run the verification probe for the in-flight attempt, whether or not
    /// its delay has elapsed.
    ///
    /// A dispatch still running is joined first (each is bounded by the
    /// dispatch timeout); if it failed, the attempt is already closed and
    /// nothing is verified.
    pub async fn verify_now(&mut self) -> Option<RecoveryAttempt> {
        self.settle_dispatches().await;

        let pending = self.verifier.begin(&mut self.state)?;
        self.publish();
        let report = self.verifier.conclude(&mut self.state, pending).await;
        metrics::record_consecutive_failures(self.state.consecutive_failures());

        self.log.append(report.attempt.clone());
        let snapshot = self.publish();
        if report.attempt.succeeded {
            self.notifier.notify_success(&report.attempt, &snapshot);
        } else {
            self.notifier.notify_critical(&report.attempt, &snapshot);
        }
        Some(report.attempt)
    }

    fn apply_joined(&mut self, joined: Result<DispatchOutcome, JoinError>) {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Dispatch task failed to complete");
                return;
            }
        };

        let Some(attempt) = self
            .trigger
            .complete_dispatch(&mut self.state, outcome, Utc::now())
        else {
            self.publish();
            return;
        };

        self.log.append(attempt.clone());
        let snapshot = self.publish();
        if self.state.dispatch_failures() >= self.settings.dispatch_failure_alert_threshold {
            self.notifier.notify_dispatch_failing(&attempt, &snapshot);
        }
    }

    async fn handle_command(&mut self, command: WatchdogCommand) {
        match command {
            WatchdogCommand::ForceSync(reply) => {
                tracing::info!("Forced health check requested");
                let result = self.run_cycle().await;
                let _ = reply.send(result);
            }
            WatchdogCommand::ForceHeal { reason, reply } => {
                tracing::info!(reason = %reason, "Forced heal requested");
                let decision = self.attempt_heal(&reason, true);
                let _ = reply.send(decision);
            }
        }
    }

    /// Let an in-flight recovery reach its verdict, bounded by the grace
    /// period, then join any remaining dispatch tasks.
    ///
    /// When the grace ends before the verification delay, the attempt is
    /// left unverified: no verdict and no notification.
    async fn finish(&mut self) {
        let grace_deadline = Instant::now() + self.settings.shutdown_grace;

        if let Some(verify_at) = self.state.verification_deadline() {
            if verify_at <= grace_deadline {
                tracing::info!("Recovery in progress; waiting for verification before exit");
                if time::timeout_at(verify_at, self.settle_dispatches()).await.is_err() {
                    tracing::debug!("Dispatch still running at verification time");
                }
                if self.state.healing_in_progress() {
                    time::sleep_until(verify_at).await;
                    self.verify_now().await;
                }
            } else {
                tracing::warn!(
                    attempt_id = ?self.state.phase().attempt().map(|attempt| attempt.id),
                    grace = ?self.settings.shutdown_grace,
                    "Shutdown grace ends before verification; leaving recovery attempt unverified"
                );
            }
        }

        if time::timeout_at(grace_deadline, self.settle_dispatches())
            .await
            .is_err()
        {
            tracing::warn!("Aborting dispatch tasks still running at shutdown");
            self.inflight.abort_all();
        }
        if time::timeout(self.settings.shutdown_grace, self.log.flush())
            .await
            .is_err()
        {
            tracing::warn!("Recovery audit file not flushed before exit");
        }
        self.publish();
    }

    fn publish(&self) -> Arc<StatusSnapshot> {
        let snapshot = Arc::new(self.state.snapshot(&self.log));
        self.published.store(snapshot.clone());
        snapshot
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let mut config = WatchdogConfig::default();
        config.watchdog.check_interval_secs = 15;
        config.watchdog.failure_threshold = 5;
        config.admin.request_timeout_secs = 7;

        let settings = LoopSettings::from(&config);
        assert_eq!(settings.check_interval, Duration::from_secs(15));
        assert_eq!(settings.failure_threshold, 5);
        assert_eq!(settings.command_timeout, Duration::from_secs(7));
        assert_eq!(settings.shutdown_grace, Duration::from_secs(60));
    }
}
