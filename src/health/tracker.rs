//! Consecutive failure tracking.
//!
//! # State Transitions
//! ```text
//! healthy result   → counter = 0
//! unhealthy result → counter += 1
//!                    crossed_threshold when counter first equals threshold
//! ```
//!
//! # Design Decisions
//! - Sole writer of the consecutive failure counter
//! - Threshold crossing fires once per outage episode
//! - A crossing that happens while healing is already in progress is swallowed

use chrono::{DateTime, Utc};

use crate::health::probe::HealthCheckResult;

/// What a single recorded result did to the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOutcome {
    pub crossed_threshold: bool,
    pub consecutive_failures: u32,
}

/// Counts the trailing run of unhealthy results.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    threshold: u32,
    consecutive_failures: u32,
    outage_started_at: Option<DateTime<Utc>>,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
            outage_started_at: None,
        }
    }

    /// Record a probe result.
    pub fn record(&mut self, result: &HealthCheckResult, healing_in_progress: bool) -> TrackOutcome {
        if result.is_healthy() {
            self.reset();
            return TrackOutcome {
                crossed_threshold: false,
                consecutive_failures: 0,
            };
        }

        if self.consecutive_failures == 0 {
            self.outage_started_at = Some(result.timestamp());
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        TrackOutcome {
            crossed_threshold: self.consecutive_failures == self.threshold && !healing_in_progress,
            consecutive_failures: self.consecutive_failures,
        }
    }

    /// Clear the counter after a confirmed recovery.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.outage_started_at = None;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// True once the counter has reached the threshold.
    pub fn at_or_past_threshold(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }

    /// Timestamp of the first unhealthy result of the current run.
    pub fn outage_started_at(&self) -> Option<DateTime<Utc>> {
        self.outage_started_at
    }
}
