//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Probe (probe.rs):
//!     GET /health (+ accounts) with timeout
//!     → HealthCheckResult (healthy derived from thresholds)
//!
//! Tracker (tracker.rs):
//!     HealthCheckResult
//!     → consecutive failure count
//!     → crossed_threshold once per outage
//!
//! State machine (state.rs):
//!     Monitoring → Healing → Verifying → Monitoring
//!     Published as StatusSnapshot
//! ```
//!
//! # Design Decisions
//! - Probe never errors; failures are unhealthy results
//! - Reachability alone is not health: stale data fails the probe
//! - Probes are strictly sequential, driven by the watchdog loop

pub mod probe;
pub mod state;
pub mod tracker;

pub use probe::{BridgeProbe, HealthCheck, HealthCheckResult, HealthProbe, HealthThresholds};
pub use state::{Phase, PhaseName, StatusSnapshot, WatchdogState};
pub use tracker::{FailureTracker, TrackOutcome};
