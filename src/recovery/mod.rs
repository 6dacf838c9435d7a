//! Recovery subsystem.
//!
//! # Data Flow
//! ```text
//! Threshold crossed / force-heal
//!     → trigger.rs (in-progress guard, cooldown)
//!     → PendingAttempt, state = Healing
//!     → dispatch task (remote restart hook, bounded timeout)
//!         failed → attempt finalized as DispatchFailed, state = Monitoring
//!
//! Verification delay elapsed
//!     → verifier.rs (one more probe)
//!     → RecoveryAttempt (Recovered | StillUnhealthy), state = Monitoring
//!
//! Every finalized attempt
//!     → attempt.rs RecoveryLog (memory ring + JSON lines)
//! ```
//!
//! # Design Decisions
//! - At most one heal in flight; cooldown measured from the last trigger
//! - A failed heal never resets the failure counter
//! - Attempts are immutable once finalized

pub mod attempt;
pub mod trigger;
pub mod verifier;

pub use attempt::{AttemptOutcome, PendingAttempt, RecoveryAttempt, RecoveryLog};
pub use trigger::{
    DispatchError, DispatchOutcome, HealDecision, RecoveryTrigger, RemoteExecutor, SkipReason,
    WorkflowDispatcher,
};
pub use verifier::{RecoveryVerifier, VerificationReport};
