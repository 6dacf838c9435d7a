//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call failed (notification gateway):
//!     → backoff.rs (exponential delay with jitter)
//!     → retry until max_attempts, then drop and log
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Jittered backoff prevents synchronized retries
//! - Retries run off the watchdog loop, never inside it

pub mod backoff;

pub use backoff::Backoff;
