//! The watchdog itself: the loop that owns state and the handle used to
//! talk to it.
//!
//! # Data Flow
//! ```text
//! ticker / verification timer / dispatch join / command
//!     → runner.rs WatchdogLoop (single writer of WatchdogState)
//!     → health::probe + health::tracker (failure counting)
//!     → recovery::trigger (dispatch task) → recovery::verifier
//!     → RecoveryLog + Notifier
//!     → ArcSwap<StatusSnapshot> (read by WatchdogHandle / admin API)
//! ```
//!
//! # Design Decisions
//! - Probes never overlap: ticks, forced syncs and verification all run on
//!   the loop task
//! - Commands are answered through oneshot replies with a bounded wait

pub mod command;
pub mod runner;

pub use command::{CommandError, WatchdogCommand, WatchdogHandle};
pub use runner::{LoopSettings, WatchdogLoop};
