//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Components → notifier worker → admin listener → watchdog loop
//!
//! Shutdown (shutdown.rs):
//!     Signal → broadcast → loop finishes recovery → admin stops → notifier drains
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Shutdown has deadlines: grace period for the loop and for notifications

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{start, start_with, Components, Running, StartupError};
