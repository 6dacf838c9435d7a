//! Self-healing watchdog for a remote data bridge.

// Core subsystems
pub mod config;
pub mod health;
pub mod recovery;
pub mod notify;
pub mod watchdog;

// Exposed interface
pub mod admin;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::WatchdogConfig;
pub use lifecycle::Shutdown;
pub use watchdog::{WatchdogHandle, WatchdogLoop};
