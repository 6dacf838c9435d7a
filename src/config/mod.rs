//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (WATCHDOG_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → WatchdogConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::WatchdogConfig;
pub use schema::{
    AdminConfig, AuditConfig, BridgeConfig, LogFormat, LoopConfig, NotificationConfig,
    ObservabilityConfig, RemoteExecutionConfig,
};
