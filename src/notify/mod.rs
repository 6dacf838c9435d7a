//! Operator notification subsystem.
//!
//! # Data Flow
//! ```text
//! Watchdog loop (verdict or repeated dispatch failure)
//!     → message.rs (Notification from attempt + StatusSnapshot copy)
//!     → notifier.rs Notifier::enqueue (try_send, never blocks)
//!     → NotifierWorker task
//!     → gateway.rs (webhook POST with timeout, or log-only)
//!     → retry with backoff, then log and drop
//! ```
//!
//! # Design Decisions
//! - Notification failures never reach the watchdog loop
//! - Messages carry their own data; the worker never reads live state

pub mod gateway;
pub mod message;
pub mod notifier;

pub use gateway::{gateway_from_config, LogGateway, NotificationGateway, NotifyError, WebhookGateway};
pub use message::{Notification, NotificationBody, NotificationKind};
pub use notifier::{channel, Notifier, NotifierWorker};
