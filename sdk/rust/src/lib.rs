//! Client for the bridge watchdog admin API.

mod client;

pub use client::{
    AttemptSummary, ClientError, HealDecision, ProbeResult, WatchdogClient, WatchdogStatus,
};
