//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, fractions within [0, 1])
//! - Check URLs and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WatchdogConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::WatchdogConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be between 0 and 1, got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("verification delay ({delay}s) must be shorter than the healing cooldown ({cooldown}s)")]
    DelayExceedsCooldown { delay: u64, cooldown: u64 },

    #[error("shutdown grace ({grace}s) must cover the verification delay ({delay}s)")]
    GraceShorterThanDelay { grace: u64, delay: u64 },

    #[error("restart hook timeout ({timeout}s) must be shorter than the verification delay ({delay}s)")]
    DispatchTimeoutExceedsDelay { timeout: u64, delay: u64 },
}

/// Check the configuration, collecting every error found.
pub fn validate_config(config: &WatchdogConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("watchdog.check_interval_secs", config.watchdog.check_interval_secs),
        ("watchdog.failure_threshold", config.watchdog.failure_threshold as u64),
        ("watchdog.verification_delay_secs", config.watchdog.verification_delay_secs),
        (
            "watchdog.dispatch_failure_alert_threshold",
            config.watchdog.dispatch_failure_alert_threshold as u64,
        ),
        ("bridge.timeout_secs", config.bridge.timeout_secs),
        ("remote_execution.timeout_secs", config.remote_execution.timeout_secs),
        ("notification.timeout_secs", config.notification.timeout_secs),
        ("notification.max_attempts", config.notification.max_attempts as u64),
        ("notification.queue_capacity", config.notification.queue_capacity as u64),
        ("admin.request_timeout_secs", config.admin.request_timeout_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let freshness = config.bridge.data_freshness_threshold_minutes;
    if !(freshness.is_finite() && freshness > 0.0) {
        errors.push(ValidationError::Zero {
            field: "bridge.data_freshness_threshold_minutes",
        });
    }

    let fraction = config.bridge.min_synced_fraction;
    if !(0.0..=1.0).contains(&fraction) {
        errors.push(ValidationError::OutOfRange {
            field: "bridge.min_synced_fraction",
            value: fraction,
        });
    }

    if config.watchdog.verification_delay_secs >= config.watchdog.healing_cooldown_secs {
        errors.push(ValidationError::DelayExceedsCooldown {
            delay: config.watchdog.verification_delay_secs,
            cooldown: config.watchdog.healing_cooldown_secs,
        });
    }

    // An in-flight heal must be able to reach its verdict before exit.
    if config.watchdog.shutdown_grace_secs < config.watchdog.verification_delay_secs {
        errors.push(ValidationError::GraceShorterThanDelay {
            grace: config.watchdog.shutdown_grace_secs,
            delay: config.watchdog.verification_delay_secs,
        });
    }

    // The dispatch outcome must be known before the verification probe runs.
    if config.remote_execution.timeout_secs >= config.watchdog.verification_delay_secs {
        errors.push(ValidationError::DispatchTimeoutExceedsDelay {
            timeout: config.remote_execution.timeout_secs,
            delay: config.watchdog.verification_delay_secs,
        });
    }

    check_url(&mut errors, "bridge.base_url", &config.bridge.base_url);
    check_url(&mut errors, "remote_execution.endpoint", &config.remote_execution.endpoint);
    if let Some(gateway) = &config.notification.gateway_url {
        check_url(&mut errors, "notification.gateway_url", gateway);
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
