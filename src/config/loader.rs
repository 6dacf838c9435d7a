//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::WatchdogConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<WatchdogConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => WatchdogConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `WATCHDOG_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut WatchdogConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parsed(&lookup, "WATCHDOG_CHECK_INTERVAL_SECONDS")? {
        config.watchdog.check_interval_secs = v;
    }
    if let Some(v) = parsed(&lookup, "WATCHDOG_FAILURE_THRESHOLD")? {
        config.watchdog.failure_threshold = v;
    }
    if let Some(v) = parsed(&lookup, "WATCHDOG_HEALING_COOLDOWN_SECONDS")? {
        config.watchdog.healing_cooldown_secs = v;
    }
    if let Some(v) = parsed(&lookup, "WATCHDOG_VERIFICATION_DELAY_SECONDS")? {
        config.watchdog.verification_delay_secs = v;
    }
    if let Some(v) = parsed(&lookup, "WATCHDOG_DATA_FRESHNESS_THRESHOLD_MINUTES")? {
        config.bridge.data_freshness_threshold_minutes = v;
    }
    if let Some(v) = lookup("WATCHDOG_BRIDGE_URL") {
        config.bridge.base_url = v;
    }
    if let Some(v) = lookup("WATCHDOG_REMOTE_EXECUTION_URL") {
        config.remote_execution.endpoint = v;
    }
    if let Some(v) = lookup("WATCHDOG_REMOTE_EXECUTION_CREDENTIAL") {
        config.remote_execution.credential = Some(v);
    }
    if let Some(v) = lookup("WATCHDOG_NOTIFICATION_URL") {
        config.notification.gateway_url = Some(v);
    }
    if let Some(v) = lookup("WATCHDOG_NOTIFICATION_RECIPIENT") {
        config.notification.recipient = v;
    }
    if let Some(v) = lookup("WATCHDOG_ADMIN_API_KEY") {
        config.admin.api_key = Some(v);
    }
    Ok(())
}

fn parsed<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_overrides_apply() {
        let vars = env(&[
            ("WATCHDOG_CHECK_INTERVAL_SECONDS", "30"),
            ("WATCHDOG_FAILURE_THRESHOLD", "4"),
            ("WATCHDOG_DATA_FRESHNESS_THRESHOLD_MINUTES", "7.5"),
            ("WATCHDOG_NOTIFICATION_RECIPIENT", "oncall@example.com"),
            ("WATCHDOG_REMOTE_EXECUTION_CREDENTIAL", "secret"),
        ]);
        let mut config = WatchdogConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.watchdog.check_interval_secs, 30);
        assert_eq!(config.watchdog.failure_threshold, 4);
        assert_eq!(config.bridge.data_freshness_threshold_minutes, 7.5);
        assert_eq!(config.notification.recipient, "oncall@example.com");
        assert_eq!(config.remote_execution.credential.as_deref(), Some("secret"));
    }

    #[test]
    fn test_malformed_numeric_override_is_rejected() {
        let vars = env(&[("WATCHDOG_FAILURE_THRESHOLD", "three")]);
        let mut config = WatchdogConfig::default();
        let err = apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Env { key: "WATCHDOG_FAILURE_THRESHOLD", .. }
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("bridge_watchdog_loader_test.toml");
        fs::write(
            &path,
            "[bridge]\nbase_url = \"http://10.1.2.3:9000\"\n\n[watchdog]\nhealing_cooldown_secs = 600\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.bridge.base_url, "http://10.1.2.3:9000");
        assert_eq!(config.watchdog.healing_cooldown_secs, 600);

        fs::remove_file(&path).unwrap_or_default();
    }
}
