// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses and positive durations.

use crate::diagnostic::ConfigError;
use crate::model::RinglineConfig;

/// Shortest signing secret accepted; anything shorter is trivially
/// brute-forceable.
const MIN_SECRET_LEN: usize = 16;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &RinglineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must not be 0".to_string(),
        });
    }

    if let Some(secret) = &config.auth.signing_secret
        && secret.len() < MIN_SECRET_LEN
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "auth.signing_secret must be at least {MIN_SECRET_LEN} characters, got {}",
                secret.len()
            ),
        });
    }

    if config.presence.staleness_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "presence.staleness_secs must be at least 1".to_string(),
        });
    }

    if config.calls.ring_window_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "calls.ring_window_secs must be at least 1".to_string(),
        });
    }

    if config.calls.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "calls.sweep_interval_secs must be at least 1".to_string(),
        });
    }

    if config.calls.sweep_interval_secs > config.calls.ring_window_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "calls.sweep_interval_secs ({}) must not exceed calls.ring_window_secs ({})",
                config.calls.sweep_interval_secs, config.calls.ring_window_secs
            ),
        });
    }

    if config.retention.enabled {
        if config.retention.interval_secs < 60 {
            errors.push(ConfigError::Validation {
                message: format!(
                    "retention.interval_secs must be at least 60, got {}",
                    config.retention.interval_secs
                ),
            });
        }
        // Signals must outlive the poll fallback window by a wide margin.
        if config.retention.signal_ttl_secs < config.calls.ring_window_secs * 10 {
            errors.push(ConfigError::Validation {
                message: format!(
                    "retention.signal_ttl_secs ({}) is too short for the ring window ({})",
                    config.retention.signal_ttl_secs, config.calls.ring_window_secs
                ),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = RinglineConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = RinglineConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn zero_port_fails_validation() {
        let mut config = RinglineConfig::default();
        config.server.port = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("server.port"))));
    }

    #[test]
    fn short_signing_secret_fails_validation() {
        let toml_str = r#"
[auth]
signing_secret = "shh"
"#;
        let config: RinglineConfig = toml::from_str(toml_str).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("signing_secret"))));
    }

    #[test]
    fn sweep_interval_longer_than_ring_window_fails() {
        let mut config = RinglineConfig::default();
        config.calls.ring_window_secs = 10;
        config.calls.sweep_interval_secs = 30;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("sweep_interval_secs"))));
    }

    #[test]
    fn valid_custom_config_passes() {
        let toml_str = r#"
[server]
host = "0.0.0.0"
port = 9000

[auth]
signing_secret = "0123456789abcdef0123"

[storage]
database_path = "/tmp/ringline-test.db"
"#;
        let config: RinglineConfig = toml::from_str(toml_str).unwrap();
        assert!(validate_config(&config).is_ok());
    }
}
