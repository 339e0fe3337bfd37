// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Ringline configuration system.

use ringline_config::diagnostic::{ConfigError, suggest_key};
use ringline_config::model::RinglineConfig;
use ringline_config::{load_and_validate_str, load_config_from_path, load_config_from_str};
use serial_test::serial;

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_ringline_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 9000
log_level = "debug"

[auth]
signing_secret = "0123456789abcdef0123"

[presence]
staleness_secs = 120

[calls]
ring_window_secs = 20
sweep_interval_secs = 2

[retention]
enabled = false
interval_secs = 7200
signal_ttl_secs = 3600
call_history_ttl_secs = 86400

[storage]
database_path = "/tmp/ringline-test.db"
wal_mode = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(
        config.auth.signing_secret.as_deref(),
        Some("0123456789abcdef0123")
    );
    assert_eq!(config.presence.staleness_secs, 120);
    assert_eq!(config.calls.ring_window_secs, 20);
    assert_eq!(config.calls.sweep_interval_secs, 2);
    assert!(!config.retention.enabled);
    assert_eq!(config.retention.interval_secs, 7200);
    assert_eq!(config.storage.database_path, "/tmp/ringline-test.db");
    assert!(!config.storage.wal_mode);
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let toml = "";
    let config = load_config_from_str(toml).expect("empty TOML should use defaults");

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8400);
    assert_eq!(config.server.log_level, "info");
    assert!(config.auth.signing_secret.is_none());
    assert_eq!(config.presence.staleness_secs, 300);
    assert_eq!(config.calls.ring_window_secs, 30);
    assert_eq!(config.calls.sweep_interval_secs, 5);
    assert!(config.retention.enabled);
    assert!(config.storage.database_path.ends_with("ringline.db"));
    assert!(config.storage.wal_mode);
}

/// Unknown field in [server] section produces an UnknownField error.
#[test]
fn unknown_field_in_server_produces_error() {
    let toml = r#"
[server]
prot = 9000
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("prot"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[signaling]
mode = "push"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("signaling"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Dot-notation overrides merge over TOML values the way the env
/// provider maps RINGLINE_SERVER_PORT to server.port.
#[test]
fn override_merges_over_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let toml_content = r#"
[server]
port = 9000
"#;

    let config: RinglineConfig = Figment::new()
        .merge(Serialized::defaults(RinglineConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("server.port", 9100))
        .extract()
        .expect("should merge override");

    assert_eq!(config.server.port, 9100);
}

/// RINGLINE_CALLS_RING_WINDOW_SECS maps to calls.ring_window_secs
/// (NOT calls.ring.window.secs).
#[test]
fn dotted_key_reaches_nested_field() {
    use figment::{Figment, providers::Serialized};

    let config: RinglineConfig = Figment::new()
        .merge(Serialized::defaults(RinglineConfig::default()))
        .merge(("calls.ring_window_secs", 45u64))
        .extract()
        .expect("should set ring window via dot notation");

    assert_eq!(config.calls.ring_window_secs, 45);
}

/// Missing config files are silently skipped (Figment's Toml::file() behavior).
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: RinglineConfig = Figment::new()
        .merge(Serialized::defaults(RinglineConfig::default()))
        .merge(Toml::file("/nonexistent/path/ringline.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.server.host, "127.0.0.1");
}

/// RINGLINE_SERVER_PORT overrides a value set in the TOML file.
#[test]
#[serial]
fn env_var_overrides_file_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ringline.toml");
    std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

    // SAFETY: test-only env mutation. Tests using env vars must not run in parallel.
    unsafe { std::env::set_var("RINGLINE_SERVER_PORT", "9100") };
    let config = load_config_from_path(&path).expect("env override should merge");
    unsafe { std::env::remove_var("RINGLINE_SERVER_PORT") };

    assert_eq!(config.server.port, 9100);
}

/// Env vars for keys that themselves contain underscores land on the
/// right nested field: RINGLINE_CALLS_RING_WINDOW_SECS must become
/// calls.ring_window_secs, not calls.ring.window.secs.
#[test]
#[serial]
fn env_var_with_underscored_key_maps_to_nested_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ringline.toml");
    std::fs::write(&path, "").unwrap();

    unsafe { std::env::set_var("RINGLINE_CALLS_RING_WINDOW_SECS", "45") };
    let config = load_config_from_path(&path).expect("env override should merge");
    unsafe { std::env::remove_var("RINGLINE_CALLS_RING_WINDOW_SECS") };

    assert_eq!(config.calls.ring_window_secs, 45);
    assert_eq!(config.calls.sweep_interval_secs, 5);
}

/// Unknown key with a close valid key produces a suggestion.
#[test]
fn diagnostic_error_includes_unknown_key() {
    let toml = r#"
[server]
prot = 9000
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    assert!(!errors.is_empty(), "should have at least one error");

    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys } if {
            key == "prot"
                && suggestion.as_deref() == Some("port")
                && valid_keys.contains("port")
        })
    });
    assert!(
        has_unknown_key,
        "expected an UnknownKey diagnostic with a `port` suggestion, got: {errors:?}"
    );
}

/// Validation errors surface through load_and_validate_str.
#[test]
fn validation_errors_surface() {
    let toml = r#"
[auth]
signing_secret = "shh"
"#;

    let errors = load_and_validate_str(toml).expect_err("short secret should fail validation");
    assert!(errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("signing_secret"))
    }));
}

/// The suggestion helper stays quiet when nothing is close.
#[test]
fn diagnostic_no_suggestion_for_distant_typo() {
    let valid_keys = &["host", "port", "log_level"];
    assert!(suggest_key("qqqqqq", valid_keys).is_none());
}
