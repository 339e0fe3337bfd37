// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Ringline coordinator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Ringline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RinglineConfig {
    /// HTTP server bind address and logging.
    #[serde(default)]
    pub server: ServerConfig,

    /// Peer token verification settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Presence staleness settings.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Ring window and sweep cadence.
    #[serde(default)]
    pub calls: CallsConfig,

    /// Aged-row cleanup settings.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port for the HTTP and WebSocket surface.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8400
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Peer token verification configuration.
///
/// Tokens are `<peer_id>.<mac>` where the MAC is an HMAC-SHA256 tag over
/// the peer id under `signing_secret`. With no secret configured the
/// server refuses to serve authenticated routes (fail closed).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Shared secret used to verify peer tokens. `None` disables serving.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

/// Presence staleness configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceConfig {
    /// Seconds after the last heartbeat before an online record reads
    /// as offline.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
        }
    }
}

fn default_staleness_secs() -> u64 {
    300 // 5 minutes
}

/// Ring window and sweep cadence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CallsConfig {
    /// Seconds a callee has to respond before a ringing call times out.
    #[serde(default = "default_ring_window_secs")]
    pub ring_window_secs: u64,

    /// Seconds between ring-timeout sweep passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            ring_window_secs: default_ring_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_ring_window_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    5
}

/// Aged-row cleanup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Enable the retention sweeper.
    #[serde(default = "default_retention_enabled")]
    pub enabled: bool,

    /// Seconds between retention sweep passes.
    #[serde(default = "default_retention_interval_secs")]
    pub interval_secs: u64,

    /// Seconds a signaling message is kept after creation.
    #[serde(default = "default_signal_ttl_secs")]
    pub signal_ttl_secs: u64,

    /// Seconds a terminal call session is kept for history.
    #[serde(default = "default_call_history_ttl_secs")]
    pub call_history_ttl_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_retention_enabled(),
            interval_secs: default_retention_interval_secs(),
            signal_ttl_secs: default_signal_ttl_secs(),
            call_history_ttl_secs: default_call_history_ttl_secs(),
        }
    }
}

fn default_retention_enabled() -> bool {
    true
}

fn default_retention_interval_secs() -> u64 {
    3600 // 1 hour
}

fn default_signal_ttl_secs() -> u64 {
    86_400 // 1 day
}

fn default_call_history_ttl_secs() -> u64 {
    604_800 // 7 days
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("ringline").join("ringline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("ringline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
