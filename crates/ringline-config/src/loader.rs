// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ringline.toml` > `~/.config/ringline/ringline.toml`
//! > `/etc/ringline/ringline.toml` with environment variable overrides via
//! the `RINGLINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RinglineConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ringline/ringline.toml` (system-wide)
/// 3. `~/.config/ringline/ringline.toml` (user XDG config)
/// 4. `./ringline.toml` (local directory)
/// 5. `RINGLINE_*` environment variables
pub fn load_config() -> Result<RinglineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RinglineConfig::default()))
        .merge(Toml::file("/etc/ringline/ringline.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("ringline/ringline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("ringline.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<RinglineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RinglineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RinglineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RinglineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `RINGLINE_CALLS_RING_WINDOW_SECS`
/// must map to `calls.ring_window_secs`, not `calls.ring.window.secs`.
fn env_provider() -> Env {
    Env::prefixed("RINGLINE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: RINGLINE_SERVER_PORT -> "server_port"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("auth_", "auth.", 1)
            .replacen("presence_", "presence.", 1)
            .replacen("calls_", "calls.", 1)
            .replacen("retention_", "retention.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}
