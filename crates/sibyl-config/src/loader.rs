// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sibyl.toml` > `~/.config/sibyl/sibyl.toml` > `/etc/sibyl/sibyl.toml`
//! with environment variable overrides via `SIBYL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SibylConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sibyl/sibyl.toml` (system-wide)
/// 3. `~/.config/sibyl/sibyl.toml` (user XDG config)
/// 4. `./sibyl.toml` (local directory)
/// 5. `SIBYL_*` environment variables
pub fn load_config() -> Result<SibylConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SibylConfig::default()))
        .merge(Toml::file("/etc/sibyl/sibyl.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sibyl/sibyl.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sibyl.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SibylConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SibylConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SibylConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SibylConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `SIBYL_STORAGE_DATABASE_PATH` must map
/// to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("SIBYL_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: SIBYL_BILLING_INTERVAL_SECS -> "billing_interval_secs"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("auth_", "auth.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("billing_", "billing.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn inline_toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[server]
port = 9000

[billing]
interval_secs = 30
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.billing.interval_secs, 30);
        assert_eq!(config.billing.advisor_share_percent, 70);
    }

    #[test]
    #[serial]
    fn env_var_overrides_section_key() {
        // SAFETY: serialized via #[serial], no concurrent env access.
        unsafe {
            std::env::set_var("SIBYL_BILLING_INTERVAL_SECS", "15");
        }
        let config = load_config_from_path(Path::new("/nonexistent/sibyl.toml")).unwrap();
        unsafe {
            std::env::remove_var("SIBYL_BILLING_INTERVAL_SECS");
        }
        assert_eq!(config.billing.interval_secs, 15);
    }

    #[test]
    #[serial]
    fn env_var_maps_underscored_key_correctly() {
        // storage_database_path must become storage.database_path,
        // not storage.database.path.
        unsafe {
            std::env::set_var("SIBYL_STORAGE_DATABASE_PATH", "/tmp/envtest.db");
        }
        let config = load_config_from_path(Path::new("/nonexistent/sibyl.toml")).unwrap();
        unsafe {
            std::env::remove_var("SIBYL_STORAGE_DATABASE_PATH");
        }
        assert_eq!(config.storage.database_path, "/tmp/envtest.db");
    }
}
