// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Sibyl platform.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, producing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Sibyl configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SibylConfig {
    /// Gateway listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer token authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Billing cadence and revenue split settings.
    #[serde(default)]
    pub billing: BillingConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Gateway listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the gateway to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the gateway to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7465
}

/// Bearer token authentication configuration.
///
/// The gateway is fail-closed: with no tokens configured, every
/// authenticated route rejects.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Static bearer tokens and the party each one authenticates as.
    #[serde(default)]
    pub tokens: Vec<AuthTokenConfig>,
}

/// One bearer token entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthTokenConfig {
    /// The bearer token value.
    pub token: String,

    /// Party id this token authenticates as.
    pub party: String,
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
        .map(|p| p.join("sibyl").join("sibyl.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("sibyl.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Billing cadence and revenue split configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BillingConfig {
    /// Seconds between interval debits for per-minute sessions.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// The advisor's percentage of every completed session's gross charge.
    #[serde(default = "default_advisor_share_percent")]
    pub advisor_share_percent: u8,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            advisor_share_percent: default_advisor_share_percent(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_advisor_share_percent() -> u8 {
    70
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
