// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses, a sane billing cadence, and
//! a revenue split that is an actual percentage.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::SibylConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SibylConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Validate host is not empty
    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    // Validate host looks like a valid IP or hostname
    if !config.server.host.trim().is_empty() {
        let addr = config.server.host.trim();
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{addr}` is not a valid IP address or hostname"),
            });
        }
    }

    // Port 0 would bind an ephemeral port, which is useless for a service
    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must not be 0".to_string(),
        });
    }

    // Validate database_path is not empty
    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // The billing tick drives all per-minute charging; a zero interval
    // would spin the timer loop
    if config.billing.interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "billing.interval_secs must be at least 1".to_string(),
        });
    }

    if config.billing.advisor_share_percent == 0 || config.billing.advisor_share_percent > 100 {
        errors.push(ConfigError::Validation {
            message: format!(
                "billing.advisor_share_percent must be between 1 and 100, got {}",
                config.billing.advisor_share_percent
            ),
        });
    }

    // Validate auth tokens: non-empty values, distinct tokens
    let mut seen_tokens = HashSet::new();
    for (i, entry) in config.auth.tokens.iter().enumerate() {
        if entry.token.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("auth.tokens[{i}].token must not be empty"),
            });
        }
        if entry.party.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("auth.tokens[{i}].party must not be empty"),
            });
        }
        if !entry.token.trim().is_empty() && !seen_tokens.insert(&entry.token) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate token in auth.tokens (entry {i})"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
