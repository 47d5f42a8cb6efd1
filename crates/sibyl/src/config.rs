// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sibyl config` command implementation.

use sibyl_config::SibylConfig;
use sibyl_core::error::SibylError;

/// Prints the resolved configuration as TOML, with token values redacted.
pub fn run_config(config: &SibylConfig) -> Result<(), SibylError> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &SibylConfig) -> Result<String, SibylError> {
    let mut printable = config.clone();
    for entry in &mut printable.auth.tokens {
        entry.token = format!("[{} redacted]", entry.token.len());
    }
    toml::to_string_pretty(&printable)
        .map_err(|e| SibylError::Internal(format!("config serialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sibyl_config::load_and_validate_str;

    #[test]
    fn rendered_config_redacts_tokens() {
        let config = load_and_validate_str(
            r#"
            [[auth.tokens]]
            token = "super-secret"
            party = "client-1"
            "#,
        )
        .unwrap();

        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[12 redacted]"));
        assert!(rendered.contains("client-1"));
    }

    #[test]
    fn rendered_config_shows_resolved_defaults() {
        let config = load_and_validate_str("").unwrap();
        let rendered = render_config(&config).unwrap();
        assert!(rendered.contains("port = 7465"));
        assert!(rendered.contains("interval_secs = 60"));
        assert!(rendered.contains("advisor_share_percent = 70"));
    }
}
