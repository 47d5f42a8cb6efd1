// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics recorder for the Sibyl platform.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The service
//! crates emit through the facade macros; this crate installs the recorder
//! that collects them and renders the text format the gateway serves under
//! `/metrics`.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sibyl_core::error::SibylError;

/// The installed Prometheus recorder.
///
/// Only one recorder can be installed per process; construct this once at
/// startup, before any service emits a metric.
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    /// Installs the Prometheus recorder globally and registers the metric
    /// descriptions. Fails if a recorder is already installed.
    pub fn install() -> Result<Self, SibylError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            SibylError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// The exporter handle, for callers that render on their own schedule.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
