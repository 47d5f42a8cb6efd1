// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection sink trait for delivering frames to a party.

use async_trait::async_trait;

use crate::error::SibylError;

/// One end of a party's live connection.
///
/// The gateway registers a sink per WebSocket; tests register recording
/// doubles. Delivery is best-effort: an error means the peer is unreachable
/// and the holder should drop its registration.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    /// Stable id of the underlying physical connection.
    ///
    /// Used to guard teardown: when a party reconnects, the old socket's
    /// cleanup must not unregister the replacement.
    fn connection_id(&self) -> &str;

    /// Deliver one serialized frame.
    async fn deliver(&self, payload: String) -> Result<(), SibylError>;
}
