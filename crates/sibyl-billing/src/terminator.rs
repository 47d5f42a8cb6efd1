// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback seam for billing-forced session termination.

use async_trait::async_trait;

use sibyl_core::{EndReason, SessionId, SibylError};

/// Finalizes a session on the billing engine's behalf.
///
/// Implemented by the session coordinator. The engine calls this with the
/// session lock released; implementations re-acquire it, settle the session
/// in its current billed state, and notify both parties.
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    async fn force_complete(
        &self,
        session_id: &SessionId,
        reason: EndReason,
    ) -> Result<(), SibylError>;
}
