// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unified error type for the Sibyl workspace.
//!
//! All crates in the workspace return `SibylError` across their public
//! boundaries. Variants map to the failure classes surfaced by the platform:
//! lifecycle violations, authorization, funds, pricing, availability,
//! delivery, and infrastructure.

use thiserror::Error;

use crate::types::{ChannelKind, Money, PartyId, SessionStatus};

/// Errors that can occur across the Sibyl platform.
#[derive(Error, Debug)]
pub enum SibylError {
    /// A lifecycle operation was applied to a session in the wrong state.
    #[error("invalid transition: cannot {operation} a {from} session")]
    InvalidTransition {
        /// Status the session was in when the operation arrived.
        from: SessionStatus,
        /// The attempted operation, e.g. "accept" or "cancel".
        operation: String,
    },

    /// The caller is not permitted to perform the operation.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// An account could not cover a charge.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// The advisor has no price configured for the requested terms.
    #[error("advisor {advisor_id} does not offer {channel} at the requested terms")]
    PricingNotOffered {
        advisor_id: PartyId,
        channel: ChannelKind,
    },

    /// The advisor is not accepting new sessions.
    #[error("advisor {advisor_id} is not available")]
    ProviderUnavailable { advisor_id: PartyId },

    /// A payload could not be delivered to a party's connection.
    #[error("delivery to {party} failed")]
    DeliveryFailure {
        party: PartyId,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Request data failed validation before any state changed.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage layer error.
    #[error("storage error: {source}")]
    Storage {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport-level error (socket, bind, HTTP plumbing).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SibylError {
    /// True when retrying the same call cannot succeed without a state change
    /// elsewhere (wrong lifecycle state, wrong caller, missing pricing).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SibylError::InvalidTransition { .. }
                | SibylError::Forbidden { .. }
                | SibylError::PricingNotOffered { .. }
                | SibylError::ProviderUnavailable { .. }
                | SibylError::Validation { .. }
        )
    }
}
