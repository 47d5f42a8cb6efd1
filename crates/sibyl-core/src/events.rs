// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-level event and signal types.
//!
//! [`SessionEvent`] frames are pushed to parties over the notification bus.
//! [`SignalMessage`] frames are relayed verbatim between room occupants;
//! the platform inspects only the routing envelope, never the payload.

use serde::{Deserialize, Serialize};

use crate::types::{
    AdvisorStatus, BillingKind, ChannelKind, EndReason, Money, PartyId, RoomId, SessionId,
};

/// Lifecycle events pushed to a party's registered connection.
///
/// Serialized with a `type` tag matching the wire vocabulary, e.g.
/// `{"type":"session_accepted","session_id":"...","room_id":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A client asked for a session; delivered to the advisor.
    SessionRequest {
        session_id: SessionId,
        client_id: PartyId,
        channel: ChannelKind,
        billing: BillingKind,
        /// Per-minute rate for `per_minute`, flat total for `fixed_duration`.
        price: Money,
        #[serde(skip_serializing_if = "Option::is_none")]
        scheduled_minutes: Option<u32>,
    },
    /// The advisor accepted; delivered to the client with the room to join.
    SessionAccepted {
        session_id: SessionId,
        room_id: RoomId,
    },
    /// The advisor declined; delivered to the client.
    SessionRejected { session_id: SessionId },
    /// The client withdrew a pending request; delivered to the advisor.
    SessionCancelledByClient { session_id: SessionId },
    /// The session reached `completed`; carries the final charge.
    SessionEnded {
        session_id: SessionId,
        total_amount: Money,
        duration_seconds: i64,
        reason: EndReason,
    },
    /// An advisor's directory status changed; broadcast to everyone connected.
    AdvisorStatusChanged {
        advisor_id: PartyId,
        status: AdvisorStatus,
    },
}

/// Signal kinds the relay recognises.
///
/// The WebRTC negotiation kinds use hyphens; presence announcements use
/// underscores. Both spellings are load-bearing wire vocabulary.
pub mod signal {
    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "ice-candidate";
    pub const CALL_REQUEST: &str = "call-request";
    pub const CALL_RESPONSE: &str = "call-response";
    pub const END_CALL: &str = "end-call";
    pub const USER_JOINED: &str = "user_joined";
    pub const USER_LEFT: &str = "user_left";
}

/// A signaling frame relayed between room occupants.
///
/// `sender` and `room_id` are stamped by the relay before forwarding, so a
/// client can never spoof either. `data` is an opaque payload (SDP, ICE
/// candidates) that is forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<PartyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PartyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl SignalMessage {
    /// A bare frame with just a kind, no routing fields or payload.
    pub fn of_kind(kind: &str) -> Self {
        SignalMessage {
            kind: kind.to_string(),
            sender: None,
            target: None,
            room_id: None,
            data: serde_json::Value::Null,
        }
    }
}
