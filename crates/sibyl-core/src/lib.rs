// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sibyl advisory platform.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Sibyl workspace: sessions, money,
//! advisor profiles, wire events, and the store/sink/clock seams the
//! runtime subsystems are built against.

pub mod error;
pub mod events;
pub mod sync;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SibylError;
pub use events::{SessionEvent, SignalMessage};
pub use sync::LockMap;
pub use types::{
    AdvisorProfile, AdvisorStatus, BillingKind, ChannelKind, ChannelRates, EarningsRecord,
    EarningsSummary, EndReason, FixedOffering, Money, PartyId, PayoutStatus, RoomId, Session,
    SessionId, SessionStatus,
};

// Re-export all seam traits at crate root.
pub use traits::{
    AdvisorStore, BalanceStore, Clock, ConnectionSink, EarningsStore, SessionStore, SystemClock,
};
