// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types persisted by this crate.
//!
//! The storage layer persists the domain types from `sibyl-core` directly;
//! this module re-exports them so query code and callers share one
//! vocabulary.

pub use sibyl_core::{
    AdvisorProfile, AdvisorStatus, BillingKind, ChannelKind, ChannelRates, EarningsRecord,
    EarningsSummary, EndReason, FixedOffering, Money, PayoutStatus, Session, SessionStatus,
};
