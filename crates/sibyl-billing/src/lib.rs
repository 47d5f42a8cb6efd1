// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interval billing for per-minute sessions.
//!
//! The [`BillingEngine`] runs one timer task per active per-minute session.
//! Each interval it debits the client the rate's worth of that interval, in
//! advance, and persists the covered seconds on the session row. When a
//! debit fails the engine asks its [`SessionTerminator`] to force the
//! session to completion; the terminator is wired in after construction so
//! the session coordinator can depend on this crate without a cycle.

pub mod engine;
pub mod terminator;

pub use engine::{BillingContext, BillingEngine, TickOutcome};
pub use terminator::SessionTerminator;
