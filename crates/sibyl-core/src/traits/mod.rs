// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the Sibyl subsystems.
//!
//! Stores abstract the persistence backend, [`ConnectionSink`] abstracts a
//! party's live connection, and [`Clock`] abstracts wall-clock time so
//! billing math is testable with a controlled clock.

pub mod clock;
pub mod sink;
pub mod store;

// Re-export all traits at the traits module level for convenience.
pub use clock::{Clock, SystemClock};
pub use sink::ConnectionSink;
pub use store::{AdvisorStore, BalanceStore, EarningsStore, SessionStore};
