// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles and wiring helpers for Sibyl tests.
//!
//! Everything here is deterministic and in-memory so lifecycle, billing and
//! settlement behavior can be exercised quickly in CI without SQLite or a
//! network. The [`harness::TestHarness`] assembles the full service graph
//! the way the production binary does, but over these doubles and a
//! manually advanced clock.

pub mod clock;
pub mod harness;
pub mod memory_store;
pub mod sink;

pub use clock::ManualClock;
pub use harness::{TestHarness, standard_advisor};
pub use memory_store::{
    MemoryAdvisorStore, MemoryBalanceStore, MemoryEarningsStore, MemorySessionStore,
};
pub use sink::RecordingSink;
