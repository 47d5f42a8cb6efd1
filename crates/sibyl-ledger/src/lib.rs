// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Money movement for Sibyl.
//!
//! [`BalanceLedger`] fronts client account balances with per-account
//! serialization; [`EarningsLedger`] computes and records the advisor's
//! share when sessions settle. Both operate on the store traits from
//! `sibyl-core`, so they run unchanged against SQLite or in-memory doubles.

pub mod balance;
pub mod earnings;

pub use balance::BalanceLedger;
pub use earnings::EarningsLedger;
