// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for Sibyl.
//!
//! One [`Database`] handle wraps a single background connection thread;
//! [`SqliteStore`] implements the store traits from `sibyl-core` on top of
//! it. Schema changes ship as embedded refinery migrations and run at open.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
