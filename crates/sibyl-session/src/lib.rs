// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle coordination.
//!
//! The [`SessionCoordinator`] owns every transition of the
//! `pending -> active -> {completed, rejected}` / `pending -> cancelled`
//! state machine, serialized per session so a client-initiated end and a
//! billing-forced termination can never finalize the same session twice.
//! It wires together the stores, the balance and earnings ledgers, the
//! billing engine, the signaling rooms and the notification bus.
//!
//! The [`AdvisorDirectory`] manages advisor profiles and presence, and
//! broadcasts availability changes to every connected party.

pub mod coordinator;
pub mod directory;
pub mod recovery;

pub use coordinator::SessionCoordinator;
pub use directory::AdvisorDirectory;
