// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push delivery of session lifecycle events.
//!
//! Parties learn about requests, acceptances and settlements through events
//! pushed over whatever connection they registered, typically the gateway's
//! WebSocket. Delivery is strictly best-effort: a party with no registered
//! connection simply misses the event and recovers current state by querying
//! the HTTP API.

pub mod bus;

pub use bus::NotificationBus;
