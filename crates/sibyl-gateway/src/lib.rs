// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Sibyl platform.
//!
//! The gateway is the only process boundary: bearer-authenticated REST
//! routes drive the session lifecycle, balances and the advisor directory,
//! and a per-party WebSocket delivers notification-bus events and relays
//! signaling frames. All domain logic lives in the service crates; this
//! crate only translates HTTP and socket traffic into their calls.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::{AuthState, Identity, StaticTokenResolver, TokenResolver};
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
