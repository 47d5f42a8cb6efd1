// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebRTC signaling for Sibyl phone and video sessions.
//!
//! The platform never touches media. Peers negotiate a direct WebRTC
//! connection among themselves; this crate only forwards the SDP and ICE
//! chatter between the two parties of a session. [`RoomRegistry`] keeps the
//! room state and does the forwarding.

pub mod rooms;

pub use rooms::RoomRegistry;
