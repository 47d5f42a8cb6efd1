// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions for everything the service crates emit.
//!
//! The emission sites live next to the state they measure; this module only
//! attaches HELP text so the rendered exposition is self-describing.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Sibyl metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "sibyl_sessions_started_total",
        "Sessions taken live by an advisor accept"
    );
    describe_counter!(
        "sibyl_sessions_ended_total",
        "Completed sessions, labeled by end reason"
    );
    describe_counter!(
        "sibyl_sessions_rejected_total",
        "Pending sessions declined by the advisor"
    );
    describe_counter!(
        "sibyl_sessions_cancelled_total",
        "Pending sessions withdrawn by the client"
    );
    describe_counter!("sibyl_billing_ticks_total", "Successful interval debits");
    describe_counter!(
        "sibyl_billing_charged_cents_total",
        "Cents collected by interval debits"
    );
    describe_counter!(
        "sibyl_billing_exhausted_total",
        "Sessions force-completed by a failed debit"
    );
    describe_counter!(
        "sibyl_signal_messages_total",
        "Relayed signaling messages, labeled by kind"
    );
    describe_counter!(
        "sibyl_notify_dropped_total",
        "Notifications dropped or failed in delivery"
    );
    describe_gauge!("sibyl_active_sessions", "Sessions currently active");
    describe_gauge!("sibyl_open_rooms", "Signaling rooms with at least one occupant");
    describe_gauge!(
        "sibyl_registered_connections",
        "Parties with a registered notification connection"
    );
    describe_gauge!("sibyl_ws_connections", "Open gateway WebSocket connections");
    describe_histogram!(
        "sibyl_session_duration_seconds",
        "Wall-clock duration of completed sessions"
    );
}
