// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manually advanced clock for deterministic settlement math.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sibyl_core::traits::Clock;

/// A [`Clock`] frozen at a fixed instant until a test advances it.
///
/// Billing timers run on tokio's virtual time; this covers the wall-clock
/// reads (start and end stamps, elapsed-duration settlement). Tests that
/// advance tokio time should advance this clock in lockstep.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts at an arbitrary but stable instant.
    pub fn new() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).single().unwrap())
    }

    pub fn starting_at(instant: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(instant),
        }
    }

    /// Moves the clock forward by `seconds`.
    pub fn advance_secs(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::seconds(seconds);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
