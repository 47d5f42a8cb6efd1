// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the Sibyl workspace.
//!
//! Monetary values are fixed-point minor units (cents) carried in [`Money`].
//! No floating point is used anywhere in billing math.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A monetary amount in minor units (cents).
///
/// All arithmetic is integer arithmetic. Proportional charges truncate
/// toward zero; the platform never rounds a charge up.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero cents.
    pub const ZERO: Money = Money(0);

    /// Construct from minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// The amount in minor units.
    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Proportional charge for `seconds` of usage at this per-minute rate.
    ///
    /// Truncates toward zero: 30 seconds at 100 cents/minute is 50 cents,
    /// 59 seconds at 1 cent/minute is 0 cents. Negative elapsed time is
    /// treated as zero.
    pub fn prorated(self, seconds: i64) -> Money {
        let seconds = seconds.max(0);
        Money((self.0 as i128 * seconds as i128 / 60) as i64)
    }

    /// Integer percentage share of this amount, truncating toward zero.
    pub fn percent_share(self, percent: u8) -> Money {
        Money((self.0 as i128 * percent as i128 / 100) as i64)
    }

    /// `self - other`, floored at zero. Used for settlement remainders.
    pub fn remaining_after(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        SessionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a party (client or advisor account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PartyId(pub String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        PartyId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a signaling room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn generate() -> Self {
        RoomId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session.
///
/// `Pending -> Active -> Completed` is the paid path. `Rejected` and
/// `Cancelled` are terminal exits from `Pending`. Terminal states are sticky.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
    Rejected,
}

impl SessionStatus {
    /// True for states that admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Rejected
        )
    }
}

/// Communication channel a session runs over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Chat,
    Phone,
    Video,
}

/// How a session is charged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingKind {
    /// Charged per elapsed minute while active.
    PerMinute,
    /// A single flat price for a scheduled block of time.
    FixedDuration,
}

/// Advisor presence as shown in the directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdvisorStatus {
    Available,
    Busy,
    Offline,
}

/// Why a session reached `Completed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A party ended the session.
    Normal,
    /// The billing engine forced completion after a failed debit.
    InsufficientFunds,
    /// The process restarted while the session was active.
    Interrupted,
}

/// Payout state of an earnings entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

/// A paid session between a client and an advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub client_id: PartyId,
    pub advisor_id: PartyId,
    pub channel: ChannelKind,
    pub billing: BillingKind,
    /// Per-minute rate in cents. Set for `PerMinute` sessions.
    pub rate_per_minute: Option<Money>,
    /// Flat price in cents. Set for `FixedDuration` sessions.
    pub fixed_price: Option<Money>,
    /// Scheduled length of a fixed-duration session, in minutes.
    pub scheduled_minutes: Option<u32>,
    pub status: SessionStatus,
    /// Signaling room tied to this session.
    pub room_id: RoomId,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds of usage already covered by interval debits.
    pub billed_seconds: i64,
    /// Total charged so far, in cents.
    pub total_amount: Money,
    pub end_reason: Option<EndReason>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// True when `party` is the client or the advisor of this session.
    pub fn is_party(&self, party: &PartyId) -> bool {
        &self.client_id == party || &self.advisor_id == party
    }

    /// The other side of the session, if `party` is one of the two.
    pub fn peer_of(&self, party: &PartyId) -> Option<&PartyId> {
        if party == &self.client_id {
            Some(&self.advisor_id)
        } else if party == &self.advisor_id {
            Some(&self.client_id)
        } else {
            None
        }
    }

    /// Wall-clock duration once the session has both timestamps.
    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
            _ => None,
        }
    }
}

/// Per-minute rates an advisor offers, by channel. `None` means the channel
/// is not offered per-minute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRates {
    pub chat: Option<Money>,
    pub phone: Option<Money>,
    pub video: Option<Money>,
}

impl ChannelRates {
    pub fn for_channel(&self, channel: ChannelKind) -> Option<Money> {
        match channel {
            ChannelKind::Chat => self.chat,
            ChannelKind::Phone => self.phone,
            ChannelKind::Video => self.video,
        }
    }
}

/// A flat-priced block an advisor offers, e.g. 15 minutes of video for $15.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedOffering {
    pub channel: ChannelKind,
    pub minutes: u32,
    pub price: Money,
}

/// Directory entry for an advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorProfile {
    pub id: PartyId,
    pub display_name: String,
    pub status: AdvisorStatus,
    pub rates: ChannelRates,
    pub offerings: Vec<FixedOffering>,
    pub updated_at: DateTime<Utc>,
}

impl AdvisorProfile {
    /// Positive per-minute rate for `channel`, if one is offered.
    pub fn rate_for(&self, channel: ChannelKind) -> Option<Money> {
        self.rates
            .for_channel(channel)
            .filter(|rate| rate.cents() > 0)
    }

    /// Fixed offering matching `channel` and `minutes` exactly, if any.
    pub fn offering_for(&self, channel: ChannelKind, minutes: u32) -> Option<&FixedOffering> {
        self.offerings
            .iter()
            .find(|o| o.channel == channel && o.minutes == minutes)
    }
}

/// One advisor earnings entry, written when a session completes with a
/// non-zero total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsRecord {
    pub id: String,
    pub session_id: SessionId,
    pub advisor_id: PartyId,
    /// Full amount the client was charged.
    pub gross_amount: Money,
    /// The advisor's cut of `gross_amount`.
    pub share_amount: Money,
    pub payout_status: PayoutStatus,
    pub created_at: DateTime<Utc>,
}

/// Aggregate earnings for one advisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub total: Money,
    pub pending: Money,
    pub paid: Money,
    pub entries: u64,
}
