// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store traits for persistence backends (SQLite, in-memory doubles).

use async_trait::async_trait;

use crate::error::SibylError;
use crate::types::{
    AdvisorProfile, AdvisorStatus, EarningsRecord, EarningsSummary, Money, PartyId, Session,
    SessionId, SessionStatus,
};

/// Persistence for session rows.
///
/// The store is a dumb record holder; lifecycle rules live in the session
/// coordinator, which serializes all writes for a given session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Fails if the id already exists.
    async fn create_session(&self, session: &Session) -> Result<(), SibylError>;

    /// Fetch a session by id.
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, SibylError>;

    /// Overwrite an existing session row.
    async fn update_session(&self, session: &Session) -> Result<(), SibylError>;

    /// Sessions where `party` is the client or the advisor, newest first.
    async fn list_sessions_for_party(
        &self,
        party: &PartyId,
        limit: Option<u32>,
    ) -> Result<Vec<Session>, SibylError>;

    /// All sessions currently in `status`.
    async fn list_sessions_with_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Session>, SibylError>;
}

/// Persistence for account balances.
///
/// `debit` must be atomic at the storage layer: the balance check and the
/// subtraction happen in one step, so a debit can never drive a balance
/// negative even under races the caller failed to serialize.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Current balance. Unknown accounts read as zero.
    async fn balance(&self, account: &PartyId) -> Result<Money, SibylError>;

    /// Subtract `amount` if the balance covers it, returning the new balance.
    /// Returns `InsufficientFunds` (with the available amount) otherwise,
    /// leaving the balance untouched.
    async fn debit(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError>;

    /// Add `amount`, creating the account at zero first if needed.
    /// Returns the new balance.
    async fn credit(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError>;
}

/// Persistence for advisor earnings entries.
#[async_trait]
pub trait EarningsStore: Send + Sync {
    /// Append one earnings entry.
    async fn record_earning(&self, record: &EarningsRecord) -> Result<(), SibylError>;

    /// All entries for `advisor`, newest first.
    async fn list_earnings(&self, advisor: &PartyId) -> Result<Vec<EarningsRecord>, SibylError>;

    /// Aggregate totals for `advisor`.
    async fn earnings_summary(&self, advisor: &PartyId) -> Result<EarningsSummary, SibylError>;

    /// Flip all pending entries for `advisor` to paid. Returns how many
    /// entries changed.
    async fn mark_earnings_paid(&self, advisor: &PartyId) -> Result<u64, SibylError>;
}

/// Persistence for the advisor directory.
#[async_trait]
pub trait AdvisorStore: Send + Sync {
    /// Fetch one advisor profile.
    async fn get_advisor(&self, id: &PartyId) -> Result<Option<AdvisorProfile>, SibylError>;

    /// Insert or fully replace a profile, including rates and offerings.
    async fn upsert_advisor(&self, profile: &AdvisorProfile) -> Result<(), SibylError>;

    /// Every advisor in the directory.
    async fn list_advisors(&self) -> Result<Vec<AdvisorProfile>, SibylError>;

    /// Update just the presence status. Fails with `NotFound` for an
    /// unknown advisor.
    async fn set_advisor_status(
        &self,
        id: &PartyId,
        status: AdvisorStatus,
    ) -> Result<(), SibylError>;
}
