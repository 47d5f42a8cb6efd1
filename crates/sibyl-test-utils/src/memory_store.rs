// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementations of the store traits.
//!
//! These mirror the observable behavior of `sibyl-storage` (ordering,
//! `NotFound` cases, atomic balance debits) without touching disk, so the
//! coordinator and billing engine can be tested against the same contracts
//! the SQLite adapter honors.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sibyl_core::error::SibylError;
use sibyl_core::types::{
    AdvisorProfile, AdvisorStatus, EarningsRecord, EarningsSummary, Money, PartyId, PayoutStatus,
    Session, SessionId, SessionStatus,
};

/// In-memory [`sibyl_core::traits::SessionStore`].
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a session row directly, bypassing lifecycle validation.
    pub fn seed(&self, session: Session) {
        self.sessions.lock().unwrap().insert(session.id.clone(), session);
    }
}

#[async_trait]
impl sibyl_core::traits::SessionStore for MemorySessionStore {
    async fn create_session(&self, session: &Session) -> Result<(), SibylError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&session.id) {
            return Err(SibylError::Internal(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, SibylError> {
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }

    async fn update_session(&self, session: &Session) -> Result<(), SibylError> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.contains_key(&session.id) {
            return Err(SibylError::NotFound {
                entity: "session".to_string(),
                id: session.id.to_string(),
            });
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list_sessions_for_party(
        &self,
        party: &PartyId,
        limit: Option<u32>,
    ) -> Result<Vec<Session>, SibylError> {
        let mut rows: Vec<Session> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_party(party))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn list_sessions_with_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Session>, SibylError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }
}

/// In-memory [`sibyl_core::traits::BalanceStore`] with atomic debits.
#[derive(Default)]
pub struct MemoryBalanceStore {
    balances: Mutex<HashMap<PartyId, i64>>,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, account: &PartyId, cents: i64) -> Self {
        self.balances.lock().unwrap().insert(account.clone(), cents);
        self
    }

    pub fn set_balance(&self, account: &PartyId, cents: i64) {
        self.balances.lock().unwrap().insert(account.clone(), cents);
    }
}

#[async_trait]
impl sibyl_core::traits::BalanceStore for MemoryBalanceStore {
    async fn balance(&self, account: &PartyId) -> Result<Money, SibylError> {
        let balances = self.balances.lock().unwrap();
        Ok(Money::from_cents(*balances.get(account).unwrap_or(&0)))
    }

    async fn debit(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
        let mut balances = self.balances.lock().unwrap();
        let available = balances.entry(account.clone()).or_insert(0);
        if *available < amount.cents() {
            return Err(SibylError::InsufficientFunds {
                required: amount,
                available: Money::from_cents(*available),
            });
        }
        *available -= amount.cents();
        Ok(Money::from_cents(*available))
    }

    async fn credit(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(account.clone()).or_insert(0);
        *balance += amount.cents();
        Ok(Money::from_cents(*balance))
    }
}

/// In-memory [`sibyl_core::traits::AdvisorStore`].
#[derive(Default)]
pub struct MemoryAdvisorStore {
    advisors: Mutex<HashMap<PartyId, AdvisorProfile>>,
}

impl MemoryAdvisorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_advisor(self, profile: AdvisorProfile) -> Self {
        self.seed(profile);
        self
    }

    /// Seeds a profile directly, bypassing validation.
    pub fn seed(&self, profile: AdvisorProfile) {
        self.advisors.lock().unwrap().insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl sibyl_core::traits::AdvisorStore for MemoryAdvisorStore {
    async fn get_advisor(&self, id: &PartyId) -> Result<Option<AdvisorProfile>, SibylError> {
        Ok(self.advisors.lock().unwrap().get(id).cloned())
    }

    async fn upsert_advisor(&self, profile: &AdvisorProfile) -> Result<(), SibylError> {
        self.advisors
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn list_advisors(&self) -> Result<Vec<AdvisorProfile>, SibylError> {
        let mut profiles: Vec<AdvisorProfile> =
            self.advisors.lock().unwrap().values().cloned().collect();
        profiles.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(profiles)
    }

    async fn set_advisor_status(
        &self,
        id: &PartyId,
        status: AdvisorStatus,
    ) -> Result<(), SibylError> {
        let mut advisors = self.advisors.lock().unwrap();
        match advisors.get_mut(id) {
            Some(profile) => {
                profile.status = status;
                Ok(())
            }
            None => Err(SibylError::NotFound {
                entity: "advisor".to_string(),
                id: id.to_string(),
            }),
        }
    }
}

/// In-memory [`sibyl_core::traits::EarningsStore`].
#[derive(Default)]
pub struct MemoryEarningsStore {
    entries: Mutex<Vec<EarningsRecord>>,
}

impl MemoryEarningsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl sibyl_core::traits::EarningsStore for MemoryEarningsStore {
    async fn record_earning(&self, record: &EarningsRecord) -> Result<(), SibylError> {
        self.entries.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_earnings(&self, advisor: &PartyId) -> Result<Vec<EarningsRecord>, SibylError> {
        let mut entries: Vec<EarningsRecord> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.advisor_id == advisor)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn earnings_summary(&self, advisor: &PartyId) -> Result<EarningsSummary, SibylError> {
        let entries = self.entries.lock().unwrap();
        let mut summary = EarningsSummary {
            total: Money::ZERO,
            pending: Money::ZERO,
            paid: Money::ZERO,
            entries: 0,
        };
        for entry in entries.iter().filter(|e| &e.advisor_id == advisor) {
            summary.total += entry.share_amount;
            match entry.payout_status {
                PayoutStatus::Pending => summary.pending += entry.share_amount,
                PayoutStatus::Paid => summary.paid += entry.share_amount,
            }
            summary.entries += 1;
        }
        Ok(summary)
    }

    async fn mark_earnings_paid(&self, advisor: &PartyId) -> Result<u64, SibylError> {
        let mut entries = self.entries.lock().unwrap();
        let mut changed = 0;
        for entry in entries
            .iter_mut()
            .filter(|e| &e.advisor_id == advisor && e.payout_status == PayoutStatus::Pending)
        {
            entry.payout_status = PayoutStatus::Paid;
            changed += 1;
        }
        Ok(changed)
    }
}
