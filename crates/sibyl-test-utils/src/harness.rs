// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling the full session stack.
//!
//! `TestHarness` wires the coordinator, billing engine, ledgers, signaling
//! rooms and notification bus exactly the way the production binary does,
//! but over in-memory stores and a [`ManualClock`]. Combined with tokio's
//! paused time it makes multi-minute billing scenarios run instantly and
//! deterministically.

use std::sync::Arc;

use sibyl_billing::BillingEngine;
use sibyl_core::sync::LockMap;
use sibyl_core::types::{
    AdvisorProfile, AdvisorStatus, ChannelKind, ChannelRates, FixedOffering, Money, PartyId,
    SessionId,
};
use sibyl_ledger::{BalanceLedger, EarningsLedger};
use sibyl_notify::NotificationBus;
use sibyl_session::{AdvisorDirectory, SessionCoordinator};
use sibyl_signaling::RoomRegistry;

use crate::clock::ManualClock;
use crate::memory_store::{
    MemoryAdvisorStore, MemoryBalanceStore, MemoryEarningsStore, MemorySessionStore,
};
use crate::sink::RecordingSink;

/// Builder for a [`TestHarness`] with seeded balances and advisors.
pub struct TestHarnessBuilder {
    interval_secs: u64,
    share_percent: u8,
    balances: Vec<(PartyId, i64)>,
    advisors: Vec<AdvisorProfile>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            interval_secs: 60,
            share_percent: 70,
            balances: Vec::new(),
            advisors: Vec::new(),
        }
    }

    /// Billing interval in seconds (default 60).
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Advisor share of gross earnings (default 70).
    pub fn with_share_percent(mut self, percent: u8) -> Self {
        self.share_percent = percent;
        self
    }

    /// Seed an account balance, in cents.
    pub fn with_balance(mut self, party: &PartyId, cents: i64) -> Self {
        self.balances.push((party.clone(), cents));
        self
    }

    /// Seed an advisor profile.
    pub fn with_advisor(mut self, profile: AdvisorProfile) -> Self {
        self.advisors.push(profile);
        self
    }

    /// Assemble the stack. The billing terminator is already wired.
    pub fn build(self) -> TestHarness {
        let sessions = Arc::new(MemorySessionStore::new());
        let balance_store = Arc::new(MemoryBalanceStore::new());
        let earnings_store = Arc::new(MemoryEarningsStore::new());
        let advisor_store = Arc::new(MemoryAdvisorStore::new());
        for (party, cents) in &self.balances {
            balance_store.set_balance(party, *cents);
        }
        for profile in &self.advisors {
            advisor_store.seed(profile.clone());
        }

        let balances = Arc::new(BalanceLedger::new(balance_store.clone()));
        let earnings = Arc::new(EarningsLedger::new(earnings_store.clone(), self.share_percent));
        let locks = Arc::new(LockMap::new());
        let billing = Arc::new(BillingEngine::new(
            sessions.clone(),
            balances.clone(),
            locks.clone(),
            self.interval_secs,
        ));
        let rooms = Arc::new(RoomRegistry::new());
        let notify = Arc::new(NotificationBus::new());
        let clock = Arc::new(ManualClock::new());
        let coordinator = Arc::new(SessionCoordinator::new(
            sessions.clone(),
            advisor_store.clone(),
            balances.clone(),
            earnings.clone(),
            billing.clone(),
            rooms.clone(),
            notify.clone(),
            locks,
            clock.clone(),
        ));
        billing
            .set_terminator(coordinator.clone())
            .expect("terminator wired twice");
        let directory = Arc::new(AdvisorDirectory::new(advisor_store.clone(), notify.clone()));

        TestHarness {
            coordinator,
            directory,
            billing,
            rooms,
            notify,
            balances,
            earnings,
            sessions,
            balance_store,
            clock,
        }
    }
}

/// A fully wired in-memory session stack.
pub struct TestHarness {
    pub coordinator: Arc<SessionCoordinator>,
    pub directory: Arc<AdvisorDirectory>,
    pub billing: Arc<BillingEngine>,
    pub rooms: Arc<RoomRegistry>,
    pub notify: Arc<NotificationBus>,
    pub balances: Arc<BalanceLedger>,
    pub earnings: Arc<EarningsLedger>,
    pub sessions: Arc<MemorySessionStore>,
    pub balance_store: Arc<MemoryBalanceStore>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Registers a recording connection for `party` on the notification bus.
    pub fn connect(&self, party: &PartyId) -> Arc<RecordingSink> {
        let sink = RecordingSink::new(&format!("conn-{party}"));
        self.notify.register(party, sink.clone());
        sink
    }

    /// Advances both the wall clock and tokio's virtual time by `seconds`,
    /// then yields so billing timers can run.
    pub async fn advance_secs(&self, seconds: u64) {
        self.clock.advance_secs(seconds as i64);
        tokio::time::advance(std::time::Duration::from_secs(seconds)).await;
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Current balance for `party`, in cents.
    pub async fn balance_cents(&self, party: &PartyId) -> i64 {
        self.balances
            .balance(party)
            .await
            .expect("memory balance read")
            .cents()
    }

    /// Session row as persisted right now.
    pub async fn session_row(&self, id: &SessionId) -> sibyl_core::types::Session {
        self.coordinator
            .get(id)
            .await
            .expect("memory session read")
            .expect("session exists")
    }
}

/// A ready-made available advisor: 100 cents/min chat, 200 cents/min video,
/// and a 30-minute video offering at 1500 cents.
pub fn standard_advisor(id: &str) -> AdvisorProfile {
    AdvisorProfile {
        id: PartyId::new(id),
        display_name: format!("Advisor {id}"),
        status: AdvisorStatus::Available,
        rates: ChannelRates {
            chat: Some(Money::from_cents(100)),
            phone: None,
            video: Some(Money::from_cents(200)),
        },
        offerings: vec![FixedOffering {
            channel: ChannelKind::Video,
            minutes: 30,
            price: Money::from_cents(1_500),
        }],
        updated_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sibyl_core::types::{BillingKind, SessionStatus};

    #[tokio::test(start_paused = true)]
    async fn harness_runs_a_full_metered_lifecycle() {
        let client = PartyId::new("client-1");
        let advisor = PartyId::new("advisor-1");
        let harness = TestHarness::builder()
            .with_balance(&client, 500)
            .with_advisor(standard_advisor("advisor-1"))
            .build();
        let advisor_conn = harness.connect(&advisor);

        let session = harness
            .coordinator
            .request(&client, &advisor, ChannelKind::Chat, BillingKind::PerMinute, None)
            .await
            .unwrap();
        harness.coordinator.accept(&session.id, &advisor).await.unwrap();
        harness.clock.advance_secs(150);
        let ended = harness.coordinator.end(&session.id, &client).await.unwrap();

        assert_eq!(ended.status, SessionStatus::Completed);
        assert_eq!(ended.total_amount, Money::from_cents(250));
        assert_eq!(harness.balance_cents(&client).await, 250);
        assert!(!advisor_conn.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn advance_secs_drives_billing_timers() {
        let client = PartyId::new("client-1");
        let advisor = PartyId::new("advisor-1");
        let harness = TestHarness::builder()
            .with_balance(&client, 1_000)
            .with_advisor(standard_advisor("advisor-1"))
            .build();

        let session = harness
            .coordinator
            .request(&client, &advisor, ChannelKind::Chat, BillingKind::PerMinute, None)
            .await
            .unwrap();
        harness.coordinator.accept(&session.id, &advisor).await.unwrap();
        harness.advance_secs(61).await;

        assert_eq!(harness.balance_cents(&client).await, 900);
        let row = harness.session_row(&session.id).await;
        assert_eq!(row.total_amount, Money::from_cents(100));
        assert_eq!(row.billed_seconds, 60);
    }
}
