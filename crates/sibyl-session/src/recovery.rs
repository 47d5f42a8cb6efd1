// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup sweep for sessions orphaned by a process restart.

use metrics::counter;
use sibyl_core::error::SibylError;
use sibyl_core::traits::Clock;
use sibyl_core::types::{EndReason, SessionStatus};
use tracing::warn;

use crate::coordinator::SessionCoordinator;

impl SessionCoordinator {
    /// Settles every session a previous process left `active`.
    ///
    /// Billing timers and connections died with the old process, so each
    /// stale session completes with reason `interrupted` and a total of
    /// whatever the interval debits had already collected. Advisor earnings
    /// are still credited for that collected amount. Nobody is notified.
    /// Must run before the gateway starts accepting traffic.
    pub async fn recover_interrupted(&self) -> Result<u64, SibylError> {
        let stale = self
            .sessions
            .list_sessions_with_status(SessionStatus::Active)
            .await?;
        let mut recovered = 0u64;
        for mut session in stale {
            session.status = SessionStatus::Completed;
            session.ended_at = Some(self.clock.now());
            session.end_reason = Some(EndReason::Interrupted);
            self.sessions.update_session(&session).await?;

            if !session.total_amount.is_zero() {
                self.earnings
                    .record_session_earnings(&session.id, &session.advisor_id, session.total_amount)
                    .await?;
            }
            counter!("sibyl_sessions_ended_total", "reason" => "interrupted").increment(1);
            warn!(
                session_id = %session.id,
                total_amount = %session.total_amount,
                "interrupted session settled at startup"
            );
            recovered += 1;
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use sibyl_billing::BillingEngine;
    use sibyl_core::sync::LockMap;
    use sibyl_core::types::{
        BillingKind, ChannelKind, Money, PartyId, RoomId, Session, SessionId,
    };
    use sibyl_ledger::{BalanceLedger, EarningsLedger};
    use sibyl_notify::NotificationBus;
    use sibyl_signaling::RoomRegistry;
    use sibyl_test_utils::{
        ManualClock, MemoryAdvisorStore, MemoryBalanceStore, MemoryEarningsStore,
        MemorySessionStore,
    };

    use super::*;

    fn stale_session(id: &str, status: SessionStatus, total_cents: i64) -> Session {
        Session {
            id: SessionId(id.to_string()),
            client_id: PartyId::new("client-1"),
            advisor_id: PartyId::new("advisor-1"),
            channel: ChannelKind::Chat,
            billing: BillingKind::PerMinute,
            rate_per_minute: Some(Money::from_cents(100)),
            fixed_price: None,
            scheduled_minutes: None,
            status,
            room_id: RoomId::generate(),
            started_at: Some(Utc::now()),
            ended_at: None,
            billed_seconds: (total_cents * 60) / 100,
            total_amount: Money::from_cents(total_cents),
            end_reason: None,
            created_at: Utc::now(),
        }
    }

    fn coordinator_over(sessions: Arc<MemorySessionStore>) -> (SessionCoordinator, Arc<EarningsLedger>) {
        let balances = Arc::new(BalanceLedger::new(Arc::new(MemoryBalanceStore::new())));
        let earnings = Arc::new(EarningsLedger::new(Arc::new(MemoryEarningsStore::new()), 70));
        let locks = Arc::new(LockMap::new());
        let billing = Arc::new(BillingEngine::new(
            sessions.clone(),
            balances.clone(),
            locks.clone(),
            60,
        ));
        let coordinator = SessionCoordinator::new(
            sessions,
            Arc::new(MemoryAdvisorStore::new()),
            balances,
            earnings.clone(),
            billing,
            Arc::new(RoomRegistry::new()),
            Arc::new(NotificationBus::new()),
            locks,
            Arc::new(ManualClock::new()),
        );
        (coordinator, earnings)
    }

    #[tokio::test]
    async fn settles_stale_active_sessions_and_credits_earnings() {
        let sessions = Arc::new(MemorySessionStore::new());
        sessions.seed(stale_session("s-active", SessionStatus::Active, 300));
        sessions.seed(stale_session("s-pending", SessionStatus::Pending, 0));
        sessions.seed(stale_session("s-done", SessionStatus::Completed, 100));
        let (coordinator, earnings) = coordinator_over(sessions.clone());

        let recovered = coordinator.recover_interrupted().await.unwrap();
        assert_eq!(recovered, 1);

        let row = coordinator
            .get(&SessionId("s-active".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, SessionStatus::Completed);
        assert_eq!(row.end_reason, Some(EndReason::Interrupted));
        assert!(row.ended_at.is_some());
        assert_eq!(row.total_amount, Money::from_cents(300));

        let summary = earnings.summary_for(&PartyId::new("advisor-1")).await.unwrap();
        assert_eq!(summary.total, Money::from_cents(210));
        assert_eq!(summary.entries, 1);

        // Pending sessions survive a restart untouched.
        let pending = coordinator
            .get(&SessionId("s-pending".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn zero_billed_sessions_settle_without_earnings() {
        let sessions = Arc::new(MemorySessionStore::new());
        sessions.seed(stale_session("s-free", SessionStatus::Active, 0));
        let (coordinator, earnings) = coordinator_over(sessions);

        assert_eq!(coordinator.recover_interrupted().await.unwrap(), 1);

        let row = coordinator
            .get(&SessionId("s-free".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, SessionStatus::Completed);
        assert_eq!(row.total_amount, Money::ZERO);
        let summary = earnings.summary_for(&PartyId::new("advisor-1")).await.unwrap();
        assert_eq!(summary.entries, 0);
    }

    #[tokio::test]
    async fn nothing_to_recover_is_a_clean_zero() {
        let (coordinator, _) = coordinator_over(Arc::new(MemorySessionStore::new()));
        assert_eq!(coordinator.recover_interrupted().await.unwrap(), 0);
    }
}
