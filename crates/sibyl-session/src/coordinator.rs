// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session coordinator: every lifecycle transition goes through here.
//!
//! All mutating operations for one session serialize on a per-session lock
//! shared with the billing engine, so a concurrent `end` and a forced
//! termination cannot both finalize the same row; whichever loses the race
//! observes the terminal state and backs off. Ledger mutations for one
//! account serialize inside the [`BalanceLedger`], and the lock order is
//! always session first, account second.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use sibyl_billing::{BillingEngine, SessionTerminator};
use sibyl_core::error::SibylError;
use sibyl_core::events::SessionEvent;
use sibyl_core::sync::LockMap;
use sibyl_core::traits::{AdvisorStore, Clock, SessionStore};
use sibyl_core::types::{
    AdvisorStatus, BillingKind, ChannelKind, EndReason, Money, PartyId, RoomId, Session,
    SessionId, SessionStatus,
};
use sibyl_ledger::{BalanceLedger, EarningsLedger};
use sibyl_notify::NotificationBus;
use sibyl_signaling::RoomRegistry;
use tracing::{debug, info, warn};

/// Coordinates the session state machine across storage, billing, ledgers,
/// signaling and notifications.
///
/// Responsibilities:
/// - Validating and persisting every lifecycle transition
/// - Collecting payment up front for fixed-duration sessions
/// - Starting and stopping the per-minute billing timer
/// - Settling the metered remainder and recording advisor earnings at the end
/// - Tearing down the signaling room once a session is over
/// - Pushing lifecycle events to the affected parties
pub struct SessionCoordinator {
    pub(crate) sessions: Arc<dyn SessionStore>,
    advisors: Arc<dyn AdvisorStore>,
    balances: Arc<BalanceLedger>,
    pub(crate) earnings: Arc<EarningsLedger>,
    billing: Arc<BillingEngine>,
    rooms: Arc<RoomRegistry>,
    notify: Arc<NotificationBus>,
    locks: Arc<LockMap<SessionId>>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl SessionCoordinator {
    /// Wires the coordinator. `locks` must be the same map the billing
    /// engine ticks under, otherwise the per-session serialization breaks.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        advisors: Arc<dyn AdvisorStore>,
        balances: Arc<BalanceLedger>,
        earnings: Arc<EarningsLedger>,
        billing: Arc<BillingEngine>,
        rooms: Arc<RoomRegistry>,
        notify: Arc<NotificationBus>,
        locks: Arc<LockMap<SessionId>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            advisors,
            balances,
            earnings,
            billing,
            rooms,
            notify,
            locks,
            clock,
        }
    }

    /// A client asks an advisor for a session.
    ///
    /// Validates that the advisor is available and prices the requested
    /// terms, and that the client's balance covers at least one minute
    /// (per-minute) or the full price (fixed-duration). Creates the session
    /// in `pending` and notifies the advisor. Nothing is charged yet.
    pub async fn request(
        &self,
        client: &PartyId,
        advisor_id: &PartyId,
        channel: ChannelKind,
        billing: BillingKind,
        scheduled_minutes: Option<u32>,
    ) -> Result<Session, SibylError> {
        if client == advisor_id {
            return Err(SibylError::Validation {
                message: "client and advisor must be different parties".to_string(),
            });
        }
        let profile = self.advisors.get_advisor(advisor_id).await?.ok_or_else(|| {
            SibylError::ProviderUnavailable {
                advisor_id: advisor_id.clone(),
            }
        })?;
        if profile.status != AdvisorStatus::Available {
            return Err(SibylError::ProviderUnavailable {
                advisor_id: advisor_id.clone(),
            });
        }

        let (rate_per_minute, fixed_price, scheduled, price) = match billing {
            BillingKind::PerMinute => {
                let rate = profile.rate_for(channel).ok_or_else(|| {
                    SibylError::PricingNotOffered {
                        advisor_id: advisor_id.clone(),
                        channel,
                    }
                })?;
                (Some(rate), None, None, rate)
            }
            BillingKind::FixedDuration => {
                let minutes = scheduled_minutes.ok_or_else(|| SibylError::Validation {
                    message: "fixed-duration sessions need scheduled_minutes".to_string(),
                })?;
                let offering = profile.offering_for(channel, minutes).ok_or_else(|| {
                    SibylError::PricingNotOffered {
                        advisor_id: advisor_id.clone(),
                        channel,
                    }
                })?;
                (None, Some(offering.price), Some(minutes), offering.price)
            }
        };

        // One minute for metered sessions, the full price for fixed ones.
        let required = price;
        let available = self.balances.balance(client).await?;
        if available < required {
            return Err(SibylError::InsufficientFunds {
                required,
                available,
            });
        }

        let session = Session {
            id: SessionId::generate(),
            client_id: client.clone(),
            advisor_id: advisor_id.clone(),
            channel,
            billing,
            rate_per_minute,
            fixed_price,
            scheduled_minutes: scheduled,
            status: SessionStatus::Pending,
            room_id: RoomId::generate(),
            started_at: None,
            ended_at: None,
            billed_seconds: 0,
            total_amount: Money::ZERO,
            end_reason: None,
            created_at: self.clock.now(),
        };
        self.sessions.create_session(&session).await?;

        info!(
            session_id = %session.id,
            client = %client,
            advisor = %advisor_id,
            channel = %channel,
            billing = %billing,
            price = %price,
            "session requested"
        );
        self.notify
            .send(
                advisor_id,
                &SessionEvent::SessionRequest {
                    session_id: session.id.clone(),
                    client_id: client.clone(),
                    channel,
                    billing,
                    price,
                    scheduled_minutes: scheduled,
                },
            )
            .await?;
        Ok(session)
    }

    /// The advisor takes a pending session live.
    ///
    /// Fixed-duration sessions are paid in full here; if the debit fails the
    /// session stays `pending` so the client can top up and the advisor can
    /// accept again. Per-minute sessions start their billing timer, with the
    /// first debit one interval after activation.
    pub async fn accept(
        &self,
        session_id: &SessionId,
        actor: &PartyId,
    ) -> Result<Session, SibylError> {
        let session = {
            let lock = self.locks.lock_handle(session_id);
            let _guard = lock.lock().await;

            let mut session = self.load(session_id).await?;
            if &session.advisor_id != actor {
                return Err(SibylError::Forbidden {
                    message: format!("only the advisor may accept session {session_id}"),
                });
            }
            if session.status != SessionStatus::Pending {
                return Err(SibylError::InvalidTransition {
                    from: session.status,
                    operation: "accept".to_string(),
                });
            }

            if session.billing == BillingKind::FixedDuration {
                let price = session.fixed_price.ok_or_else(|| {
                    SibylError::Internal(format!(
                        "fixed-duration session {session_id} has no price"
                    ))
                })?;
                self.balances.debit(&session.client_id, price).await?;
                session.total_amount = price;
            }

            session.status = SessionStatus::Active;
            session.started_at = Some(self.clock.now());
            self.sessions.update_session(&session).await?;

            if session.billing == BillingKind::PerMinute {
                self.billing.start(&session)?;
            }
            session
        };

        counter!("sibyl_sessions_started_total").increment(1);
        gauge!("sibyl_active_sessions").increment(1.0);
        info!(
            session_id = %session.id,
            advisor = %actor,
            billing = %session.billing,
            room_id = %session.room_id,
            "session accepted"
        );
        self.notify
            .send(
                &session.client_id,
                &SessionEvent::SessionAccepted {
                    session_id: session.id.clone(),
                    room_id: session.room_id.clone(),
                },
            )
            .await?;
        Ok(session)
    }

    /// The advisor declines a pending session.
    pub async fn reject(
        &self,
        session_id: &SessionId,
        actor: &PartyId,
    ) -> Result<Session, SibylError> {
        let session = {
            let lock = self.locks.lock_handle(session_id);
            let _guard = lock.lock().await;

            let mut session = self.load(session_id).await?;
            if &session.advisor_id != actor {
                return Err(SibylError::Forbidden {
                    message: format!("only the advisor may reject session {session_id}"),
                });
            }
            if session.status != SessionStatus::Pending {
                return Err(SibylError::InvalidTransition {
                    from: session.status,
                    operation: "reject".to_string(),
                });
            }
            session.status = SessionStatus::Rejected;
            self.sessions.update_session(&session).await?;
            session
        };

        counter!("sibyl_sessions_rejected_total").increment(1);
        info!(session_id = %session.id, advisor = %actor, "session rejected");
        self.notify
            .send(
                &session.client_id,
                &SessionEvent::SessionRejected {
                    session_id: session.id.clone(),
                },
            )
            .await?;
        Ok(session)
    }

    /// The client withdraws a pending request.
    pub async fn cancel(
        &self,
        session_id: &SessionId,
        actor: &PartyId,
    ) -> Result<Session, SibylError> {
        let session = {
            let lock = self.locks.lock_handle(session_id);
            let _guard = lock.lock().await;

            let mut session = self.load(session_id).await?;
            if &session.client_id != actor {
                return Err(SibylError::Forbidden {
                    message: format!("only the client may cancel session {session_id}"),
                });
            }
            if session.status != SessionStatus::Pending {
                return Err(SibylError::InvalidTransition {
                    from: session.status,
                    operation: "cancel".to_string(),
                });
            }
            session.status = SessionStatus::Cancelled;
            self.sessions.update_session(&session).await?;
            session
        };

        counter!("sibyl_sessions_cancelled_total").increment(1);
        info!(session_id = %session.id, client = %actor, "session cancelled");
        self.notify
            .send(
                &session.advisor_id,
                &SessionEvent::SessionCancelledByClient {
                    session_id: session.id.clone(),
                },
            )
            .await?;
        Ok(session)
    }

    /// Either party ends an active session; settles and completes it.
    ///
    /// Per-minute sessions owe `rate x elapsed/60`; the interval debits
    /// already collected most of that, so only the remainder is charged,
    /// capped at whatever balance is left. Fixed-duration sessions were paid
    /// at accept time and settle at exactly the agreed price regardless of
    /// elapsed time. Calling `end` on an already-completed session returns
    /// the terminal record unchanged, which tolerates the race against a
    /// billing-forced termination.
    pub async fn end(
        &self,
        session_id: &SessionId,
        actor: &PartyId,
    ) -> Result<Session, SibylError> {
        let (session, elapsed) = {
            let lock = self.locks.lock_handle(session_id);
            let _guard = lock.lock().await;

            let mut session = self.load(session_id).await?;
            if !session.is_party(actor) {
                return Err(SibylError::Forbidden {
                    message: format!("{actor} is not a party to session {session_id}"),
                });
            }
            if session.status == SessionStatus::Completed {
                debug!(session_id = %session_id, "end on a completed session, returning terminal record");
                return Ok(session);
            }
            if session.status != SessionStatus::Active {
                return Err(SibylError::InvalidTransition {
                    from: session.status,
                    operation: "end".to_string(),
                });
            }

            let started = session.started_at.ok_or_else(|| {
                SibylError::Internal(format!("active session {session_id} has no start timestamp"))
            })?;
            let now = self.clock.now();
            let elapsed = (now - started).num_seconds().max(0);

            if session.billing == BillingKind::PerMinute {
                let rate = session.rate_per_minute.ok_or_else(|| {
                    SibylError::Internal(format!("per-minute session {session_id} has no rate"))
                })?;
                let owed = rate.prorated(elapsed);
                let remainder = owed.remaining_after(session.total_amount);
                let charged = self
                    .balances
                    .debit_up_to(&session.client_id, remainder)
                    .await?;
                session.total_amount += charged;
                session.billed_seconds = elapsed;
            }

            session.status = SessionStatus::Completed;
            session.ended_at = Some(now);
            session.end_reason = Some(EndReason::Normal);
            self.sessions.update_session(&session).await?;

            if !session.total_amount.is_zero() {
                self.earnings
                    .record_session_earnings(&session.id, &session.advisor_id, session.total_amount)
                    .await?;
            }
            (session, elapsed)
        };

        // A mid-flight tick needs the session lock to finish, so the
        // cancellation wait happens after the guard is dropped. The tick
        // then sees the completed row and stops without charging.
        self.billing.stop(session_id).await;
        self.rooms.close(&session.room_id).await;

        counter!("sibyl_sessions_ended_total", "reason" => "normal").increment(1);
        gauge!("sibyl_active_sessions").decrement(1.0);
        histogram!("sibyl_session_duration_seconds").record(elapsed as f64);
        info!(
            session_id = %session.id,
            total_amount = %session.total_amount,
            duration_seconds = elapsed,
            "session ended"
        );
        if let Some(peer) = session.peer_of(actor) {
            self.notify
                .send(
                    peer,
                    &SessionEvent::SessionEnded {
                        session_id: session.id.clone(),
                        total_amount: session.total_amount,
                        duration_seconds: elapsed,
                        reason: EndReason::Normal,
                    },
                )
                .await?;
        }
        Ok(session)
    }

    /// Session lookup for read paths (HTTP handlers, histories).
    pub async fn get(&self, session_id: &SessionId) -> Result<Option<Session>, SibylError> {
        self.sessions.get_session(session_id).await
    }

    /// Sessions the party is involved in, newest first.
    pub async fn history(
        &self,
        party: &PartyId,
        limit: Option<u32>,
    ) -> Result<Vec<Session>, SibylError> {
        self.sessions.list_sessions_for_party(party, limit).await
    }

    async fn load(&self, session_id: &SessionId) -> Result<Session, SibylError> {
        self.sessions
            .get_session(session_id)
            .await?
            .ok_or_else(|| SibylError::NotFound {
                entity: "session".to_string(),
                id: session_id.to_string(),
            })
    }
}

#[async_trait]
impl SessionTerminator for SessionCoordinator {
    /// Finalizes a session the billing engine could no longer fund.
    ///
    /// Runs inside the billing timer task with the session lock released by
    /// the engine, re-acquires it here, and becomes a no-op if another
    /// finalize won the race. The total stays at whatever the completed
    /// intervals collected; no settlement debit is attempted against an
    /// account that just failed one.
    async fn force_complete(
        &self,
        session_id: &SessionId,
        reason: EndReason,
    ) -> Result<(), SibylError> {
        let session = {
            let lock = self.locks.lock_handle(session_id);
            let _guard = lock.lock().await;

            let Some(mut session) = self.sessions.get_session(session_id).await? else {
                debug!(session_id = %session_id, "forced completion for a missing session");
                return Ok(());
            };
            if session.status != SessionStatus::Active {
                debug!(
                    session_id = %session_id,
                    status = %session.status,
                    "forced completion raced another finalize"
                );
                return Ok(());
            }

            session.status = SessionStatus::Completed;
            session.ended_at = Some(self.clock.now());
            session.end_reason = Some(reason);
            self.sessions.update_session(&session).await?;

            if !session.total_amount.is_zero() {
                self.earnings
                    .record_session_earnings(&session.id, &session.advisor_id, session.total_amount)
                    .await?;
            }
            session
        };

        // Discard, not stop: awaiting the timer task from inside itself
        // would deadlock. The timer loop exits on its own right after this.
        self.billing.discard(session_id);
        self.rooms.close(&session.room_id).await;

        let duration = session.duration_seconds().unwrap_or(0);
        counter!("sibyl_sessions_ended_total", "reason" => reason.to_string()).increment(1);
        gauge!("sibyl_active_sessions").decrement(1.0);
        histogram!("sibyl_session_duration_seconds").record(duration as f64);
        warn!(
            session_id = %session_id,
            reason = %reason,
            total_amount = %session.total_amount,
            "session force completed"
        );
        let event = SessionEvent::SessionEnded {
            session_id: session.id.clone(),
            total_amount: session.total_amount,
            duration_seconds: duration,
            reason,
        };
        self.notify.send(&session.client_id, &event).await?;
        self.notify.send(&session.advisor_id, &event).await?;
        Ok(())
    }
}
