// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-session billing timer and tick logic.
//!
//! Lock discipline: [`BillingEngine::tick`] takes the session lock shared
//! with the coordinator, and releases it before invoking the terminator,
//! which re-acquires it to finalize. Timer tasks are cancelled only between
//! ticks, never mid-debit, so a charged amount is always also persisted on
//! the session row.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sibyl_core::{
    BillingKind, EndReason, LockMap, Money, PartyId, Session, SessionId, SessionStatus,
    SessionStore, SibylError,
};
use sibyl_ledger::BalanceLedger;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::terminator::SessionTerminator;

/// What a single billing tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The interval was debited; `total` is the session's charge so far.
    Charged { total: Money },
    /// The session is no longer active; the timer should wind down.
    Stopped,
    /// The debit failed and the session was forced to completion.
    Exhausted,
}

/// In-memory mirror of one session's billing progress.
///
/// The session row is the durable source of truth; this exists so the
/// engine knows which sessions it is driving and for introspection.
#[derive(Debug, Clone)]
pub struct BillingContext {
    pub session_id: SessionId,
    pub client_id: PartyId,
    /// Per-minute rate being charged.
    pub rate: Money,
    /// Seconds covered by completed ticks.
    pub billed_seconds: i64,
    /// Sum of all tick debits.
    pub total_billed: Money,
}

struct TimerEntry {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives interval debits for active per-minute sessions.
pub struct BillingEngine {
    store: Arc<dyn SessionStore>,
    balances: Arc<BalanceLedger>,
    locks: Arc<LockMap<SessionId>>,
    interval_secs: u64,
    contexts: DashMap<SessionId, BillingContext>,
    timers: DashMap<SessionId, TimerEntry>,
    terminator: OnceCell<Arc<dyn SessionTerminator>>,
}

impl BillingEngine {
    /// `locks` must be the same map the session coordinator serializes
    /// lifecycle operations on.
    pub fn new(
        store: Arc<dyn SessionStore>,
        balances: Arc<BalanceLedger>,
        locks: Arc<LockMap<SessionId>>,
        interval_secs: u64,
    ) -> Self {
        Self {
            store,
            balances,
            locks,
            interval_secs,
            contexts: DashMap::new(),
            timers: DashMap::new(),
            terminator: OnceCell::new(),
        }
    }

    /// Wire in the terminator. Called once at composition time.
    pub fn set_terminator(&self, terminator: Arc<dyn SessionTerminator>) -> Result<(), SibylError> {
        self.terminator
            .set(terminator)
            .map_err(|_| SibylError::Internal("billing terminator already wired".into()))
    }

    /// Seconds between debits.
    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    /// True while a timer is driving this session.
    pub fn is_billing(&self, session_id: &SessionId) -> bool {
        self.contexts.contains_key(session_id)
    }

    /// Number of sessions currently being billed.
    pub fn active_count(&self) -> usize {
        self.contexts.len()
    }

    /// Begin interval billing for a just-activated per-minute session.
    ///
    /// The first debit lands one full interval after this call; the
    /// activation itself is free.
    pub fn start(self: &Arc<Self>, session: &Session) -> Result<(), SibylError> {
        if session.billing != BillingKind::PerMinute {
            return Err(SibylError::Internal(format!(
                "session {} is not billed per-minute",
                session.id
            )));
        }
        if session.status != SessionStatus::Active {
            return Err(SibylError::Internal(format!(
                "cannot bill session {} in status {}",
                session.id, session.status
            )));
        }
        let rate = session.rate_per_minute.ok_or_else(|| {
            SibylError::Internal(format!("session {} has no per-minute rate", session.id))
        })?;
        if self.contexts.contains_key(&session.id) {
            return Err(SibylError::Internal(format!(
                "billing already running for session {}",
                session.id
            )));
        }

        self.contexts.insert(
            session.id.clone(),
            BillingContext {
                session_id: session.id.clone(),
                client_id: session.client_id.clone(),
                rate,
                billed_seconds: session.billed_seconds,
                total_billed: session.total_amount,
            },
        );

        let engine = Arc::clone(self);
        let session_id = session.id.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = Duration::from_secs(self.interval_secs);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => match engine.tick(&session_id).await {
                        Ok(TickOutcome::Charged { total }) => {
                            debug!(session_id = %session_id, total = %total, "billing tick charged");
                        }
                        Ok(TickOutcome::Stopped) => {
                            engine.discard(&session_id);
                            break;
                        }
                        Ok(TickOutcome::Exhausted) => break,
                        Err(e) => {
                            warn!(
                                session_id = %session_id,
                                error = %e,
                                "billing tick failed; retrying next interval"
                            );
                        }
                    },
                }
            }
        });
        self.timers.insert(session.id.clone(), TimerEntry { cancel, task });

        info!(
            session_id = %session.id,
            rate = %rate,
            interval_secs = self.interval_secs,
            "billing started"
        );
        Ok(())
    }

    /// Execute one billing interval for `session_id`.
    ///
    /// Charges the prorated rate for one interval in advance, or hands the
    /// session to the terminator when the balance cannot cover it.
    pub async fn tick(&self, session_id: &SessionId) -> Result<TickOutcome, SibylError> {
        let lock = self.locks.lock_handle(session_id);
        let guard = lock.lock().await;

        let Some(mut session) = self.store.get_session(session_id).await? else {
            return Ok(TickOutcome::Stopped);
        };
        if session.status != SessionStatus::Active {
            return Ok(TickOutcome::Stopped);
        }
        let rate = session.rate_per_minute.ok_or_else(|| {
            SibylError::Internal(format!("session {session_id} has no per-minute rate"))
        })?;

        let charge = rate.prorated(self.interval_secs as i64);
        if charge.is_zero() {
            // The rate is too small to produce a whole cent per interval;
            // the remainder is collected at settlement.
            session.billed_seconds += self.interval_secs as i64;
            self.store.update_session(&session).await?;
            self.sync_context(&session);
            return Ok(TickOutcome::Charged {
                total: session.total_amount,
            });
        }

        match self.balances.debit(&session.client_id, charge).await {
            Ok(_) => {
                session.billed_seconds += self.interval_secs as i64;
                session.total_amount += charge;
                self.store.update_session(&session).await?;
                self.sync_context(&session);
                metrics::counter!("sibyl_billing_ticks_total").increment(1);
                metrics::counter!("sibyl_billing_charged_cents_total")
                    .increment(charge.cents() as u64);
                Ok(TickOutcome::Charged {
                    total: session.total_amount,
                })
            }
            Err(SibylError::InsufficientFunds { available, .. }) => {
                info!(
                    session_id = %session_id,
                    required = %charge,
                    available = %available,
                    "billing debit failed; forcing completion"
                );
                // The terminator re-acquires the session lock to finalize.
                drop(guard);
                let terminator = self.terminator.get().ok_or_else(|| {
                    SibylError::Internal("billing terminator not wired".into())
                })?;
                terminator
                    .force_complete(session_id, EndReason::InsufficientFunds)
                    .await?;
                metrics::counter!("sibyl_billing_exhausted_total").increment(1);
                Ok(TickOutcome::Exhausted)
            }
            Err(e) => Err(e),
        }
    }

    /// Stop billing for a session and wait for its timer task to exit.
    ///
    /// Cancellation lands between ticks, so an in-flight debit always
    /// completes and gets persisted before the task winds down. Callers
    /// must not hold the session lock.
    pub async fn stop(&self, session_id: &SessionId) -> Option<BillingContext> {
        if let Some((_, entry)) = self.timers.remove(session_id) {
            entry.cancel.cancel();
            if let Err(e) = entry.task.await
                && !e.is_cancelled()
            {
                warn!(session_id = %session_id, error = %e, "billing timer task panicked");
            }
        }
        self.contexts.remove(session_id).map(|(_, ctx)| ctx)
    }

    /// Drop billing state without waiting for the timer task.
    ///
    /// Used on the force-completion path, which runs inside the timer task
    /// itself; the task breaks out of its loop right after.
    pub fn discard(&self, session_id: &SessionId) {
        self.timers.remove(session_id);
        self.contexts.remove(session_id);
    }

    fn sync_context(&self, session: &Session) {
        if let Some(mut ctx) = self.contexts.get_mut(&session.id) {
            ctx.billed_seconds = session.billed_seconds;
            ctx.total_billed = session.total_amount;
        }
    }
}
