// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advisor earnings ledger.
//!
//! When a session settles with a non-zero total, the advisor is credited a
//! configured percentage of the gross, truncated to whole cents. Entries
//! start `pending` and flip to `paid` in bulk when a payout runs.

use std::sync::Arc;

use sibyl_core::{
    EarningsRecord, EarningsStore, EarningsSummary, Money, PartyId, PayoutStatus, SessionId,
    SibylError,
};
use tracing::debug;

pub struct EarningsLedger {
    store: Arc<dyn EarningsStore>,
    share_percent: u8,
}

impl EarningsLedger {
    /// `share_percent` is the advisor's cut of the gross, in whole percent.
    pub fn new(store: Arc<dyn EarningsStore>, share_percent: u8) -> Self {
        Self {
            store,
            share_percent,
        }
    }

    pub fn share_percent(&self) -> u8 {
        self.share_percent
    }

    /// Record the advisor's share of a settled session.
    ///
    /// Sessions that settle at zero produce no entry; the ledger only holds
    /// money that actually moved.
    pub async fn record_session_earnings(
        &self,
        session_id: &SessionId,
        advisor_id: &PartyId,
        gross: Money,
    ) -> Result<Option<EarningsRecord>, SibylError> {
        if gross.is_zero() {
            return Ok(None);
        }
        if gross.cents() < 0 {
            return Err(SibylError::Internal(format!(
                "negative session total for {session_id}: {gross}"
            )));
        }

        let record = EarningsRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            advisor_id: advisor_id.clone(),
            gross_amount: gross,
            share_amount: gross.percent_share(self.share_percent),
            payout_status: PayoutStatus::Pending,
            created_at: chrono::Utc::now(),
        };
        self.store.record_earning(&record).await?;
        debug!(
            session_id = %session_id,
            advisor_id = %advisor_id,
            gross = %gross,
            share = %record.share_amount,
            "session earnings recorded"
        );
        Ok(Some(record))
    }

    /// All earnings entries for an advisor, newest first.
    pub async fn list_for(&self, advisor: &PartyId) -> Result<Vec<EarningsRecord>, SibylError> {
        self.store.list_earnings(advisor).await
    }

    /// Aggregate totals for an advisor.
    pub async fn summary_for(&self, advisor: &PartyId) -> Result<EarningsSummary, SibylError> {
        self.store.earnings_summary(advisor).await
    }

    /// Flip every pending entry for an advisor to paid. Returns the number
    /// of entries affected.
    pub async fn mark_paid(&self, advisor: &PartyId) -> Result<u64, SibylError> {
        let changed = self.store.mark_earnings_paid(advisor).await?;
        if changed > 0 {
            debug!(advisor_id = %advisor, entries = changed, "payout recorded");
        }
        Ok(changed)
    }
}
