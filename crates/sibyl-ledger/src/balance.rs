// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client balance ledger.
//!
//! All mutations of one account go through a per-account lock, so the
//! read-then-debit in [`BalanceLedger::debit_up_to`] cannot race another
//! ledger operation on the same account. The storage layer additionally
//! refuses to overdraw, whatever the caller does.

use std::sync::Arc;

use sibyl_core::{BalanceStore, LockMap, Money, PartyId, SibylError};
use tracing::debug;

/// Ledger over client account balances. No refunds: money only leaves an
/// account through a debit that the balance fully covers, or a capped
/// settlement via [`debit_up_to`](Self::debit_up_to).
pub struct BalanceLedger {
    store: Arc<dyn BalanceStore>,
    locks: LockMap<PartyId>,
}

impl BalanceLedger {
    pub fn new(store: Arc<dyn BalanceStore>) -> Self {
        Self {
            store,
            locks: LockMap::new(),
        }
    }

    /// Current balance. Unknown accounts read as zero.
    pub async fn balance(&self, account: &PartyId) -> Result<Money, SibylError> {
        self.store.balance(account).await
    }

    /// Add funds to an account. The amount must be positive.
    pub async fn credit(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
        if amount.cents() <= 0 {
            return Err(SibylError::Validation {
                message: format!("credit amount must be positive, got {amount}"),
            });
        }
        let lock = self.locks.lock_handle(account);
        let _guard = lock.lock().await;
        let new_balance = self.store.credit(account, amount).await?;
        debug!(account = %account, amount = %amount, balance = %new_balance, "balance credited");
        Ok(new_balance)
    }

    /// Debit the full `amount` or nothing.
    ///
    /// Returns the new balance, or `InsufficientFunds` carrying what was
    /// available. The amount must be positive.
    pub async fn debit(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
        if amount.cents() <= 0 {
            return Err(SibylError::Validation {
                message: format!("debit amount must be positive, got {amount}"),
            });
        }
        let lock = self.locks.lock_handle(account);
        let _guard = lock.lock().await;
        self.store.debit(account, amount).await
    }

    /// Debit as much of `amount` as the balance covers, and report what was
    /// actually taken.
    ///
    /// Used for final settlement, where the remainder owed is capped at
    /// whatever the client still has. A non-positive `amount` takes nothing.
    pub async fn debit_up_to(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
        if amount.cents() <= 0 {
            return Ok(Money::ZERO);
        }
        let lock = self.locks.lock_handle(account);
        let _guard = lock.lock().await;

        let available = self.store.balance(account).await?;
        let take = amount.min(available);
        if take.is_zero() {
            debug!(account = %account, owed = %amount, "settlement found empty balance");
            return Ok(Money::ZERO);
        }
        self.store.debit(account, take).await?;
        debug!(account = %account, owed = %amount, taken = %take, "settlement debit applied");
        Ok(take)
    }
}
