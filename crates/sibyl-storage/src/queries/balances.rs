// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account balance operations.
//!
//! Debits are conditional single-statement UPDATEs: the balance check and
//! the subtraction happen in the same statement, on the single connection
//! thread, so a debit can never overdraw regardless of caller interleaving.

use rusqlite::params;
use sibyl_core::{Money, PartyId, SibylError};

use crate::database::Database;

/// Outcome of the conditional debit UPDATE, resolved inside the closure.
enum DebitOutcome {
    /// Debit applied; holds the new balance.
    Applied(i64),
    /// Balance too low; holds the untouched balance.
    Short(i64),
}

/// Current balance for `account`, zero if no row exists yet.
pub async fn balance(db: &Database, account: &PartyId) -> Result<Money, SibylError> {
    let account = account.as_str().to_string();
    let cents = db
        .connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT amount_cents FROM balances WHERE account_id = ?1",
                params![account],
                |row| row.get::<_, i64>(0),
            );
            match result {
                Ok(cents) => Ok(cents),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(Money::from_cents(cents))
}

/// Atomically subtract `amount` from `account`.
///
/// Returns the new balance, or `InsufficientFunds` carrying the current
/// balance when the account cannot cover the full amount. Never applies a
/// partial debit.
pub async fn debit(db: &Database, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
    let account = account.as_str().to_string();
    let cents = amount.cents();
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE balances SET amount_cents = amount_cents - ?2, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE account_id = ?1 AND amount_cents >= ?2",
                params![account, cents],
            )?;
            let current = conn
                .query_row(
                    "SELECT amount_cents FROM balances WHERE account_id = ?1",
                    params![account],
                    |row| row.get::<_, i64>(0),
                )
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(0),
                    other => Err(other),
                })?;
            if changed == 1 {
                Ok(DebitOutcome::Applied(current))
            } else {
                Ok(DebitOutcome::Short(current))
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        DebitOutcome::Applied(new_balance) => Ok(Money::from_cents(new_balance)),
        DebitOutcome::Short(available) => Err(SibylError::InsufficientFunds {
            required: amount,
            available: Money::from_cents(available),
        }),
    }
}

/// Add `amount` to `account`, creating the row if needed. Returns the new
/// balance.
pub async fn credit(db: &Database, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
    let account = account.as_str().to_string();
    let cents = amount.cents();
    let new_balance = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO balances (account_id, amount_cents, updated_at) \
                 VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')) \
                 ON CONFLICT(account_id) DO UPDATE SET \
                 amount_cents = amount_cents + excluded.amount_cents, \
                 updated_at = excluded.updated_at",
                params![account, cents],
            )?;
            conn.query_row(
                "SELECT amount_cents FROM balances WHERE account_id = ?1",
                params![account],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(Money::from_cents(new_balance))
}
