// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advisor earnings operations.

use rusqlite::params;
use sibyl_core::{
    EarningsRecord, EarningsSummary, Money, PartyId, PayoutStatus, SessionId, SibylError,
};
use tracing::info;

use crate::database::Database;

/// Insert one earnings entry.
pub async fn record_earning(db: &Database, record: &EarningsRecord) -> Result<(), SibylError> {
    let record = record.clone();
    let (session_id, advisor_id, share) = (
        record.session_id.clone(),
        record.advisor_id.clone(),
        record.share_amount,
    );
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO earnings (id, session_id, advisor_id, gross_cents, share_cents, \
                 payout_status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.session_id.as_str(),
                    record.advisor_id.as_str(),
                    record.gross_amount.cents(),
                    record.share_amount.cents(),
                    record.payout_status.to_string(),
                    super::format_ts(record.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    info!(
        session_id = %session_id,
        advisor_id = %advisor_id,
        share = %share,
        "earnings recorded"
    );
    Ok(())
}

fn row_to_earning(row: &rusqlite::Row<'_>) -> Result<EarningsRecord, rusqlite::Error> {
    let payout_status: String = row.get(5)?;
    let created_at_raw: String = row.get(6)?;
    Ok(EarningsRecord {
        id: row.get(0)?,
        session_id: SessionId(row.get(1)?),
        advisor_id: PartyId(row.get(2)?),
        gross_amount: Money::from_cents(row.get(3)?),
        share_amount: Money::from_cents(row.get(4)?),
        payout_status: super::parse_enum::<PayoutStatus>(5, &payout_status)?,
        created_at: super::parse_ts(6, &created_at_raw)?,
    })
}

/// All earnings entries for an advisor, newest first.
pub async fn list_earnings(
    db: &Database,
    advisor: &PartyId,
) -> Result<Vec<EarningsRecord>, SibylError> {
    let advisor = advisor.as_str().to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, advisor_id, gross_cents, share_cents, payout_status, \
                 created_at FROM earnings WHERE advisor_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![advisor], row_to_earning)?;
            let mut earnings = Vec::new();
            for row in rows {
                earnings.push(row?);
            }
            Ok(earnings)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Aggregate share totals for an advisor, split by payout status.
pub async fn earnings_summary(
    db: &Database,
    advisor: &PartyId,
) -> Result<EarningsSummary, SibylError> {
    let advisor = advisor.as_str().to_string();
    let (total, pending, paid, entries) = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(share_cents), 0), \
                 COALESCE(SUM(CASE WHEN payout_status = 'pending' THEN share_cents ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN payout_status = 'paid' THEN share_cents ELSE 0 END), 0), \
                 COUNT(*) FROM earnings WHERE advisor_id = ?1",
                params![advisor],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    Ok(EarningsSummary {
        total: Money::from_cents(total),
        pending: Money::from_cents(pending),
        paid: Money::from_cents(paid),
        entries: entries as u64,
    })
}

/// Flip all pending entries for an advisor to paid. Returns how many rows
/// changed.
pub async fn mark_earnings_paid(db: &Database, advisor: &PartyId) -> Result<u64, SibylError> {
    let advisor = advisor.as_str().to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE earnings SET payout_status = 'paid' \
                 WHERE advisor_id = ?1 AND payout_status = 'pending'",
                params![advisor],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(changed as u64)
}
