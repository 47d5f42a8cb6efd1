// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.

use rusqlite::params;
use sibyl_core::{
    BillingKind, ChannelKind, EndReason, Money, PartyId, RoomId, Session, SessionId,
    SessionStatus, SibylError,
};

use crate::database::Database;

const SESSION_COLUMNS: &str = "id, client_id, advisor_id, channel, billing, \
     rate_per_minute_cents, fixed_price_cents, scheduled_minutes, status, room_id, \
     started_at, ended_at, billed_seconds, total_amount_cents, end_reason, created_at";

/// Map one row (selected via [`SESSION_COLUMNS`]) to a [`Session`].
fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, rusqlite::Error> {
    let channel: String = row.get(3)?;
    let billing: String = row.get(4)?;
    let status: String = row.get(8)?;
    let started_at = match row.get::<_, Option<String>>(10)? {
        Some(raw) => Some(super::parse_ts(10, &raw)?),
        None => None,
    };
    let ended_at = match row.get::<_, Option<String>>(11)? {
        Some(raw) => Some(super::parse_ts(11, &raw)?),
        None => None,
    };
    let end_reason = match row.get::<_, Option<String>>(14)? {
        Some(raw) => Some(super::parse_enum::<EndReason>(14, &raw)?),
        None => None,
    };
    let created_at_raw: String = row.get(15)?;

    Ok(Session {
        id: SessionId(row.get(0)?),
        client_id: PartyId(row.get(1)?),
        advisor_id: PartyId(row.get(2)?),
        channel: super::parse_enum::<ChannelKind>(3, &channel)?,
        billing: super::parse_enum::<BillingKind>(4, &billing)?,
        rate_per_minute: row.get::<_, Option<i64>>(5)?.map(Money::from_cents),
        fixed_price: row.get::<_, Option<i64>>(6)?.map(Money::from_cents),
        scheduled_minutes: row.get(7)?,
        status: super::parse_enum::<SessionStatus>(8, &status)?,
        room_id: RoomId(row.get(9)?),
        started_at,
        ended_at,
        billed_seconds: row.get(12)?,
        total_amount: Money::from_cents(row.get(13)?),
        end_reason,
        created_at: super::parse_ts(15, &created_at_raw)?,
    })
}

/// Insert a new session row.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), SibylError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, client_id, advisor_id, channel, billing, \
                 rate_per_minute_cents, fixed_price_cents, scheduled_minutes, status, room_id, \
                 started_at, ended_at, billed_seconds, total_amount_cents, end_reason, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    session.id.as_str(),
                    session.client_id.as_str(),
                    session.advisor_id.as_str(),
                    session.channel.to_string(),
                    session.billing.to_string(),
                    session.rate_per_minute.map(Money::cents),
                    session.fixed_price.map(Money::cents),
                    session.scheduled_minutes,
                    session.status.to_string(),
                    session.room_id.as_str(),
                    session.started_at.map(super::format_ts),
                    session.ended_at.map(super::format_ts),
                    session.billed_seconds,
                    session.total_amount.cents(),
                    session.end_reason.map(|r| r.to_string()),
                    super::format_ts(session.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session by id.
pub async fn get_session(db: &Database, id: &SessionId) -> Result<Option<Session>, SibylError> {
    let id = id.as_str().to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist the mutable fields of a session.
///
/// Identity and pricing columns are written once at creation and never
/// change afterwards. Returns `NotFound` if the row does not exist.
pub async fn update_session(db: &Database, session: &Session) -> Result<(), SibylError> {
    let session = session.clone();
    let session_id = session.id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET status = ?1, started_at = ?2, ended_at = ?3, \
                 billed_seconds = ?4, total_amount_cents = ?5, end_reason = ?6 \
                 WHERE id = ?7",
                params![
                    session.status.to_string(),
                    session.started_at.map(super::format_ts),
                    session.ended_at.map(super::format_ts),
                    session.billed_seconds,
                    session.total_amount.cents(),
                    session.end_reason.map(|r| r.to_string()),
                    session.id.as_str(),
                ],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 0 {
        return Err(SibylError::NotFound {
            entity: "session".to_string(),
            id: session_id,
        });
    }
    Ok(())
}

/// List sessions where `party` is either side, newest first.
pub async fn list_sessions_for_party(
    db: &Database,
    party: &PartyId,
    limit: Option<u32>,
) -> Result<Vec<Session>, SibylError> {
    let party = party.as_str().to_string();
    db.connection()
        .call(move |conn| {
            let mut sessions = Vec::new();
            match limit {
                Some(lim) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions \
                         WHERE client_id = ?1 OR advisor_id = ?1 \
                         ORDER BY created_at DESC LIMIT ?2"
                    ))?;
                    let rows = stmt.query_map(params![party, lim], row_to_session)?;
                    for row in rows {
                        sessions.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions \
                         WHERE client_id = ?1 OR advisor_id = ?1 \
                         ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![party], row_to_session)?;
                    for row in rows {
                        sessions.push(row?);
                    }
                }
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all sessions currently in `status`.
///
/// Used on startup to find sessions left `active` by a crash.
pub async fn list_sessions_with_status(
    db: &Database,
    status: SessionStatus,
) -> Result<Vec<Session>, SibylError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = ?1 \
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![status], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    fn make_session(id: &str, client: &str, advisor: &str) -> Session {
        Session {
            id: SessionId(id.to_string()),
            client_id: PartyId::new(client),
            advisor_id: PartyId::new(advisor),
            channel: ChannelKind::Video,
            billing: BillingKind::PerMinute,
            rate_per_minute: Some(Money::from_cents(100)),
            fixed_price: None,
            scheduled_minutes: None,
            status: SessionStatus::Pending,
            room_id: RoomId::generate(),
            started_at: None,
            ended_at: None,
            billed_seconds: 0,
            total_amount: Money::ZERO,
            end_reason: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_and_get_session_roundtrips() {
        let (db, _dir) = setup_db().await;
        let session = make_session("sess-1", "client-1", "advisor-1");

        create_session(&db, &session).await.unwrap();
        let retrieved = get_session(&db, &session.id).await.unwrap().unwrap();

        assert_eq!(retrieved.id, session.id);
        assert_eq!(retrieved.client_id, session.client_id);
        assert_eq!(retrieved.advisor_id, session.advisor_id);
        assert_eq!(retrieved.channel, ChannelKind::Video);
        assert_eq!(retrieved.billing, BillingKind::PerMinute);
        assert_eq!(retrieved.rate_per_minute, Some(Money::from_cents(100)));
        assert_eq!(retrieved.fixed_price, None);
        assert_eq!(retrieved.status, SessionStatus::Pending);
        assert_eq!(retrieved.billed_seconds, 0);
        assert_eq!(retrieved.total_amount, Money::ZERO);
        assert_eq!(retrieved.created_at, session.created_at);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_nonexistent_session_returns_none() {
        let (db, _dir) = setup_db().await;
        let missing = SessionId("no-such-session".to_string());
        let result = get_session(&db, &missing).await.unwrap();
        assert!(result.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_session_persists_mutable_fields() {
        let (db, _dir) = setup_db().await;
        let mut session = make_session("sess-upd", "client-1", "advisor-1");
        create_session(&db, &session).await.unwrap();

        session.status = SessionStatus::Completed;
        session.started_at = Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap());
        session.ended_at = Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 3, 30).unwrap());
        session.billed_seconds = 150;
        session.total_amount = Money::from_cents(250);
        session.end_reason = Some(EndReason::Normal);
        update_session(&db, &session).await.unwrap();

        let retrieved = get_session(&db, &session.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, SessionStatus::Completed);
        assert_eq!(retrieved.billed_seconds, 150);
        assert_eq!(retrieved.total_amount, Money::from_cents(250));
        assert_eq!(retrieved.end_reason, Some(EndReason::Normal));
        assert_eq!(retrieved.duration_seconds(), Some(150));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_unknown_session_is_not_found() {
        let (db, _dir) = setup_db().await;
        let session = make_session("ghost", "client-1", "advisor-1");
        let result = update_session(&db, &session).await;
        assert!(matches!(result, Err(SibylError::NotFound { .. })));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_sessions_for_party_matches_either_side() {
        let (db, _dir) = setup_db().await;
        let mut s1 = make_session("s1", "alice", "oracle");
        let mut s2 = make_session("s2", "bob", "oracle");
        let s3 = make_session("s3", "alice", "seer");
        s1.created_at = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        s2.created_at = Utc.with_ymd_and_hms(2026, 1, 1, 11, 0, 0).unwrap();

        create_session(&db, &s1).await.unwrap();
        create_session(&db, &s2).await.unwrap();
        create_session(&db, &s3).await.unwrap();

        let oracle = list_sessions_for_party(&db, &PartyId::new("oracle"), None)
            .await
            .unwrap();
        assert_eq!(oracle.len(), 2);
        // Newest first.
        assert_eq!(oracle[0].id.as_str(), "s2");
        assert_eq!(oracle[1].id.as_str(), "s1");

        let alice = list_sessions_for_party(&db, &PartyId::new("alice"), None)
            .await
            .unwrap();
        assert_eq!(alice.len(), 2);

        let limited = list_sessions_for_party(&db, &PartyId::new("oracle"), Some(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id.as_str(), "s2");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_sessions_with_status_filters() {
        let (db, _dir) = setup_db().await;
        let s1 = make_session("s1", "alice", "oracle");
        let mut s2 = make_session("s2", "bob", "oracle");
        s2.status = SessionStatus::Active;

        create_session(&db, &s1).await.unwrap();
        create_session(&db, &s2).await.unwrap();

        let active = list_sessions_with_status(&db, SessionStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id.as_str(), "s2");

        let completed = list_sessions_with_status(&db, SessionStatus::Completed)
            .await
            .unwrap();
        assert!(completed.is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fixed_duration_fields_roundtrip() {
        let (db, _dir) = setup_db().await;
        let mut session = make_session("fixed-1", "alice", "oracle");
        session.billing = BillingKind::FixedDuration;
        session.rate_per_minute = None;
        session.fixed_price = Some(Money::from_cents(1500));
        session.scheduled_minutes = Some(15);

        create_session(&db, &session).await.unwrap();
        let retrieved = get_session(&db, &session.id).await.unwrap().unwrap();
        assert_eq!(retrieved.billing, BillingKind::FixedDuration);
        assert_eq!(retrieved.rate_per_minute, None);
        assert_eq!(retrieved.fixed_price, Some(Money::from_cents(1500)));
        assert_eq!(retrieved.scheduled_minutes, Some(15));

        db.close().await.unwrap();
    }
}
