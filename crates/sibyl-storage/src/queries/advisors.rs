// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advisor directory operations.

use std::collections::HashMap;

use rusqlite::params;
use sibyl_core::{
    AdvisorProfile, AdvisorStatus, ChannelKind, ChannelRates, FixedOffering, Money, PartyId,
    SibylError,
};

use crate::database::Database;

fn row_to_profile(row: &rusqlite::Row<'_>) -> Result<AdvisorProfile, rusqlite::Error> {
    let status: String = row.get(2)?;
    let updated_at_raw: String = row.get(6)?;
    Ok(AdvisorProfile {
        id: PartyId(row.get(0)?),
        display_name: row.get(1)?,
        status: super::parse_enum::<AdvisorStatus>(2, &status)?,
        rates: ChannelRates {
            chat: row.get::<_, Option<i64>>(3)?.map(Money::from_cents),
            phone: row.get::<_, Option<i64>>(4)?.map(Money::from_cents),
            video: row.get::<_, Option<i64>>(5)?.map(Money::from_cents),
        },
        offerings: Vec::new(),
        updated_at: super::parse_ts(6, &updated_at_raw)?,
    })
}

fn row_to_offering(row: &rusqlite::Row<'_>) -> Result<(String, FixedOffering), rusqlite::Error> {
    let advisor_id: String = row.get(0)?;
    let channel: String = row.get(1)?;
    Ok((
        advisor_id,
        FixedOffering {
            channel: super::parse_enum::<ChannelKind>(1, &channel)?,
            minutes: row.get(2)?,
            price: Money::from_cents(row.get(3)?),
        },
    ))
}

/// Get an advisor's profile with its fixed offerings.
pub async fn get_advisor(
    db: &Database,
    id: &PartyId,
) -> Result<Option<AdvisorProfile>, SibylError> {
    let id = id.as_str().to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, display_name, status, chat_rate_cents, phone_rate_cents, \
                 video_rate_cents, updated_at FROM advisors WHERE id = ?1",
                params![id],
                row_to_profile,
            );
            let mut profile = match result {
                Ok(profile) => profile,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e),
            };

            let mut stmt = conn.prepare(
                "SELECT advisor_id, channel, minutes, price_cents FROM advisor_offerings \
                 WHERE advisor_id = ?1 ORDER BY channel, minutes",
            )?;
            let rows = stmt.query_map(params![id], row_to_offering)?;
            for row in rows {
                let (_, offering) = row?;
                profile.offerings.push(offering);
            }
            Ok(Some(profile))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or update an advisor profile, replacing its offerings wholesale.
pub async fn upsert_advisor(db: &Database, profile: &AdvisorProfile) -> Result<(), SibylError> {
    let profile = profile.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO advisors (id, display_name, status, chat_rate_cents, \
                 phone_rate_cents, video_rate_cents, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')) \
                 ON CONFLICT(id) DO UPDATE SET \
                 display_name = excluded.display_name, \
                 status = excluded.status, \
                 chat_rate_cents = excluded.chat_rate_cents, \
                 phone_rate_cents = excluded.phone_rate_cents, \
                 video_rate_cents = excluded.video_rate_cents, \
                 updated_at = excluded.updated_at",
                params![
                    profile.id.as_str(),
                    profile.display_name,
                    profile.status.to_string(),
                    profile.rates.chat.map(Money::cents),
                    profile.rates.phone.map(Money::cents),
                    profile.rates.video.map(Money::cents),
                ],
            )?;
            tx.execute(
                "DELETE FROM advisor_offerings WHERE advisor_id = ?1",
                params![profile.id.as_str()],
            )?;
            for offering in &profile.offerings {
                tx.execute(
                    "INSERT INTO advisor_offerings (advisor_id, channel, minutes, price_cents) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        profile.id.as_str(),
                        offering.channel.to_string(),
                        offering.minutes,
                        offering.price.cents(),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List every advisor in the directory, offerings included, ordered by
/// display name.
pub async fn list_advisors(db: &Database) -> Result<Vec<AdvisorProfile>, SibylError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, display_name, status, chat_rate_cents, phone_rate_cents, \
                 video_rate_cents, updated_at FROM advisors ORDER BY display_name, id",
            )?;
            let rows = stmt.query_map([], row_to_profile)?;
            let mut profiles = Vec::new();
            for row in rows {
                profiles.push(row?);
            }

            let mut stmt = conn.prepare(
                "SELECT advisor_id, channel, minutes, price_cents FROM advisor_offerings \
                 ORDER BY channel, minutes",
            )?;
            let rows = stmt.query_map([], row_to_offering)?;
            let mut by_advisor: HashMap<String, Vec<FixedOffering>> = HashMap::new();
            for row in rows {
                let (advisor_id, offering) = row?;
                by_advisor.entry(advisor_id).or_default().push(offering);
            }
            for profile in &mut profiles {
                if let Some(offerings) = by_advisor.remove(profile.id.as_str()) {
                    profile.offerings = offerings;
                }
            }
            Ok(profiles)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update an advisor's presence. Returns `NotFound` for an unknown advisor.
pub async fn set_advisor_status(
    db: &Database,
    id: &PartyId,
    status: AdvisorStatus,
) -> Result<(), SibylError> {
    let id_str = id.as_str().to_string();
    let status = status.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE advisors SET status = ?1, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?2",
                params![status, id_str],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 0 {
        return Err(SibylError::NotFound {
            entity: "advisor".to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    fn make_advisor(id: &str, name: &str) -> AdvisorProfile {
        AdvisorProfile {
            id: PartyId::new(id),
            display_name: name.to_string(),
            status: AdvisorStatus::Available,
            rates: ChannelRates {
                chat: Some(Money::from_cents(50)),
                phone: Some(Money::from_cents(150)),
                video: Some(Money::from_cents(200)),
            },
            offerings: vec![
                FixedOffering {
                    channel: ChannelKind::Video,
                    minutes: 15,
                    price: Money::from_cents(1500),
                },
                FixedOffering {
                    channel: ChannelKind::Chat,
                    minutes: 30,
                    price: Money::from_cents(1000),
                },
            ],
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_and_get_advisor_roundtrips() {
        let (db, _dir) = setup_db().await;
        let advisor = make_advisor("oracle", "The Oracle");
        upsert_advisor(&db, &advisor).await.unwrap();

        let retrieved = get_advisor(&db, &advisor.id).await.unwrap().unwrap();
        assert_eq!(retrieved.display_name, "The Oracle");
        assert_eq!(retrieved.status, AdvisorStatus::Available);
        assert_eq!(retrieved.rates.chat, Some(Money::from_cents(50)));
        assert_eq!(retrieved.rates.video, Some(Money::from_cents(200)));
        assert_eq!(retrieved.offerings.len(), 2);
        // Offerings come back ordered by channel then minutes.
        assert_eq!(retrieved.offerings[0].channel, ChannelKind::Chat);
        assert_eq!(retrieved.offerings[1].channel, ChannelKind::Video);
        assert_eq!(retrieved.offerings[1].price, Money::from_cents(1500));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_unknown_advisor_returns_none() {
        let (db, _dir) = setup_db().await;
        let result = get_advisor(&db, &PartyId::new("nobody")).await.unwrap();
        assert!(result.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_replaces_offerings_wholesale() {
        let (db, _dir) = setup_db().await;
        let mut advisor = make_advisor("oracle", "The Oracle");
        upsert_advisor(&db, &advisor).await.unwrap();

        advisor.display_name = "The Oracle of Delphi".to_string();
        advisor.offerings = vec![FixedOffering {
            channel: ChannelKind::Phone,
            minutes: 10,
            price: Money::from_cents(900),
        }];
        upsert_advisor(&db, &advisor).await.unwrap();

        let retrieved = get_advisor(&db, &advisor.id).await.unwrap().unwrap();
        assert_eq!(retrieved.display_name, "The Oracle of Delphi");
        assert_eq!(retrieved.offerings.len(), 1);
        assert_eq!(retrieved.offerings[0].channel, ChannelKind::Phone);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_advisors_groups_offerings() {
        let (db, _dir) = setup_db().await;
        upsert_advisor(&db, &make_advisor("oracle", "The Oracle"))
            .await
            .unwrap();
        let mut seer = make_advisor("seer", "A Seer");
        seer.offerings.clear();
        upsert_advisor(&db, &seer).await.unwrap();

        let all = list_advisors(&db).await.unwrap();
        assert_eq!(all.len(), 2);
        // Ordered by display name: "A Seer" before "The Oracle".
        assert_eq!(all[0].id.as_str(), "seer");
        assert!(all[0].offerings.is_empty());
        assert_eq!(all[1].id.as_str(), "oracle");
        assert_eq!(all[1].offerings.len(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_status_updates_known_advisor() {
        let (db, _dir) = setup_db().await;
        let advisor = make_advisor("oracle", "The Oracle");
        upsert_advisor(&db, &advisor).await.unwrap();

        set_advisor_status(&db, &advisor.id, AdvisorStatus::Busy)
            .await
            .unwrap();
        let retrieved = get_advisor(&db, &advisor.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, AdvisorStatus::Busy);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_status_for_unknown_advisor_is_not_found() {
        let (db, _dir) = setup_db().await;
        let result = set_advisor_status(&db, &PartyId::new("ghost"), AdvisorStatus::Offline).await;
        assert!(matches!(result, Err(SibylError::NotFound { .. })));
        db.close().await.unwrap();
    }
}
