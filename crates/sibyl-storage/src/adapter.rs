// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the store traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use sibyl_config::model::StorageConfig;
use sibyl_core::{
    AdvisorProfile, AdvisorStatus, AdvisorStore, BalanceStore, EarningsRecord, EarningsStore,
    EarningsSummary, Money, PartyId, Session, SessionId, SessionStatus, SessionStore, SibylError,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates every operation to the typed
/// query modules. The database is opened on the first call to
/// [`initialize`](Self::initialize); all four store traits share the one
/// connection thread.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store from configuration without opening the database yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database, apply pragmas, and run migrations.
    pub async fn initialize(&self) -> Result<(), SibylError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SibylError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Checkpoint the WAL ahead of shutdown. No-op if never initialized.
    pub async fn close(&self) -> Result<(), SibylError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
        }
        Ok(())
    }

    /// Returns the underlying database, or an error if not initialized.
    fn db(&self) -> Result<&Database, SibylError> {
        self.db.get().ok_or_else(|| SibylError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, session: &Session) -> Result<(), SibylError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, SibylError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn update_session(&self, session: &Session) -> Result<(), SibylError> {
        queries::sessions::update_session(self.db()?, session).await
    }

    async fn list_sessions_for_party(
        &self,
        party: &PartyId,
        limit: Option<u32>,
    ) -> Result<Vec<Session>, SibylError> {
        queries::sessions::list_sessions_for_party(self.db()?, party, limit).await
    }

    async fn list_sessions_with_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Session>, SibylError> {
        queries::sessions::list_sessions_with_status(self.db()?, status).await
    }
}

#[async_trait]
impl BalanceStore for SqliteStore {
    async fn balance(&self, account: &PartyId) -> Result<Money, SibylError> {
        queries::balances::balance(self.db()?, account).await
    }

    async fn debit(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
        queries::balances::debit(self.db()?, account, amount).await
    }

    async fn credit(&self, account: &PartyId, amount: Money) -> Result<Money, SibylError> {
        queries::balances::credit(self.db()?, account, amount).await
    }
}

#[async_trait]
impl EarningsStore for SqliteStore {
    async fn record_earning(&self, record: &EarningsRecord) -> Result<(), SibylError> {
        queries::earnings::record_earning(self.db()?, record).await
    }

    async fn list_earnings(&self, advisor: &PartyId) -> Result<Vec<EarningsRecord>, SibylError> {
        queries::earnings::list_earnings(self.db()?, advisor).await
    }

    async fn earnings_summary(&self, advisor: &PartyId) -> Result<EarningsSummary, SibylError> {
        queries::earnings::earnings_summary(self.db()?, advisor).await
    }

    async fn mark_earnings_paid(&self, advisor: &PartyId) -> Result<u64, SibylError> {
        queries::earnings::mark_earnings_paid(self.db()?, advisor).await
    }
}

#[async_trait]
impl AdvisorStore for SqliteStore {
    async fn get_advisor(&self, id: &PartyId) -> Result<Option<AdvisorProfile>, SibylError> {
        queries::advisors::get_advisor(self.db()?, id).await
    }

    async fn upsert_advisor(&self, profile: &AdvisorProfile) -> Result<(), SibylError> {
        queries::advisors::upsert_advisor(self.db()?, profile).await
    }

    async fn list_advisors(&self) -> Result<Vec<AdvisorProfile>, SibylError> {
        queries::advisors::list_advisors(self.db()?).await
    }

    async fn set_advisor_status(
        &self,
        id: &PartyId,
        status: AdvisorStatus,
    ) -> Result<(), SibylError> {
        queries::advisors::set_advisor_status(self.db()?, id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sibyl_core::{BillingKind, ChannelKind, ChannelRates, RoomId};
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    fn make_session(id: &str) -> Session {
        Session {
            id: SessionId(id.to_string()),
            client_id: PartyId::new("client-1"),
            advisor_id: PartyId::new("advisor-1"),
            channel: ChannelKind::Chat,
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
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        let result = store.initialize().await;
        assert!(result.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        let result = store.balance(&PartyId::new("alice")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn close_before_initialize_is_a_noop() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("noop_close.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn full_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();

        // Sessions.
        let mut session = make_session("sess-adapter-1");
        store.create_session(&session).await.unwrap();
        let retrieved = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, SessionStatus::Pending);

        session.status = SessionStatus::Active;
        session.started_at = Some(Utc::now());
        store.update_session(&session).await.unwrap();
        let active = store
            .list_sessions_with_status(SessionStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        // Balances.
        let client = PartyId::new("client-1");
        store.credit(&client, Money::from_cents(1000)).await.unwrap();
        let after = store.debit(&client, Money::from_cents(100)).await.unwrap();
        assert_eq!(after, Money::from_cents(900));

        // Earnings.
        let record = EarningsRecord {
            id: "e1".to_string(),
            session_id: session.id.clone(),
            advisor_id: PartyId::new("advisor-1"),
            gross_amount: Money::from_cents(100),
            share_amount: Money::from_cents(70),
            payout_status: sibyl_core::PayoutStatus::Pending,
            created_at: Utc::now(),
        };
        store.record_earning(&record).await.unwrap();
        let summary = store
            .earnings_summary(&PartyId::new("advisor-1"))
            .await
            .unwrap();
        assert_eq!(summary.pending, Money::from_cents(70));

        // Advisors.
        let profile = AdvisorProfile {
            id: PartyId::new("advisor-1"),
            display_name: "Advisor One".to_string(),
            status: AdvisorStatus::Available,
            rates: ChannelRates {
                chat: Some(Money::from_cents(100)),
                phone: None,
                video: None,
            },
            offerings: Vec::new(),
            updated_at: Utc::now(),
        };
        store.upsert_advisor(&profile).await.unwrap();
        store
            .set_advisor_status(&profile.id, AdvisorStatus::Busy)
            .await
            .unwrap();
        let listed = store.list_advisors().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, AdvisorStatus::Busy);

        store.close().await.unwrap();
    }
}
