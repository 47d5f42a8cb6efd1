// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advisor profiles and presence.

use std::sync::Arc;

use sibyl_core::error::SibylError;
use sibyl_core::events::SessionEvent;
use sibyl_core::traits::AdvisorStore;
use sibyl_core::types::{AdvisorProfile, AdvisorStatus, PartyId};
use sibyl_notify::NotificationBus;
use tracing::info;

/// Read/write access to the advisor directory.
///
/// Status changes are broadcast to every connected party so clients can
/// keep their advisor listings live without polling.
pub struct AdvisorDirectory {
    advisors: Arc<dyn AdvisorStore>,
    notify: Arc<NotificationBus>,
}

impl AdvisorDirectory {
    pub fn new(advisors: Arc<dyn AdvisorStore>, notify: Arc<NotificationBus>) -> Self {
        Self { advisors, notify }
    }

    pub async fn get(&self, id: &PartyId) -> Result<Option<AdvisorProfile>, SibylError> {
        self.advisors.get_advisor(id).await
    }

    pub async fn list(&self) -> Result<Vec<AdvisorProfile>, SibylError> {
        self.advisors.list_advisors().await
    }

    /// Creates or fully replaces a profile, including rates and offerings.
    ///
    /// A zero or missing rate means the channel is simply not offered; a
    /// negative rate or a non-positive offering is malformed and rejected.
    pub async fn upsert(&self, profile: &AdvisorProfile) -> Result<(), SibylError> {
        if profile.display_name.trim().is_empty() {
            return Err(SibylError::Validation {
                message: "advisor display_name must not be empty".to_string(),
            });
        }
        for rate in [profile.rates.chat, profile.rates.phone, profile.rates.video]
            .into_iter()
            .flatten()
        {
            if rate.cents() < 0 {
                return Err(SibylError::Validation {
                    message: format!("negative per-minute rate: {rate}"),
                });
            }
        }
        for offering in &profile.offerings {
            if offering.minutes == 0 || offering.price.cents() <= 0 {
                return Err(SibylError::Validation {
                    message: format!(
                        "offering for {} must have positive minutes and price",
                        offering.channel
                    ),
                });
            }
        }
        self.advisors.upsert_advisor(profile).await?;
        info!(advisor = %profile.id, offerings = profile.offerings.len(), "advisor profile upserted");
        Ok(())
    }

    /// Updates presence and broadcasts the change to everyone connected.
    pub async fn set_status(
        &self,
        id: &PartyId,
        status: AdvisorStatus,
    ) -> Result<(), SibylError> {
        self.advisors.set_advisor_status(id, status).await?;
        info!(advisor = %id, status = %status, "advisor status changed");
        self.notify
            .broadcast(&SessionEvent::AdvisorStatusChanged {
                advisor_id: id.clone(),
                status,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use sibyl_core::types::{ChannelKind, ChannelRates, FixedOffering, Money};
    use sibyl_test_utils::{MemoryAdvisorStore, RecordingSink};

    fn profile(name: &str) -> AdvisorProfile {
        AdvisorProfile {
            id: PartyId::new("advisor-1"),
            display_name: name.to_string(),
            status: AdvisorStatus::Offline,
            rates: ChannelRates {
                chat: Some(Money::from_cents(100)),
                phone: None,
                video: None,
            },
            offerings: vec![FixedOffering {
                channel: ChannelKind::Chat,
                minutes: 15,
                price: Money::from_cents(1_200),
            }],
            updated_at: Utc::now(),
        }
    }

    fn directory() -> (AdvisorDirectory, Arc<NotificationBus>) {
        let notify = Arc::new(NotificationBus::new());
        (
            AdvisorDirectory::new(Arc::new(MemoryAdvisorStore::new()), notify.clone()),
            notify,
        )
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let (directory, _) = directory();
        directory.upsert(&profile("Cassandra")).await.unwrap();

        let stored = directory.get(&PartyId::new("advisor-1")).await.unwrap().unwrap();
        assert_eq!(stored.display_name, "Cassandra");
        assert_eq!(stored.rate_for(ChannelKind::Chat), Some(Money::from_cents(100)));
        assert!(directory.get(&PartyId::new("advisor-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_rejects_malformed_profiles() {
        let (directory, _) = directory();

        let err = directory.upsert(&profile("   ")).await.unwrap_err();
        assert!(matches!(err, SibylError::Validation { .. }));

        let mut negative = profile("Cassandra");
        negative.rates.chat = Some(Money::from_cents(-5));
        assert!(matches!(
            directory.upsert(&negative).await.unwrap_err(),
            SibylError::Validation { .. }
        ));

        let mut free_offering = profile("Cassandra");
        free_offering.offerings[0].price = Money::ZERO;
        assert!(matches!(
            directory.upsert(&free_offering).await.unwrap_err(),
            SibylError::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn status_change_is_broadcast_to_all_connections() {
        let (directory, notify) = directory();
        directory.upsert(&profile("Cassandra")).await.unwrap();
        let watcher_a = RecordingSink::new("conn-a");
        let watcher_b = RecordingSink::new("conn-b");
        notify.register(&PartyId::new("client-1"), watcher_a.clone());
        notify.register(&PartyId::new("client-2"), watcher_b.clone());

        directory
            .set_status(&PartyId::new("advisor-1"), AdvisorStatus::Available)
            .await
            .unwrap();

        let expected = SessionEvent::AdvisorStatusChanged {
            advisor_id: PartyId::new("advisor-1"),
            status: AdvisorStatus::Available,
        };
        assert_eq!(watcher_a.events(), vec![expected.clone()]);
        assert_eq!(watcher_b.events(), vec![expected]);
    }

    #[tokio::test]
    async fn status_change_for_an_unknown_advisor_is_not_found() {
        let (directory, _) = directory();
        let err = directory
            .set_status(&PartyId::new("ghost"), AdvisorStatus::Available)
            .await
            .unwrap_err();
        assert!(matches!(err, SibylError::NotFound { .. }));
    }
}
