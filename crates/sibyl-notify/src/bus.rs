// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The notification bus mapping parties to their live connections.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::{counter, gauge};
use sibyl_core::error::SibylError;
use sibyl_core::events::SessionEvent;
use sibyl_core::traits::ConnectionSink;
use sibyl_core::types::PartyId;
use tracing::{debug, warn};

/// Routes [`SessionEvent`]s to each party's registered connection.
///
/// Each party has at most one registered connection. Registering again, for
/// example after a reconnect, silently supersedes the previous registration.
/// Sends to unregistered parties are dropped, and a connection that fails to
/// deliver is unregistered so later events do not pile up behind a dead
/// socket.
pub struct NotificationBus {
    connections: DashMap<PartyId, Arc<dyn ConnectionSink>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Registers `conn` as the party's live connection, superseding any
    /// previous one.
    pub fn register(&self, party: &PartyId, conn: Arc<dyn ConnectionSink>) {
        debug!(party = %party, connection_id = conn.connection_id(), "notification connection registered");
        self.connections.insert(party.clone(), conn);
        gauge!("sibyl_registered_connections").set(self.connections.len() as f64);
    }

    /// Drops the party's registration, but only while `connection_id` is
    /// still the registered one. A disconnecting socket cleaning up after
    /// itself must not tear down the replacement that superseded it.
    pub fn unregister(&self, party: &PartyId, connection_id: &str) {
        let removed = self
            .connections
            .remove_if(party, |_, conn| conn.connection_id() == connection_id);
        if removed.is_some() {
            debug!(party = %party, connection_id, "notification connection unregistered");
            gauge!("sibyl_registered_connections").set(self.connections.len() as f64);
        }
    }

    /// True while the party has a registered connection.
    pub fn is_registered(&self, party: &PartyId) -> bool {
        self.connections.contains_key(party)
    }

    pub fn registration_count(&self) -> usize {
        self.connections.len()
    }

    /// Pushes `event` to one party, best-effort.
    ///
    /// Only serialization can fail; a missing registration or a dead
    /// connection is logged and absorbed.
    pub async fn send(&self, party: &PartyId, event: &SessionEvent) -> Result<(), SibylError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| SibylError::Internal(format!("event serialization failed: {e}")))?;
        // Clone the sink out so no map guard is held across the await.
        let Some(conn) = self.connections.get(party).map(|entry| entry.value().clone()) else {
            debug!(party = %party, "no registered connection, notification dropped");
            counter!("sibyl_notify_dropped_total").increment(1);
            return Ok(());
        };
        self.deliver_or_unregister(party, &conn, payload).await;
        Ok(())
    }

    /// Pushes `event` to every registered party, best-effort.
    pub async fn broadcast(&self, event: &SessionEvent) -> Result<(), SibylError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| SibylError::Internal(format!("event serialization failed: {e}")))?;
        let targets: Vec<(PartyId, Arc<dyn ConnectionSink>)> = self
            .connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (party, conn) in targets {
            self.deliver_or_unregister(&party, &conn, payload.clone()).await;
        }
        Ok(())
    }

    async fn deliver_or_unregister(
        &self,
        party: &PartyId,
        conn: &Arc<dyn ConnectionSink>,
        payload: String,
    ) {
        if let Err(e) = conn.deliver(payload).await {
            warn!(party = %party, error = %e, "notification delivery failed, unregistering connection");
            counter!("sibyl_notify_dropped_total").increment(1);
            // Guarded by connection id: a reconnect may have superseded the
            // failing sink while the delivery was in flight.
            self.unregister(party, conn.connection_id());
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use sibyl_core::types::{RoomId, SessionId};

    struct RecordingSink {
        id: String,
        delivered: Mutex<Vec<SessionEvent>>,
        fail: AtomicBool,
    }

    impl RecordingSink {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                delivered: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            })
        }

        fn broken(id: &str) -> Arc<Self> {
            let sink = Self::new(id);
            sink.fail.store(true, Ordering::SeqCst);
            sink
        }

        fn received(&self) -> Vec<SessionEvent> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConnectionSink for RecordingSink {
        fn connection_id(&self) -> &str {
            &self.id
        }

        async fn deliver(&self, payload: String) -> Result<(), SibylError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SibylError::DeliveryFailure {
                    party: PartyId::new(self.id.clone()),
                    source: None,
                });
            }
            let event: SessionEvent = serde_json::from_str(&payload).unwrap();
            self.delivered.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn accepted(session: &str) -> SessionEvent {
        SessionEvent::SessionAccepted {
            session_id: SessionId(session.to_string()),
            room_id: RoomId(format!("room-{session}")),
        }
    }

    #[tokio::test]
    async fn send_reaches_the_registered_connection() {
        let bus = NotificationBus::new();
        let sink = RecordingSink::new("conn-1");
        bus.register(&PartyId::new("client-1"), sink.clone());

        bus.send(&PartyId::new("client-1"), &accepted("s-1")).await.unwrap();

        assert_eq!(sink.received(), vec![accepted("s-1")]);
    }

    #[tokio::test]
    async fn send_without_registration_is_dropped() {
        let bus = NotificationBus::new();
        bus.send(&PartyId::new("ghost"), &accepted("s-1")).await.unwrap();
        assert_eq!(bus.registration_count(), 0);
    }

    #[tokio::test]
    async fn reregistration_supersedes_the_old_connection() {
        let bus = NotificationBus::new();
        let stale = RecordingSink::new("conn-1");
        let fresh = RecordingSink::new("conn-2");
        let party = PartyId::new("client-1");
        bus.register(&party, stale.clone());
        bus.register(&party, fresh.clone());

        bus.send(&party, &accepted("s-1")).await.unwrap();

        assert!(stale.received().is_empty());
        assert_eq!(fresh.received(), vec![accepted("s-1")]);
    }

    #[tokio::test]
    async fn unregister_ignores_a_superseded_connection_id() {
        let bus = NotificationBus::new();
        let party = PartyId::new("client-1");
        bus.register(&party, RecordingSink::new("conn-1"));
        bus.register(&party, RecordingSink::new("conn-2"));

        // The old socket's cleanup must not evict its replacement.
        bus.unregister(&party, "conn-1");
        assert!(bus.is_registered(&party));

        bus.unregister(&party, "conn-2");
        assert!(!bus.is_registered(&party));
    }

    #[tokio::test]
    async fn failed_delivery_unregisters_the_connection() {
        let bus = NotificationBus::new();
        let party = PartyId::new("client-1");
        bus.register(&party, RecordingSink::broken("conn-1"));

        bus.send(&party, &accepted("s-1")).await.unwrap();

        assert!(!bus.is_registered(&party));
        // A later send is a clean drop, not an error.
        bus.send(&party, &accepted("s-2")).await.unwrap();
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone_and_sheds_dead_connections() {
        let bus = NotificationBus::new();
        let alive_a = RecordingSink::new("conn-a");
        let alive_b = RecordingSink::new("conn-b");
        bus.register(&PartyId::new("advisor-1"), alive_a.clone());
        bus.register(&PartyId::new("client-1"), alive_b.clone());
        bus.register(&PartyId::new("client-2"), RecordingSink::broken("conn-c"));

        let event = SessionEvent::AdvisorStatusChanged {
            advisor_id: PartyId::new("advisor-1"),
            status: sibyl_core::types::AdvisorStatus::Available,
        };
        bus.broadcast(&event).await.unwrap();

        assert_eq!(alive_a.received(), vec![event.clone()]);
        assert_eq!(alive_b.received(), vec![event]);
        assert_eq!(bus.registration_count(), 2);
        assert!(!bus.is_registered(&PartyId::new("client-2")));
    }
}
