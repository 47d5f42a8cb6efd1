// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signaling rooms and the relay between their occupants.
//!
//! A room holds at most the two parties of one session. Occupancy and the
//! party-to-room membership index live behind a single async mutex so the
//! two maps can never disagree. The lock is held only while reading or
//! mutating the maps; payload delivery always happens on a snapshot taken
//! after the guard is dropped, so a slow or dead peer connection can never
//! stall the registry.

use std::collections::HashMap;
use std::sync::Arc;

use sibyl_core::error::SibylError;
use sibyl_core::events::{SignalMessage, signal};
use sibyl_core::traits::ConnectionSink;
use sibyl_core::types::{PartyId, RoomId};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A room carries exactly one session, so two occupants is the ceiling.
const ROOM_CAPACITY: usize = 2;

type Recipient = (PartyId, Arc<dyn ConnectionSink>);

/// An announcement ready to go out: the serialized payload and who gets it.
type Announcement = (String, Vec<Recipient>);

#[derive(Default)]
struct Room {
    occupants: HashMap<PartyId, Arc<dyn ConnectionSink>>,
}

impl Room {
    fn occupant(&self, party: &PartyId) -> Option<Arc<dyn ConnectionSink>> {
        self.occupants.get(party).cloned()
    }

    /// Every occupant except `sender`, snapshotted for delivery outside the lock.
    fn others(&self, sender: &PartyId) -> Vec<Recipient> {
        self.occupants
            .iter()
            .filter(|(party, _)| *party != sender)
            .map(|(party, sink)| (party.clone(), sink.clone()))
            .collect()
    }
}

#[derive(Default)]
struct RegistryState {
    rooms: HashMap<RoomId, Room>,
    /// Which room each party currently occupies. A party is in at most one
    /// room, and every entry here has a matching occupant entry above.
    membership: HashMap<PartyId, RoomId>,
}

impl RegistryState {
    /// Removes `party` from `room_id`, drops the room once it empties, and
    /// returns the `user_left` announcement for whoever remains.
    fn remove_occupant(&mut self, room_id: &RoomId, party: &PartyId) -> Option<Announcement> {
        let room = self.rooms.get_mut(room_id)?;
        room.occupants.remove(party)?;
        self.membership.remove(party);
        let remaining = room.others(party);
        if room.occupants.is_empty() {
            self.rooms.remove(room_id);
            debug!(room_id = %room_id, "room deleted, no occupants left");
            metrics::gauge!("sibyl_open_rooms").set(self.rooms.len() as f64);
        }
        if remaining.is_empty() {
            return None;
        }
        let notice = departure_notice(room_id, party)?;
        Some((notice, remaining))
    }
}

fn departure_notice(room_id: &RoomId, party: &PartyId) -> Option<String> {
    let mut message = SignalMessage::of_kind(signal::USER_LEFT);
    message.sender = Some(party.clone());
    message.room_id = Some(room_id.clone());
    serde_json::to_string(&message).ok()
}

/// Registry of active signaling rooms.
///
/// The registry is transport-agnostic: occupants are registered as
/// [`ConnectionSink`]s, and any sink whose delivery fails is evicted from its
/// room on the spot. Media never flows through here, only the negotiation
/// messages the two peers exchange to set up their own connection.
pub struct RoomRegistry {
    state: Mutex<RegistryState>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Puts `party` into `room_id`, creating the room on first use.
    ///
    /// A party can occupy only one room; joining a new one implicitly leaves
    /// the previous room and announces the departure there. Re-joining the
    /// current room replaces the registered connection, which is how a
    /// reconnecting client resumes signaling. A third distinct party is
    /// rejected before any state changes.
    pub async fn join(
        &self,
        room_id: &RoomId,
        party: &PartyId,
        conn: Arc<dyn ConnectionSink>,
    ) -> Result<(), SibylError> {
        let mut announcements: Vec<Announcement> = Vec::new();
        {
            let mut state = self.state.lock().await;
            if let Some(room) = state.rooms.get(room_id)
                && !room.occupants.contains_key(party)
                && room.occupants.len() >= ROOM_CAPACITY
            {
                return Err(SibylError::Forbidden {
                    message: format!("room {room_id} already has {ROOM_CAPACITY} occupants"),
                });
            }
            if let Some(prior) = state.membership.get(party).cloned()
                && prior != *room_id
                && let Some(notice) = state.remove_occupant(&prior, party)
            {
                announcements.push(notice);
            }
            let room = state.rooms.entry(room_id.clone()).or_default();
            room.occupants.insert(party.clone(), conn);
            state.membership.insert(party.clone(), room_id.clone());
            metrics::gauge!("sibyl_open_rooms").set(state.rooms.len() as f64);

            let peers = state
                .rooms
                .get(room_id)
                .map(|room| room.others(party))
                .unwrap_or_default();
            if !peers.is_empty() {
                let mut message = SignalMessage::of_kind(signal::USER_JOINED);
                message.sender = Some(party.clone());
                message.room_id = Some(room_id.clone());
                let payload = serde_json::to_string(&message).map_err(|e| {
                    SibylError::Internal(format!("signal serialization failed: {e}"))
                })?;
                announcements.push((payload, peers));
            }
        }
        debug!(party = %party, room_id = %room_id, "party joined room");
        for (payload, recipients) in announcements {
            self.fan_out(room_id, payload, recipients).await;
        }
        Ok(())
    }

    /// Takes `party` out of whatever room it occupies, if any.
    ///
    /// The remaining occupant is told via `user_left`, and the room is
    /// deleted once it has no occupants.
    pub async fn leave(&self, party: &PartyId) {
        let work = {
            let mut state = self.state.lock().await;
            let Some(room_id) = state.membership.get(party).cloned() else {
                return;
            };
            state
                .remove_occupant(&room_id, party)
                .map(|announcement| (room_id, announcement))
        };
        if let Some((room_id, (payload, remaining))) = work {
            debug!(party = %party, room_id = %room_id, "party left room");
            self.fan_out(&room_id, payload, remaining).await;
        }
    }

    /// [`leave`](Self::leave), but only when the party's registered sink
    /// still belongs to `connection_id`.
    ///
    /// Socket teardown runs after the party may already have rejoined on a
    /// replacement connection; the guard keeps the dead socket's cleanup
    /// from evicting the live one.
    pub async fn leave_if(&self, party: &PartyId, connection_id: &str) {
        let work = {
            let mut state = self.state.lock().await;
            let Some(room_id) = state.membership.get(party).cloned() else {
                return;
            };
            let registered = state
                .rooms
                .get(&room_id)
                .and_then(|room| room.occupants.get(party))
                .map(|sink| sink.connection_id() == connection_id);
            if registered != Some(true) {
                debug!(party = %party, room_id = %room_id, "superseded connection tried to leave; ignored");
                return;
            }
            state
                .remove_occupant(&room_id, party)
                .map(|announcement| (room_id, announcement))
        };
        if let Some((room_id, (payload, remaining))) = work {
            debug!(party = %party, room_id = %room_id, "party left room");
            self.fan_out(&room_id, payload, remaining).await;
        }
    }

    /// Forwards a signaling message from `sender` to its room.
    ///
    /// The registry stamps the authoritative `sender` and `room_id` onto the
    /// message before forwarding, so a client cannot impersonate its peer.
    /// Routing depends on the kind: negotiation traffic (`offer`, `answer`,
    /// `ice-candidate`) goes to the explicit target when one is named and to
    /// everyone else otherwise; `call-request` and `call-response` require a
    /// target and are dropped without one; `end-call` always goes to everyone
    /// else. Unknown kinds and messages from parties outside any room are
    /// silently dropped.
    pub async fn relay(&self, sender: &PartyId, mut message: SignalMessage) -> Result<(), SibylError> {
        let kind = message.kind.clone();
        let (room_id, payload, recipients) = {
            let state = self.state.lock().await;
            let Some(room_id) = state.membership.get(sender).cloned() else {
                debug!(sender = %sender, kind = %kind, "relay from party outside any room; dropped");
                return Ok(());
            };
            let Some(room) = state.rooms.get(&room_id) else {
                return Ok(());
            };
            message.sender = Some(sender.clone());
            message.room_id = Some(room_id.clone());

            let recipients = match kind.as_str() {
                signal::OFFER | signal::ANSWER | signal::ICE_CANDIDATE => match &message.target {
                    Some(target) => room
                        .occupant(target)
                        .map(|sink| vec![(target.clone(), sink)])
                        .unwrap_or_default(),
                    None => room.others(sender),
                },
                signal::CALL_REQUEST | signal::CALL_RESPONSE => match &message.target {
                    Some(target) => room
                        .occupant(target)
                        .map(|sink| vec![(target.clone(), sink)])
                        .unwrap_or_default(),
                    None => {
                        debug!(sender = %sender, kind = %kind, "call signal without target; dropped");
                        Vec::new()
                    }
                },
                signal::END_CALL => room.others(sender),
                other => {
                    debug!(sender = %sender, kind = %other, "unknown signal kind; dropped");
                    return Ok(());
                }
            };
            let payload = serde_json::to_string(&message)
                .map_err(|e| SibylError::Internal(format!("signal serialization failed: {e}")))?;
            (room_id, payload, recipients)
        };
        if recipients.is_empty() {
            return Ok(());
        }
        metrics::counter!("sibyl_signal_messages_total", "kind" => kind).increment(1);
        self.fan_out(&room_id, payload, recipients).await;
        Ok(())
    }

    /// Deletes `room_id` outright, clearing the membership of everyone in
    /// it. No `user_left` is announced; this is the teardown path for a
    /// session that already notified its parties through the session events.
    pub async fn close(&self, room_id: &RoomId) {
        let mut state = self.state.lock().await;
        let Some(room) = state.rooms.remove(room_id) else {
            return;
        };
        for party in room.occupants.keys() {
            state.membership.remove(party);
        }
        metrics::gauge!("sibyl_open_rooms").set(state.rooms.len() as f64);
        debug!(room_id = %room_id, occupants = room.occupants.len(), "room closed");
    }

    /// The room `party` currently occupies, if any.
    pub async fn room_of(&self, party: &PartyId) -> Option<RoomId> {
        self.state.lock().await.membership.get(party).cloned()
    }

    /// Number of rooms with at least one occupant.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.rooms.len()
    }

    /// Current occupants of `room_id`, empty when the room does not exist.
    pub async fn occupants(&self, room_id: &RoomId) -> Vec<PartyId> {
        self.state
            .lock()
            .await
            .rooms
            .get(room_id)
            .map(|room| room.occupants.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Delivers `payload` to every recipient, evicting any occupant whose
    /// sink fails. An eviction produces its own `user_left` announcement,
    /// which is queued onto the same worklist rather than recursed into;
    /// with at most two occupants per room the list stays tiny.
    async fn fan_out(&self, room_id: &RoomId, payload: String, recipients: Vec<Recipient>) {
        let mut pending = vec![(payload, recipients)];
        while let Some((payload, recipients)) = pending.pop() {
            let mut unreachable = Vec::new();
            for (party, sink) in recipients {
                if let Err(e) = sink.deliver(payload.clone()).await {
                    debug!(party = %party, error = %e, "signal delivery failed");
                    unreachable.push(party);
                }
            }
            for party in unreachable {
                let mut state = self.state.lock().await;
                if let Some(announcement) = state.remove_occupant(room_id, &party) {
                    info!(party = %party, room_id = %room_id, "evicted unreachable occupant");
                    pending.push(announcement);
                }
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
