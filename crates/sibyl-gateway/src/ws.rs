// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-party WebSocket carrying notifications and signaling.
//!
//! One socket per party serves both concerns: lifecycle events pushed by
//! the notification bus, and WebRTC signaling relayed between room
//! occupants. The media itself never touches the platform.
//!
//! Client -> server frames (JSON):
//! ```json
//! {"type": "join_room", "room_id": "room-1"}
//! {"type": "leave_room"}
//! {"type": "offer", "target": "advisor-1", "data": {"sdp": "..."}}
//! ```
//!
//! Server -> client frames are bus events (`{"type":"session_accepted",...}`),
//! relayed signals with `sender` and `room_id` stamped, and
//! `{"type":"error","error":"..."}` feedback for rejected frames.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use metrics::gauge;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use sibyl_core::error::SibylError;
use sibyl_core::events::SignalMessage;
use sibyl_core::traits::ConnectionSink;
use sibyl_core::types::PartyId;

use crate::server::GatewayState;

/// Frame kinds that drive room membership rather than the relay.
const JOIN_ROOM: &str = "join_room";
const LEAVE_ROOM: &str = "leave_room";

/// Outbound frame buffer per socket. A client that stops reading for long
/// enough to fill it is treated as unreachable.
const OUTBOUND_BUFFER: usize = 64;

/// Query parameters for the WebSocket handshake.
///
/// Browsers cannot attach an Authorization header to an upgrade request,
/// so the bearer token rides the query string.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Connection sink backed by the socket's outbound channel.
///
/// `deliver` never waits on the peer: a full buffer counts as a failed
/// delivery, so the bus and rooms evict the connection instead of stalling
/// lifecycle operations behind a slow reader.
pub struct WsSink {
    party: PartyId,
    connection_id: String,
    tx: mpsc::Sender<String>,
}

#[async_trait]
impl ConnectionSink for WsSink {
    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    async fn deliver(&self, payload: String) -> Result<(), SibylError> {
        self.tx
            .try_send(payload)
            .map_err(|_| SibylError::DeliveryFailure {
                party: self.party.clone(),
                source: None,
            })
    }
}

/// WebSocket upgrade handler.
///
/// Resolves the token before upgrading; an unknown token answers 401 and
/// never reaches the socket layer.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<GatewayState>,
) -> Response {
    let Some(party) = state.auth.resolver.resolve(&query.token) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, party))
}

/// Handles one party's socket end to end.
///
/// Registers the connection with the notification bus, feeds inbound frames
/// to the rooms, and tears down with the connection-id guard so a
/// replacement socket established mid-teardown survives.
async fn handle_socket(socket: WebSocket, state: GatewayState, party: PartyId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = uuid::Uuid::new_v4().to_string();

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let sink: Arc<dyn ConnectionSink> = Arc::new(WsSink {
        party: party.clone(),
        connection_id: connection_id.clone(),
        tx,
    });
    state.notify.register(&party, sink.clone());
    gauge!("sibyl_ws_connections").increment(1.0);
    debug!(party = %party, connection_id = %connection_id, "websocket connected");

    // Forward bus events and relayed signals out to the client.
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_receiver.next().await {
        match message {
            Message::Text(text) => dispatch_frame(&state, &party, &sink, &text).await,
            Message::Close(_) => break,
            _ => {} // Binary, ping and pong are ignored.
        }
    }

    state.rooms.leave_if(&party, &connection_id).await;
    state.notify.unregister(&party, &connection_id);
    gauge!("sibyl_ws_connections").decrement(1.0);
    debug!(party = %party, connection_id = %connection_id, "websocket closed");
    sender_task.abort();
}

/// Routes one inbound text frame.
///
/// `join_room` and `leave_room` drive room membership; any other kind goes
/// to the relay, which applies its own routing rules. Malformed frames and
/// rejected joins are reported back on the same socket without closing it.
async fn dispatch_frame(
    state: &GatewayState,
    party: &PartyId,
    conn: &Arc<dyn ConnectionSink>,
    text: &str,
) {
    let frame: SignalMessage = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(party = %party, error = %e, "malformed websocket frame; dropped");
            send_error(conn, "malformed frame").await;
            return;
        }
    };

    match frame.kind.as_str() {
        JOIN_ROOM => {
            let Some(room_id) = frame.room_id else {
                send_error(conn, "join_room needs a room_id").await;
                return;
            };
            if let Err(e) = state.rooms.join(&room_id, party, conn.clone()).await {
                warn!(party = %party, room_id = %room_id, error = %e, "room join rejected");
                send_error(conn, &e.to_string()).await;
            }
        }
        LEAVE_ROOM => state.rooms.leave_if(party, conn.connection_id()).await,
        _ => {
            if let Err(e) = state.rooms.relay(party, frame).await {
                warn!(party = %party, error = %e, "relay failed");
            }
        }
    }
}

/// Best-effort error feedback on the party's own socket.
async fn send_error(conn: &Arc<dyn ConnectionSink>, message: &str) {
    let frame = serde_json::json!({"type": "error", "error": message}).to_string();
    if conn.deliver(frame).await.is_err() {
        debug!("error feedback not deliverable");
    }
}
