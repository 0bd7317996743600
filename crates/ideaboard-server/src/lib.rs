//! Ideaboard WebSocket relay server
//!
//! Relays collaboration messages between clients in the same room and keeps
//! the winning operation per element so late joiners can catch up.
//!
//! ## Protocol
//!
//! Messages are JSON tagged by `type`:
//! ```json
//! { "type": "join", "room": "room-id", "participant_id": "p1", "display_name": "Ada", "color": "#ff6b6b" }
//! { "type": "operation", "operation": { "element_id": "…", "kind": "create", "payload": { … }, "author_id": "p1", "seq": 1 } }
//! { "type": "cursor", "participant_id": "p1", "position": { "x": 100, "y": 200 } }
//! { "type": "leave", "participant_id": "p1" }
//! ```

pub mod room;

pub use room::{CHANNEL_CAPACITY, ConnectionId, Envelope, Membership, Room};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use ideaboard_core::{ClientMessage, Operation, Participant, ServerMessage};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared application state
#[derive(Default)]
pub struct AppState {
    /// Active rooms
    rooms: DashMap<String, Room>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room, creating the room on first join.
    pub fn join_room(
        &self,
        room_id: &str,
        connection: ConnectionId,
        participant: Participant,
    ) -> Membership {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .join(connection, participant)
    }

    /// Remove a connection from a room. Empty rooms are dropped.
    pub fn leave_room(&self, room_id: &str, connection: &ConnectionId) -> Option<Participant> {
        let participant = self.rooms.get_mut(room_id)?.leave(connection);
        if self.rooms.remove_if(room_id, |_, room| room.is_empty()).is_some() {
            debug!("Room {} closed", room_id);
        }
        participant
    }

    /// Fold an operation into the room's registers.
    pub fn record(&self, room_id: &str, operation: &Operation) -> bool {
        self.rooms
            .get_mut(room_id)
            .is_some_and(|mut room| room.record(operation))
    }

    /// Broadcast message to room
    pub fn broadcast(&self, room_id: &str, from: ConnectionId, message: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            room.broadcast(from, message);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// A fresh `joined` for a connection that fell behind its room, or
    /// `None` once the room is gone.
    pub fn resync(&self, room_id: &str, connection: ConnectionId) -> Option<ServerMessage> {
        let room = self.rooms.get(room_id)?;
        Some(ServerMessage::Joined {
            room: room_id.to_string(),
            participants: room.peers(&connection),
            backlog: room.backlog(),
        })
    }

    pub fn backlog(&self, room_id: &str) -> Vec<Operation> {
        self.rooms
            .get(room_id)
            .map(|room| room.backlog())
            .unwrap_or_default()
    }
}

/// Build the HTTP router: `/` banner, `/health` probe and the `/ws` endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "Ideaboard Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type Sender = SplitSink<WebSocket, Message>;

/// Serialize and send. Returns false once the socket is gone.
async fn send(sender: &mut Sender, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode {:?}: {}", message, e);
            true
        }
    }
}

fn error(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        message: message.into(),
    }
}

/// Take a connection out of its room and tell the others.
fn depart(state: &AppState, room: &str, connection: ConnectionId) {
    if let Some(participant) = state.leave_room(room, &connection) {
        info!("Peer {} left room {}", participant.participant_id, room);
        state.broadcast(
            room,
            connection,
            ServerMessage::PeerLeft {
                participant_id: participant.participant_id,
            },
        );
    }
}

/// What a connection's room channel produced.
#[derive(Debug)]
enum Relay {
    Message(Envelope),
    /// The receiver was overrun and this many messages are gone.
    Lagged(u64),
    Closed,
}

/// Next message fanned out to the room. Pends forever outside a room.
async fn next_envelope(room_rx: &mut Option<broadcast::Receiver<Envelope>>) -> Relay {
    let Some(rx) = room_rx.as_mut() else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(envelope) => Relay::Message(envelope),
        Err(broadcast::error::RecvError::Lagged(skipped)) => Relay::Lagged(skipped),
        Err(broadcast::error::RecvError::Closed) => Relay::Closed,
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection: ConnectionId = Uuid::new_v4();
    info!("New connection: {}", connection);

    let (mut sender, mut receiver) = socket.split();
    let mut current_room: Option<String> = None;
    let mut participant: Option<Participant> = None;
    let mut room_rx: Option<broadcast::Receiver<Envelope>> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(_))) => {
                        if !send(&mut sender, &error("binary messages are not supported")).await {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", connection, e);
                        break;
                    }
                };

                let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => client_msg,
                    Err(e) => {
                        warn!("Invalid message from {}: {}", connection, e);
                        if !send(&mut sender, &error(format!("Invalid message: {e}"))).await {
                            break;
                        }
                        continue;
                    }
                };

                match client_msg {
                    ClientMessage::Join { room, participant: joining } => {
                        if let Some(old_room) = current_room.take() {
                            depart(&state, &old_room, connection);
                        }

                        let membership = state.join_room(&room, connection, joining.clone());
                        room_rx = Some(membership.rx);
                        current_room = Some(room.clone());
                        participant = Some(joining.clone());

                        let joined = ServerMessage::Joined {
                            room: room.clone(),
                            participants: membership.participants,
                            backlog: membership.backlog,
                        };
                        if !send(&mut sender, &joined).await {
                            break;
                        }

                        info!("Peer {} joined room {}", joining.participant_id, room);
                        state.broadcast(&room, connection, ServerMessage::PeerJoined {
                            participant: joining,
                        });
                    }
                    ClientMessage::Leave { .. } => {
                        if let Some(room) = current_room.take() {
                            depart(&state, &room, connection);
                        }
                        participant = None;
                        room_rx = None;
                    }
                    ClientMessage::Operation { operation } => {
                        let Some(room) = current_room.as_deref() else {
                            if !send(&mut sender, &error("join a room before sending operations")).await {
                                break;
                            }
                            continue;
                        };
                        if let Err(e) = operation.validate() {
                            warn!("Rejected operation from {}: {}", connection, e);
                            if !send(&mut sender, &error(e.to_string())).await {
                                break;
                            }
                            continue;
                        }
                        if !state.record(room, &operation) {
                            debug!(
                                "Operation on {} at seq {} is stale for the room log",
                                operation.element_id, operation.seq
                            );
                        }
                        state.broadcast(room, connection, ServerMessage::Operation { operation });
                    }
                    ClientMessage::Cursor { position, .. } => {
                        // Cursors are attributed to the joined participant.
                        if let (Some(room), Some(me)) = (current_room.as_deref(), participant.as_ref()) {
                            state.broadcast(room, connection, ServerMessage::Cursor {
                                participant_id: me.participant_id.clone(),
                                position,
                            });
                        }
                    }
                }
            }

            relay = next_envelope(&mut room_rx) => {
                match relay {
                    // Don't echo back to sender
                    Relay::Message(envelope) if envelope.from == connection => {}
                    Relay::Message(envelope) => {
                        if !send(&mut sender, &envelope.message).await {
                            break;
                        }
                    }
                    Relay::Lagged(skipped) => {
                        // Dropped operations are recovered by replaying the
                        // room registers, which the client applies idempotently.
                        let Some(room) = current_room.as_deref() else {
                            continue;
                        };
                        warn!(
                            "Connection {} lagged {} message(s) behind room {}, resyncing",
                            connection, skipped, room
                        );
                        let Some(joined) = state.resync(room, connection) else {
                            continue;
                        };
                        if !send(&mut sender, &joined).await {
                            break;
                        }
                    }
                    Relay::Closed => room_rx = None,
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(room) = current_room {
        depart(&state, &room, connection);
    }
    info!("Connection closed: {}", connection);
}
