//! Collaboration session for real-time multi-user editing.
//!
//! The session turns local mutations into [`Operation`]s, applies remote ones
//! under a last-writer-wins rule, and streams the local cursor. It queues
//! outgoing JSON for whatever transport the host uses and never blocks.

use crate::config::BoardConfig;
use crate::scene::{ElementPatch, Scene, SceneChange, SceneError};
use crate::shapes::{Element, ElementId, ParticipantId};
use crate::sync::{
    ClientMessage, Operation, OperationKind, Participant, RemoteError, ServerMessage, supersedes,
};
use kurbo::Point;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default minimum interval between cursor messages.
pub const DEFAULT_CURSOR_INTERVAL: Duration = Duration::from_millis(50);

/// Default number of failed rejoins before giving up.
pub const DEFAULT_MAX_REJOIN_ATTEMPTS: u32 = 5;

/// Fallback marker color for peers we have no join record for.
const UNKNOWN_PEER_COLOR: &str = "#ffffff";

/// Where the session stands with its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No live connection; edits are queued.
    Offline,
    /// Join sent, waiting for the server's answer.
    Joining,
    /// Joined; edits go straight out.
    Online,
}

/// Events surfaced to the host after handling a server message.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Joined a room
    Joined { room: String, peer_count: usize },
    /// A peer joined the room
    PeerJoined { participant_id: ParticipantId },
    /// A peer left the room
    PeerLeft { participant_id: ParticipantId },
    /// A remote operation to apply (backlog entries arrive as several of these)
    Operation(Operation),
    /// Error reported by the server
    Error { message: String },
    /// Reconnecting failed too many times in a row
    RejoinFailed { attempts: u32 },
}

/// Why a well-formed remote operation was not applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("element {0} already exists")]
    AlreadyExists(ElementId),
    #[error("element {0} was deleted by a newer operation")]
    Deleted(ElementId),
    #[error("element {0} is unknown")]
    Unknown(ElementId),
    #[error("operation seq {seq} is not newer than version {version} of {id}")]
    Stale { id: ElementId, seq: u64, version: u64 },
    #[error("clear removed nothing")]
    NothingToClear,
}

/// Result of applying a remote operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(Scene),
    Rejected(Rejection),
}

/// Record of a deletion, kept so late operations cannot resurrect the element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub seq: u64,
    pub author: ParticipantId,
}

/// Remote participant's pointer, as drawn by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct CollaboratorCursor {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub color: String,
    /// World coordinates.
    pub position: Point,
}

/// Collaboration state for one participant.
#[derive(Debug, Clone)]
pub struct CollaborationSession {
    local: Participant,
    room: Option<String>,
    state: SessionState,
    /// Lamport clock: highest seq issued or observed.
    clock: u64,
    /// Messages ready for the transport.
    outgoing: Vec<ClientMessage>,
    /// Operations made while not online, in original order.
    pending: VecDeque<Operation>,
    peers: BTreeMap<ParticipantId, Participant>,
    cursors: BTreeMap<ParticipantId, Point>,
    tombstones: HashMap<ElementId, Tombstone>,
    cursor_interval: Duration,
    last_cursor_sent: Option<Instant>,
    pending_cursor: Option<Point>,
    rejoin_attempts: u32,
    max_rejoin_attempts: u32,
}

impl CollaborationSession {
    /// Create a session for `local` with default settings.
    pub fn new(local: Participant) -> Self {
        Self {
            local,
            room: None,
            state: SessionState::Offline,
            clock: 0,
            outgoing: Vec::new(),
            pending: VecDeque::new(),
            peers: BTreeMap::new(),
            cursors: BTreeMap::new(),
            tombstones: HashMap::new(),
            cursor_interval: DEFAULT_CURSOR_INTERVAL,
            last_cursor_sent: None,
            pending_cursor: None,
            rejoin_attempts: 0,
            max_rejoin_attempts: DEFAULT_MAX_REJOIN_ATTEMPTS,
        }
    }

    pub fn with_config(local: Participant, config: &BoardConfig) -> Self {
        Self {
            cursor_interval: Duration::from_millis(config.cursor_interval_ms),
            max_rejoin_attempts: config.max_rejoin_attempts.max(1),
            ..Self::new(local)
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.local
    }

    pub fn participant_id(&self) -> &str {
        &self.local.participant_id
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.state == SessionState::Online
    }

    /// Number of operations waiting for the connection.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn peers(&self) -> impl Iterator<Item = &Participant> {
        self.peers.values()
    }

    pub fn tombstone(&self, id: ElementId) -> Option<&Tombstone> {
        self.tombstones.get(&id)
    }

    // --- Clock ---

    /// Issue the next Lamport timestamp.
    pub fn next_seq(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Advance the clock past a version seen elsewhere.
    pub fn observe(&mut self, seq: u64) {
        self.clock = self.clock.max(seq);
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Give `element` a fresh version authored by the local participant.
    pub fn stamp(&mut self, element: &mut Element) {
        element.version = self.next_seq();
        element.author = Some(self.local.participant_id.clone());
    }

    // --- Room/Connection Management ---

    /// Request to join a room. Queues the join message.
    pub fn join_room(&mut self, room: &str) {
        self.room = Some(room.to_string());
        self.rejoin_attempts = 0;
        self.send_join();
    }

    fn send_join(&mut self) {
        let Some(room) = self.room.clone() else {
            return;
        };
        log::info!("Joining room {room} as {}", self.local.participant_id);
        self.state = SessionState::Joining;
        self.outgoing.push(ClientMessage::Join {
            room,
            participant: self.local.clone(),
        });
    }

    /// Leave the current room. Queued operations are dropped.
    pub fn leave_room(&mut self) {
        if self.room.take().is_some() {
            self.outgoing.push(ClientMessage::Leave {
                participant_id: self.local.participant_id.clone(),
            });
        }
        self.state = SessionState::Offline;
        self.pending.clear();
        self.peers.clear();
        self.cursors.clear();
    }

    /// The transport went away. Unsent operations move back to the queue.
    pub fn connection_lost(&mut self) {
        if self.room.is_none() {
            return;
        }
        log::warn!("Connection lost, continuing offline");
        self.state = SessionState::Offline;
        let unsent: Vec<Operation> = std::mem::take(&mut self.outgoing)
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::Operation { operation } => Some(operation),
                _ => None,
            })
            .collect();
        for operation in unsent.into_iter().rev() {
            self.pending.push_front(operation);
        }
        self.peers.clear();
        self.cursors.clear();
        self.pending_cursor = None;
    }

    /// The transport is back: rejoin the room.
    pub fn reconnected(&mut self) {
        if self.state == SessionState::Offline && self.room.is_some() {
            self.send_join();
        }
    }

    /// A reconnect attempt failed. Returns `RejoinFailed` once the limit is hit.
    pub fn rejoin_failed(&mut self) -> Option<SyncEvent> {
        self.rejoin_attempts += 1;
        log::warn!(
            "Rejoin attempt {}/{} failed",
            self.rejoin_attempts,
            self.max_rejoin_attempts
        );
        (self.rejoin_attempts >= self.max_rejoin_attempts).then_some(SyncEvent::RejoinFailed {
            attempts: self.rejoin_attempts,
        })
    }

    /// Take pending outgoing messages as JSON (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
            .iter()
            .filter_map(|msg| match serde_json::to_string(msg) {
                Ok(json) => Some(json),
                Err(e) => {
                    log::error!("Failed to serialize outgoing message: {e}");
                    None
                }
            })
            .collect()
    }

    /// Check if there are pending outgoing messages.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // --- Publishing ---

    /// Send an operation now, or queue it until the room is joined.
    pub fn publish(&mut self, operation: Operation) {
        if self.room.is_none() {
            return;
        }
        if self.is_online() {
            self.outgoing.push(ClientMessage::Operation { operation });
        } else {
            self.pending.push_back(operation);
        }
    }

    pub fn publish_create(&mut self, element: &Element) {
        let op = Operation::create(element, &self.local.participant_id, element.version);
        self.publish(op);
    }

    pub fn publish_update(&mut self, element: &Element) {
        let op = Operation::update(element, &self.local.participant_id, element.version);
        self.publish(op);
    }

    /// Issue and publish a Delete, remembering the tombstone locally.
    pub fn publish_delete(&mut self, id: ElementId) {
        let seq = self.next_seq();
        let author = self.local.participant_id.clone();
        self.record_tombstone(id, seq, &author);
        self.publish(Operation::delete(id, &author, seq));
    }

    /// Issue and publish a Clear of `ids`.
    pub fn publish_clear(&mut self, ids: Vec<ElementId>) {
        let seq = self.next_seq();
        let author = self.local.participant_id.clone();
        for id in &ids {
            self.record_tombstone(*id, seq, &author);
        }
        self.publish(Operation::clear(ids, &author, seq));
    }

    /// Publish the difference between two scenes (undo, redo, load).
    ///
    /// Created and updated elements in `target` are re-stamped with fresh
    /// versions; the re-stamped scene is returned for the caller to keep.
    pub fn publish_changes(
        &mut self,
        target: &Scene,
        changes: Vec<SceneChange>,
    ) -> Result<Scene, SceneError> {
        let mut next = target.clone();
        for change in changes {
            match change {
                SceneChange::Created(mut element) => {
                    self.stamp(&mut element);
                    self.tombstones.remove(&element.id);
                    next = next.replace(element.clone())?;
                    self.publish_create(&element);
                }
                SceneChange::Updated(mut element) => {
                    self.stamp(&mut element);
                    next = next.replace(element.clone())?;
                    self.publish_update(&element);
                }
                SceneChange::Deleted(id) => self.publish_delete(id),
            }
        }
        Ok(next)
    }

    // --- Cursor ---

    fn cursor_due(&self, now: Instant) -> bool {
        self.last_cursor_sent
            .is_none_or(|last| now.duration_since(last) >= self.cursor_interval)
    }

    fn send_cursor(&mut self, position: Point, now: Instant) {
        self.outgoing.push(ClientMessage::Cursor {
            participant_id: self.local.participant_id.clone(),
            position,
        });
        self.last_cursor_sent = Some(now);
        self.pending_cursor = None;
    }

    /// Report the local pointer (world coordinates). Rate limited; the latest
    /// position inside an interval is held back for [`Self::flush_cursor`].
    pub fn update_cursor(&mut self, position: Point, now: Instant) {
        if !self.is_online() {
            return;
        }
        if self.cursor_due(now) {
            self.send_cursor(position, now);
        } else {
            self.pending_cursor = Some(position);
        }
    }

    /// Send a held-back cursor position once the interval has passed.
    pub fn flush_cursor(&mut self, now: Instant) {
        if !self.is_online() {
            return;
        }
        if let Some(position) = self.pending_cursor {
            if self.cursor_due(now) {
                self.send_cursor(position, now);
            }
        }
    }

    /// Remote cursors joined with their participant records, ordered by id.
    pub fn collaborator_cursors(&self) -> Vec<CollaboratorCursor> {
        self.cursors
            .iter()
            .map(|(id, position)| {
                let peer = self.peers.get(id);
                CollaboratorCursor {
                    participant_id: id.clone(),
                    display_name: peer.map_or_else(|| id.clone(), |p| p.display_name.clone()),
                    color: peer.map_or_else(|| UNKNOWN_PEER_COLOR.to_string(), |p| p.color.clone()),
                    position: *position,
                }
            })
            .collect()
    }

    // --- Incoming Message Handling ---

    /// Handle an incoming server message.
    ///
    /// Unparseable messages are logged and dropped.
    pub fn handle_message(&mut self, json: &str) -> Vec<SyncEvent> {
        let msg: ServerMessage = match serde_json::from_str(json) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Dropping malformed server message: {e}");
                return Vec::new();
            }
        };

        match msg {
            ServerMessage::Joined {
                room,
                participants,
                backlog,
            } => {
                if self.room.as_deref() != Some(room.as_str()) {
                    log::warn!("Ignoring join confirmation for unexpected room {room}");
                    return Vec::new();
                }
                self.state = SessionState::Online;
                self.rejoin_attempts = 0;
                self.peers = participants
                    .into_iter()
                    .filter(|p| p.participant_id != self.local.participant_id)
                    .map(|p| (p.participant_id.clone(), p))
                    .collect();

                let queued = self.pending.len();
                while let Some(operation) = self.pending.pop_front() {
                    self.outgoing.push(ClientMessage::Operation { operation });
                }
                log::info!(
                    "Joined room {room} with {} peer(s), {} backlog op(s), replaying {queued} queued op(s)",
                    self.peers.len(),
                    backlog.len()
                );

                let mut events = vec![SyncEvent::Joined {
                    room,
                    peer_count: self.peers.len(),
                }];
                events.extend(backlog.into_iter().map(SyncEvent::Operation));
                events
            }
            ServerMessage::PeerJoined { participant } => {
                if participant.participant_id == self.local.participant_id {
                    return Vec::new();
                }
                let participant_id = participant.participant_id.clone();
                self.peers.insert(participant_id.clone(), participant);
                vec![SyncEvent::PeerJoined { participant_id }]
            }
            ServerMessage::PeerLeft { participant_id } => {
                self.peers.remove(&participant_id);
                self.cursors.remove(&participant_id);
                vec![SyncEvent::PeerLeft { participant_id }]
            }
            ServerMessage::Operation { operation } => vec![SyncEvent::Operation(operation)],
            ServerMessage::Cursor {
                participant_id,
                position,
            } => {
                if participant_id != self.local.participant_id {
                    self.cursors.insert(participant_id, position);
                }
                Vec::new()
            }
            ServerMessage::Error { message } => {
                log::warn!("Server error: {message}");
                vec![SyncEvent::Error { message }]
            }
        }
    }

    // --- Conflict resolution ---

    fn record_tombstone(&mut self, id: ElementId, seq: u64, author: &str) {
        let newer = self
            .tombstones
            .get(&id)
            .is_none_or(|t| supersedes(seq, author, t.seq, Some(&t.author)));
        if newer {
            self.tombstones.insert(
                id,
                Tombstone {
                    seq,
                    author: author.to_string(),
                },
            );
        }
    }

    fn blocked_by_tombstone(&self, op: &Operation, id: ElementId) -> bool {
        self.tombstones
            .get(&id)
            .is_some_and(|t| !op.supersedes(t.seq, Some(&t.author)))
    }

    /// Apply a remote operation to `scene`.
    ///
    /// Malformed operations are errors; well-formed ones that lose the
    /// last-writer-wins comparison come back as [`ApplyOutcome::Rejected`].
    pub fn apply_remote(
        &mut self,
        scene: &Scene,
        op: &Operation,
    ) -> Result<ApplyOutcome, RemoteError> {
        op.validate()?;
        self.observe(op.seq);
        match op.kind {
            OperationKind::Create | OperationKind::Update => self.apply_upsert(scene, op),
            OperationKind::Delete => self.apply_delete(scene, op),
            OperationKind::Clear => self.apply_clear(scene, op),
        }
    }

    fn apply_upsert(&mut self, scene: &Scene, op: &Operation) -> Result<ApplyOutcome, RemoteError> {
        let element = op.to_element()?;
        let id = element.id;
        if self.blocked_by_tombstone(op, id) {
            return Ok(ApplyOutcome::Rejected(Rejection::Deleted(id)));
        }

        let Some(current) = scene.get(id) else {
            // Updates carry full state, so an update for an element we have
            // not seen yet (reordered delivery) inserts it.
            self.tombstones.remove(&id);
            return Ok(ApplyOutcome::Applied(scene.insert(element)?));
        };

        if op.kind == OperationKind::Create {
            return Ok(ApplyOutcome::Rejected(Rejection::AlreadyExists(id)));
        }
        if !op.supersedes(current.version, current.author.as_deref()) {
            return Ok(ApplyOutcome::Rejected(Rejection::Stale {
                id,
                seq: op.seq,
                version: current.version,
            }));
        }

        let next = if op.seq > current.version {
            scene.update(
                id,
                ElementPatch {
                    shape: Some(element.shape),
                    style: Some(element.style),
                    version: op.seq,
                    author: element.author,
                },
            )?
        } else {
            // Same seq, winning author.
            scene.replace(element)?
        };
        Ok(ApplyOutcome::Applied(next))
    }

    fn apply_delete(&mut self, scene: &Scene, op: &Operation) -> Result<ApplyOutcome, RemoteError> {
        let id = op.element_id;
        let Some(current) = scene.get(id) else {
            self.record_tombstone(id, op.seq, &op.author_id);
            return Ok(ApplyOutcome::Rejected(Rejection::Unknown(id)));
        };
        if !op.supersedes(current.version, current.author.as_deref()) {
            return Ok(ApplyOutcome::Rejected(Rejection::Stale {
                id,
                seq: op.seq,
                version: current.version,
            }));
        }
        self.record_tombstone(id, op.seq, &op.author_id);
        Ok(ApplyOutcome::Applied(scene.remove(id)?))
    }

    fn apply_clear(&mut self, scene: &Scene, op: &Operation) -> Result<ApplyOutcome, RemoteError> {
        let mut removed = Vec::new();
        for id in op.cleared_ids()? {
            match scene.get(*id) {
                // Edited after the clear was issued; it survives.
                Some(current) if !op.supersedes(current.version, current.author.as_deref()) => {
                    continue;
                }
                Some(_) => removed.push(*id),
                None => {}
            }
            self.record_tombstone(*id, op.seq, &op.author_id);
        }
        if removed.is_empty() {
            return Ok(ApplyOutcome::Rejected(Rejection::NothingToClear));
        }
        Ok(ApplyOutcome::Applied(scene.remove_all(&removed)))
    }
}
