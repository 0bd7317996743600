//! Per-room relay state.

use ideaboard_core::{ElementId, Operation, OperationKind, Participant, ServerMessage};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of each room's fan-out channel.
pub const CHANNEL_CAPACITY: usize = 256;

/// Identifies one socket; a participant may reconnect under a new one.
pub type ConnectionId = Uuid;

/// A message fanned out to a room, tagged with the connection that sent it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: ConnectionId,
    pub message: ServerMessage,
}

/// What a connection receives when it joins.
pub struct Membership {
    pub rx: broadcast::Receiver<Envelope>,
    /// Everyone already in the room.
    pub participants: Vec<Participant>,
    pub backlog: Vec<Operation>,
}

pub struct Room {
    tx: broadcast::Sender<Envelope>,
    members: BTreeMap<ConnectionId, Participant>,
    /// Winning operation per element under the last-writer-wins rule.
    registers: HashMap<ElementId, Operation>,
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

impl Room {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            members: BTreeMap::new(),
            registers: HashMap::new(),
        }
    }

    pub fn join(&mut self, connection: ConnectionId, participant: Participant) -> Membership {
        let participants = self.peers(&connection);
        self.members.insert(connection, participant);
        Membership {
            rx: self.tx.subscribe(),
            participants,
            backlog: self.backlog(),
        }
    }

    /// Remove a connection, returning who it was.
    pub fn leave(&mut self, connection: &ConnectionId) -> Option<Participant> {
        self.members.remove(connection)
    }

    /// Everyone in the room except `connection`.
    pub fn peers(&self, connection: &ConnectionId) -> Vec<Participant> {
        self.members
            .iter()
            .filter(|(id, _)| *id != connection)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn member(&self, connection: &ConnectionId) -> Option<&Participant> {
        self.members.get(connection)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Fold an operation into the registers. Returns false when it lost to
    /// what the room already holds for every element it touches.
    pub fn record(&mut self, operation: &Operation) -> bool {
        match operation.kind {
            OperationKind::Clear => {
                let Ok(ids) = operation.cleared_ids() else {
                    return false;
                };
                let mut changed = false;
                for id in ids {
                    let delete = Operation::delete(*id, &operation.author_id, operation.seq);
                    changed |= self.store(delete);
                }
                changed
            }
            _ => self.store(operation.clone()),
        }
    }

    fn store(&mut self, operation: Operation) -> bool {
        let wins = match self.registers.get(&operation.element_id) {
            Some(current) => operation.supersedes(current.seq, Some(&current.author_id)),
            None => true,
        };
        if wins {
            self.registers.insert(operation.element_id, operation);
        }
        wins
    }

    /// Register contents in causal order, ready to replay on a fresh scene.
    pub fn backlog(&self) -> Vec<Operation> {
        let mut ops: Vec<Operation> = self.registers.values().cloned().collect();
        ops.sort_by(|a, b| {
            a.seq
                .cmp(&b.seq)
                .then_with(|| a.author_id.cmp(&b.author_id))
                .then_with(|| a.element_id.cmp(&b.element_id))
        });
        ops
    }

    /// Fan a message out to every subscriber; the sender filters its own.
    pub fn broadcast(&self, from: ConnectionId, message: ServerMessage) {
        // No receivers is not an error: the room may have one member.
        let _ = self.tx.send(Envelope { from, message });
    }
}
