//! Wire protocol for collaboration.
//!
//! Messages are JSON objects tagged by `type`. The relay server and every
//! client share these definitions.

use crate::scene::SceneError;
use crate::shapes::{Element, ElementError, ElementId, ElementStyle, ParticipantId, Shape};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

/// Errors for inbound operations that cannot be applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("malformed operation: {0}")]
    Malformed(String),
    #[error("invalid element in operation: {0}")]
    Invalid(#[from] ElementError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// A member of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub participant_id: ParticipantId,
    pub display_name: String,
    /// CSS-style hex color used for the cursor marker.
    pub color: String,
}

impl Participant {
    pub fn new(
        participant_id: impl Into<ParticipantId>,
        display_name: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            participant_id: participant_id.into(),
            display_name: display_name.into(),
            color: color.into(),
        }
    }
}

/// Kind of scene mutation carried by an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    /// Delete every listed element at once.
    Clear,
}

/// Operation body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Full element state for Create and Update.
    Element { shape: Shape, style: ElementStyle },
    /// Ids removed by a Clear.
    Cleared { ids: Vec<ElementId> },
}

/// A single scene mutation as broadcast to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Target element; nil for Clear.
    pub element_id: ElementId,
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    pub author_id: ParticipantId,
    /// Lamport timestamp; becomes the element's version when applied.
    pub seq: u64,
}

impl Operation {
    fn with_element(kind: OperationKind, element: &Element, author_id: &str, seq: u64) -> Self {
        Self {
            element_id: element.id,
            kind,
            payload: Some(Payload::Element {
                shape: element.shape.clone(),
                style: element.style,
            }),
            author_id: author_id.to_string(),
            seq,
        }
    }

    pub fn create(element: &Element, author_id: &str, seq: u64) -> Self {
        Self::with_element(OperationKind::Create, element, author_id, seq)
    }

    pub fn update(element: &Element, author_id: &str, seq: u64) -> Self {
        Self::with_element(OperationKind::Update, element, author_id, seq)
    }

    pub fn delete(element_id: ElementId, author_id: &str, seq: u64) -> Self {
        Self {
            element_id,
            kind: OperationKind::Delete,
            payload: None,
            author_id: author_id.to_string(),
            seq,
        }
    }

    pub fn clear(ids: Vec<ElementId>, author_id: &str, seq: u64) -> Self {
        Self {
            element_id: Uuid::nil(),
            kind: OperationKind::Clear,
            payload: Some(Payload::Cleared { ids }),
            author_id: author_id.to_string(),
            seq,
        }
    }

    /// The element this Create/Update carries, stamped with `seq` and author.
    pub fn to_element(&self) -> Result<Element, RemoteError> {
        match &self.payload {
            Some(Payload::Element { shape, style }) => {
                let element = Element {
                    id: self.element_id,
                    shape: shape.clone(),
                    style: *style,
                    version: self.seq,
                    author: Some(self.author_id.clone()),
                };
                element.validate()?;
                Ok(element)
            }
            _ => Err(RemoteError::Malformed(format!(
                "{:?} for {} carries no element",
                self.kind, self.element_id
            ))),
        }
    }

    /// Ids listed by a Clear.
    pub fn cleared_ids(&self) -> Result<&[ElementId], RemoteError> {
        match &self.payload {
            Some(Payload::Cleared { ids }) => Ok(ids),
            _ => Err(RemoteError::Malformed(
                "clear carries no id list".to_string(),
            )),
        }
    }

    /// Check that the payload matches the kind and the geometry is valid.
    pub fn validate(&self) -> Result<(), RemoteError> {
        if self.seq == 0 {
            return Err(RemoteError::Malformed("seq must be positive".to_string()));
        }
        if self.author_id.is_empty() {
            return Err(RemoteError::Malformed("missing author".to_string()));
        }
        match self.kind {
            OperationKind::Create | OperationKind::Update => self.to_element().map(|_| ()),
            OperationKind::Delete => Ok(()),
            OperationKind::Clear => self.cleared_ids().map(|_| ()),
        }
    }

    /// Whether this operation wins over the state written at
    /// `(version, version_author)`.
    pub fn supersedes(&self, version: u64, version_author: Option<&str>) -> bool {
        supersedes(self.seq, &self.author_id, version, version_author)
    }
}

/// Last-writer-wins ordering: a higher seq wins; equal seqs are broken by
/// the author id, the lexicographically greater author winning.
pub fn supersedes(seq: u64, author: &str, version: u64, version_author: Option<&str>) -> bool {
    match seq.cmp(&version) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => version_author.is_none_or(|current| author > current),
    }
}

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room
    Join {
        room: String,
        #[serde(flatten)]
        participant: Participant,
    },
    /// Publish a scene mutation
    Operation { operation: Operation },
    /// Local pointer position in world coordinates
    Cursor {
        participant_id: ParticipantId,
        position: Point,
    },
    /// Leave current room
    Leave { participant_id: ParticipantId },
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join with the current members and the room's operation log
    Joined {
        room: String,
        participants: Vec<Participant>,
        #[serde(default)]
        backlog: Vec<Operation>,
    },
    /// Peer joined the room
    PeerJoined { participant: Participant },
    /// Peer left the room
    PeerLeft { participant_id: ParticipantId },
    /// Scene mutation from another peer
    Operation { operation: Operation },
    /// Cursor update from another peer
    Cursor {
        participant_id: ParticipantId,
        position: Point,
    },
    /// Error message
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Rectangle, Sticky};

    fn sticky() -> Element {
        Element::new(
            Shape::Sticky(Sticky::new(Point::new(1.0, 2.0), "idea")),
            ElementStyle::default(),
        )
    }

    #[test]
    fn test_client_message_serialize() {
        let msg = ClientMessage::Join {
            room: "test-room".to_string(),
            participant: Participant::new("p1", "Alice", "#ff6b6b"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "join");
        assert_eq!(json["room"], "test-room");
        assert_eq!(json["participant_id"], "p1");
        assert_eq!(json["display_name"], "Alice");

        let back: ClientMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_server_message_deserialize() {
        let json = r#"{"type":"joined","room":"test","participants":[]}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        match msg {
            ServerMessage::Joined {
                room,
                participants,
                backlog,
            } => {
                assert_eq!(room, "test");
                assert!(participants.is_empty());
                assert!(backlog.is_empty());
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_operation_wire_format() {
        let element = sticky();
        let op = Operation::create(&element, "p1", 4);
        let json = serde_json::to_value(ClientMessage::Operation {
            operation: op.clone(),
        })
        .unwrap();
        assert_eq!(json["type"], "operation");
        assert_eq!(json["operation"]["kind"], "create");
        assert_eq!(json["operation"]["seq"], 4);
        assert_eq!(json["operation"]["payload"]["element"]["shape"]["kind"], "sticky");

        let delete = serde_json::to_value(Operation::delete(element.id, "p1", 5)).unwrap();
        assert!(delete.get("payload").is_none());
    }

    #[test]
    fn test_to_element_stamps_version_and_author() {
        let element = sticky();
        let op = Operation::update(&element, "p2", 9);
        let decoded = op.to_element().unwrap();
        assert_eq!(decoded.version, 9);
        assert_eq!(decoded.author.as_deref(), Some("p2"));
        assert!(decoded.same_content(&element));
    }

    #[test]
    fn test_validate_rejects_mismatched_payload() {
        let element = sticky();
        let mut op = Operation::create(&element, "p1", 1);
        op.payload = None;
        assert!(matches!(op.validate(), Err(RemoteError::Malformed(_))));

        let mut clear = Operation::clear(vec![element.id], "p1", 2);
        clear.payload = Some(Payload::Element {
            shape: element.shape.clone(),
            style: element.style,
        });
        assert!(matches!(clear.validate(), Err(RemoteError::Malformed(_))));

        assert!(Operation::delete(element.id, "p1", 3).validate().is_ok());
        assert!(matches!(
            Operation::delete(element.id, "p1", 0).validate(),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn test_validate_rejects_invalid_geometry() {
        let bad = Element::new(
            Shape::Rectangle(Rectangle::new(Point::new(f64::INFINITY, 0.0), 1.0, 1.0)),
            ElementStyle::default(),
        );
        let op = Operation::create(&bad, "p1", 1);
        assert!(matches!(op.validate(), Err(RemoteError::Invalid(_))));
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        let json = r#"{"type":"operation","operation":{"element_id":"00000000-0000-0000-0000-000000000000","kind":"explode","author_id":"p1","seq":1}}"#;
        assert!(serde_json::from_str::<ServerMessage>(json).is_err());
    }

    #[test]
    fn test_supersedes_rule() {
        assert!(supersedes(5, "a", 4, Some("z")));
        assert!(!supersedes(3, "z", 4, Some("a")));
        assert!(supersedes(4, "b", 4, Some("a")));
        assert!(!supersedes(4, "a", 4, Some("b")));
        assert!(!supersedes(4, "a", 4, Some("a")));
        assert!(supersedes(4, "a", 4, None));
    }
}
