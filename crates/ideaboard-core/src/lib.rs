//! Ideaboard Core Library
//!
//! Platform-agnostic data model and logic for the Ideaboard collaborative
//! whiteboard: elements, the immutable scene, undo history, drawing tools,
//! the viewport and the collaboration protocol.

pub mod board;
pub mod camera;
pub mod collaboration;
pub mod config;
pub mod history;
pub mod input;
pub mod scene;
pub mod shapes;
pub mod storage;
pub mod sync;
pub mod tools;
pub mod transport;

pub use board::Whiteboard;
pub use camera::Camera;
pub use collaboration::{CollaborationSession, CollaboratorCursor, SessionState, SyncEvent};
pub use config::{BoardConfig, ConfigError};
pub use history::HistoryManager;
pub use input::{InputState, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use scene::{Scene, SceneChange, SceneError};
pub use shapes::{Element, ElementError, ElementId, ElementStyle, SerializableColor, Shape};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use sync::{ClientMessage, Operation, OperationKind, Participant, ServerMessage};
pub use tools::{EraserMode, ToolKind, ToolManager};
pub use transport::{ConnectionState, NativeWebSocket, TransportError};
