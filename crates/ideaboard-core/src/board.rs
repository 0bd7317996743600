//! The whiteboard: scene, history, tools, camera and collaboration wired
//! together behind one event-driven API.
//!
//! Hosts feed it pointer, keyboard and network events; it hands back JSON to
//! send and exposes the state a renderer needs. Every scene mutation goes
//! through [`Scene`] and lands in [`HistoryManager`].

use crate::camera::Camera;
use crate::collaboration::{
    ApplyOutcome, CollaborationSession, CollaboratorCursor, SyncEvent,
};
use crate::config::BoardConfig;
use crate::history::HistoryManager;
use crate::input::{Command, InputState, KeyEvent, MouseButton, PointerEvent, command_for};
use crate::scene::{ElementPatch, Scene, SceneError};
use crate::shapes::{Element, ElementId, ElementKind, ElementStyle, Shape};
use crate::storage::{Storage, StorageResult};
use crate::sync::{Operation, Participant};
use crate::tools::{ToolKind, ToolManager, ToolOutcome};
use crate::transport::{NativeWebSocket, TransportEvent};
use kurbo::{Point, Size};
use std::time::Instant;

/// A collaborative whiteboard for one participant.
#[derive(Debug, Clone)]
pub struct Whiteboard {
    config: BoardConfig,
    scene: Scene,
    history: HistoryManager,
    pub tools: ToolManager,
    pub camera: Camera,
    session: CollaborationSession,
    input: InputState,
    viewport: Size,
    /// Button driving a viewport drag, if one is in progress.
    panning: Option<MouseButton>,
}

impl Whiteboard {
    pub fn new(config: BoardConfig, participant: Participant) -> Self {
        let mut tools = ToolManager::new();
        tools.current_style = ElementStyle::new(config.default_color, config.default_stroke_width);
        tools.background = config.background_color;
        tools.eraser_mode = config.eraser_mode;
        tools.eraser_scale = config.eraser_scale;
        tools.sticky_text = config.sticky_placeholder.clone();

        let scene = Scene::new();
        Self {
            history: HistoryManager::with_capacity(scene.clone(), config.history_depth),
            session: CollaborationSession::with_config(participant, &config),
            viewport: Size::new(f64::from(config.canvas_width), f64::from(config.canvas_height)),
            config,
            scene,
            tools,
            camera: Camera::new(),
            input: InputState::new(),
            panning: None,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// The committed scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn session(&self) -> &CollaborationSession {
        &self.session
    }

    /// The element being drawn, not yet committed.
    pub fn transient(&self) -> Option<&Element> {
        self.tools.transient()
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn resize(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    /// Select a tool. Refused while text input is pending.
    pub fn set_tool(&mut self, tool: ToolKind) -> bool {
        self.tools.set_tool(tool)
    }

    // --- Pointer and keyboard ---

    /// Process a pointer event in screen coordinates.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.handle_pointer_at(event, Instant::now());
    }

    /// [`Self::handle_pointer`] with an explicit clock for the cursor throttle.
    pub fn handle_pointer_at(&mut self, event: PointerEvent, now: Instant) {
        self.input.handle_pointer_event(&event);
        match event {
            PointerEvent::Down { position, button } => {
                let pans = button == MouseButton::Middle
                    || (button == MouseButton::Left && self.tools.current_tool() == ToolKind::Pan);
                if pans {
                    self.panning = Some(button);
                } else if button == MouseButton::Left {
                    let world = self.camera.screen_to_world(position);
                    let outcome = self.tools.pointer_down(world);
                    self.apply_outcome(outcome);
                }
            }
            PointerEvent::Move { position } => {
                if self.panning.is_some() {
                    self.camera.pan(self.input.pointer_delta());
                } else {
                    self.tools.pointer_move(self.camera.screen_to_world(position));
                }
                self.session
                    .update_cursor(self.camera.screen_to_world(position), now);
            }
            PointerEvent::Up { button, .. } => {
                if self.panning == Some(button) {
                    self.panning = None;
                } else if button == MouseButton::Left {
                    let outcome = self.tools.pointer_up();
                    self.apply_outcome(outcome);
                }
            }
            PointerEvent::Leave => {
                self.panning = None;
                let outcome = self.tools.pointer_leave();
                self.apply_outcome(outcome);
            }
            PointerEvent::Scroll { position, delta } => {
                if delta.y < 0.0 {
                    self.camera.zoom_in(position);
                } else if delta.y > 0.0 {
                    self.camera.zoom_out(position);
                }
            }
        }
    }

    /// Process a key event. Returns the command it triggered, if any.
    pub fn handle_key(&mut self, event: KeyEvent) -> Option<Command> {
        self.input.handle_key_event(&event);
        let KeyEvent::Pressed { key, modifiers } = event else {
            return None;
        };
        let command = command_for(&key, modifiers)?;
        let center = Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0);
        match command {
            Command::Undo => {
                self.undo();
            }
            Command::Redo => {
                self.redo();
            }
            Command::Cancel => {
                self.tools.cancel();
            }
            Command::ZoomIn => self.camera.zoom_in(center),
            Command::ZoomOut => self.camera.zoom_out(center),
            Command::ResetZoom => self.camera.reset(),
        }
        Some(command)
    }

    /// Finish pending text input.
    pub fn submit_text(&mut self, text: &str) {
        let outcome = self.tools.submit_text(text);
        self.apply_outcome(outcome);
    }

    pub fn cancel_text(&mut self) -> bool {
        self.tools.cancel_text()
    }

    fn apply_outcome(&mut self, outcome: ToolOutcome) {
        match outcome {
            ToolOutcome::None => {}
            ToolOutcome::Commit(element) => self.commit_element(element),
            ToolOutcome::Erase { path, radius } => {
                self.erase_along(&path, radius);
            }
            ToolOutcome::Discarded => log::debug!("Drawing discarded"),
        }
    }

    // --- Local mutations ---

    fn commit(&mut self, scene: Scene) {
        self.scene = scene;
        self.history.commit(self.scene.clone());
    }

    fn commit_element(&mut self, mut element: Element) {
        self.session.stamp(&mut element);
        match self.scene.insert(element.clone()) {
            Ok(next) => {
                log::debug!("Committed {} {}", element.kind(), element.id);
                self.commit(next);
                self.session.publish_create(&element);
            }
            Err(e) => log::warn!("Rejected commit of {}: {e}", element.id),
        }
    }

    /// Delete every element within `radius` of the polyline `path`.
    /// Returns how many were removed.
    pub fn erase_along(&mut self, path: &[Point], radius: f64) -> usize {
        let mut hit: Vec<ElementId> = Vec::new();
        for point in sample_path(path, radius.max(1.0)) {
            for id in self.scene.elements_at_point(point, radius) {
                if !hit.contains(&id) {
                    hit.push(id);
                }
            }
        }
        if hit.is_empty() {
            return 0;
        }
        let next = self.scene.remove_all(&hit);
        self.commit(next);
        self.session.publish_clear(hit.clone());
        hit.len()
    }

    pub fn delete_element(&mut self, id: ElementId) -> Result<(), SceneError> {
        let next = self.scene.remove(id)?;
        self.commit(next);
        self.session.publish_delete(id);
        Ok(())
    }

    /// Remove every element as a single undoable step.
    pub fn clear(&mut self) -> bool {
        let ids = self.scene.ids();
        if ids.is_empty() {
            return false;
        }
        let next = self.scene.clear();
        self.commit(next);
        self.session.publish_clear(ids);
        true
    }

    /// Replace the text of a sticky note.
    pub fn edit_sticky_text(&mut self, id: ElementId, text: &str) -> Result<(), SceneError> {
        let current = self.scene.get(id).ok_or(SceneError::NotFound(id))?;
        let Shape::Sticky(sticky) = &current.shape else {
            return Err(SceneError::WrongKind {
                id,
                expected: ElementKind::Sticky,
                found: current.kind(),
            });
        };
        let mut sticky = sticky.clone();
        sticky.text = text.to_string();

        let next = self.scene.update(
            id,
            ElementPatch {
                shape: Some(Shape::Sticky(sticky)),
                style: None,
                version: self.session.next_seq(),
                author: Some(self.session.participant_id().to_string()),
            },
        )?;
        self.commit(next);
        if let Some(element) = self.scene.get(id) {
            let element = element.clone();
            self.session.publish_update(&element);
        }
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let Some(target) = self.history.undo().cloned() else {
            return false;
        };
        self.restore(target);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(target) = self.history.redo().cloned() else {
            return false;
        };
        self.restore(target);
        true
    }

    /// Switch to a history snapshot and tell peers what changed.
    fn restore(&mut self, target: Scene) {
        let changes = self.scene.diff(&target);
        match self.session.publish_changes(&target, changes) {
            Ok(stamped) => {
                self.history.amend(stamped.clone());
                self.scene = stamped;
            }
            Err(e) => {
                log::warn!("Failed to publish history step: {e}");
                self.scene = target;
            }
        }
    }

    // --- Persistence ---

    /// Load a saved scene, replacing the current one. History restarts.
    pub fn load_scene_json(&mut self, json: &str) -> Result<(), SceneError> {
        self.load_scene(Scene::from_json(json)?)
    }

    /// Replace the board contents. Differences are published to the room;
    /// history restarts at the loaded scene.
    pub fn load_scene(&mut self, loaded: Scene) -> Result<(), SceneError> {
        let changes = self.scene.diff(&loaded);
        let mut next = self.session.publish_changes(&loaded, changes)?;
        // Untouched elements keep their versions.
        for element in self.scene.iter() {
            if next.get(element.id).is_some_and(|e| e.same_content(element)) {
                next = next.replace(element.clone())?;
            }
        }
        log::info!("Loaded scene with {} element(s)", next.len());
        self.scene = next;
        self.history.reset(self.scene.clone());
        Ok(())
    }

    /// Store the current scene under `name`.
    pub async fn save_to<S: Storage + ?Sized>(&self, storage: &S, name: &str) -> StorageResult<()> {
        storage.save(name, &self.scene).await?;
        log::info!("Saved board {name} ({} element(s))", self.scene.len());
        Ok(())
    }

    /// Replace the board with the scene stored under `name`.
    pub async fn load_from<S: Storage + ?Sized>(
        &mut self,
        storage: &S,
        name: &str,
    ) -> StorageResult<()> {
        let scene = storage.load(name).await?;
        self.load_scene(scene)?;
        Ok(())
    }

    pub fn scene_json(&self) -> Result<String, SceneError> {
        self.scene.to_json()
    }

    // --- Collaboration ---

    /// Join a room. Anything already drawn is published once joined.
    pub fn connect(&mut self, room: &str) {
        self.session.join_room(room);
        let changes = Scene::new().diff(&self.scene);
        match self.session.publish_changes(&self.scene, changes) {
            Ok(stamped) => {
                self.history.amend(stamped.clone());
                self.scene = stamped;
            }
            Err(e) => log::warn!("Failed to publish existing scene: {e}"),
        }
    }

    pub fn disconnect(&mut self) {
        self.session.leave_room();
    }

    pub fn connection_lost(&mut self) {
        self.session.connection_lost();
    }

    pub fn reconnected(&mut self) {
        self.session.reconnected();
    }

    /// Handle a server message, applying any operations it carries.
    pub fn handle_message(&mut self, json: &str) -> Vec<SyncEvent> {
        let events = self.session.handle_message(json);
        for event in &events {
            if let SyncEvent::Operation(op) = event {
                self.apply_remote(op);
            }
        }
        events
    }

    fn apply_remote(&mut self, op: &Operation) {
        match self.session.apply_remote(&self.scene, op) {
            Ok(ApplyOutcome::Applied(next)) => self.commit(next),
            Ok(ApplyOutcome::Rejected(reason)) => {
                log::debug!("Ignoring {:?} from {}: {reason}", op.kind, op.author_id)
            }
            Err(e) => log::warn!("Dropping operation from {}: {e}", op.author_id),
        }
    }

    /// Outgoing JSON messages, oldest first.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        self.session.take_outgoing()
    }

    /// Send any held-back cursor position that is now due.
    pub fn tick(&mut self, now: Instant) {
        self.session.flush_cursor(now);
    }

    /// Exchange pending traffic with a native socket.
    pub fn pump(&mut self, socket: &mut NativeWebSocket) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for event in socket.poll_events() {
            match event {
                TransportEvent::Connected => self.session.reconnected(),
                TransportEvent::Disconnected => self.session.connection_lost(),
                TransportEvent::Error { message } => {
                    log::warn!("Transport error: {message}");
                    self.session.connection_lost();
                    events.extend(self.session.rejoin_failed());
                }
                TransportEvent::Message(json) => events.extend(self.handle_message(&json)),
            }
        }
        self.tick(Instant::now());
        if socket.is_connected() {
            for msg in self.take_outgoing() {
                if let Err(e) = socket.send(&msg) {
                    log::warn!("Failed to send message: {e}");
                }
            }
        }
        events
    }

    pub fn collaborator_cursors(&self) -> Vec<CollaboratorCursor> {
        self.session.collaborator_cursors()
    }
}

/// Points along `path` no further apart than `step`.
fn sample_path(path: &[Point], step: f64) -> Vec<Point> {
    let mut samples = Vec::with_capacity(path.len());
    let Some(first) = path.first() else {
        return samples;
    };
    samples.push(*first);
    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let steps = (a.distance(b) / step).ceil().max(1.0) as usize;
        for i in 1..=steps {
            samples.push(a.lerp(b, i as f64 / steps as f64));
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::shapes::Sticky;
    use crate::storage::{MemoryStorage, StorageError};
    use crate::tools::{EraserMode, ToolState};
    use kurbo::Vec2;

    fn board() -> Whiteboard {
        Whiteboard::new(BoardConfig::default(), Participant::new("me", "Me", "#00d4aa"))
    }

    fn down(board: &mut Whiteboard, x: f64, y: f64) {
        board.handle_pointer(PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
        });
    }

    fn move_to(board: &mut Whiteboard, x: f64, y: f64) {
        board.handle_pointer(PointerEvent::Move {
            position: Point::new(x, y),
        });
    }

    fn up(board: &mut Whiteboard, x: f64, y: f64) {
        board.handle_pointer(PointerEvent::Up {
            position: Point::new(x, y),
            button: MouseButton::Left,
        });
    }

    fn drag(board: &mut Whiteboard, from: (f64, f64), to: (f64, f64)) {
        down(board, from.0, from.1);
        move_to(board, to.0, to.1);
        up(board, to.0, to.1);
    }

    fn joined(board: &mut Whiteboard, room: &str) {
        board.connect(room);
        board.handle_message(&format!(
            r#"{{"type":"joined","room":"{room}","participants":[]}}"#
        ));
    }

    #[test]
    fn test_freehand_commit() {
        let mut board = board();
        down(&mut board, 0.0, 0.0);
        move_to(&mut board, 10.0, 10.0);
        move_to(&mut board, 20.0, 5.0);
        assert!(board.transient().is_some());
        assert!(board.scene().is_empty());
        up(&mut board, 20.0, 5.0);

        assert_eq!(board.scene().len(), 1);
        assert_eq!(board.history().len(), 2);
        let element = board.scene().iter().next().unwrap();
        match &element.shape {
            Shape::Freehand(f) => assert_eq!(f.len(), 3),
            other => panic!("expected freehand, got {other:?}"),
        }
        assert_eq!(element.version, 1);
    }

    #[test]
    fn test_leave_discards_drawing() {
        let mut board = board();
        joined(&mut board, "room");
        board.take_outgoing();
        down(&mut board, 0.0, 0.0);
        move_to(&mut board, 10.0, 10.0);
        board.handle_pointer(PointerEvent::Leave);

        assert!(board.scene().is_empty());
        assert_eq!(board.history().len(), 1);
        let outgoing = board.take_outgoing();
        assert!(outgoing.iter().all(|m| !m.contains("\"operation\"")));
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut board = board();
        board.set_tool(ToolKind::Rectangle);
        drag(&mut board, (0.0, 0.0), (50.0, 50.0));
        drag(&mut board, (100.0, 100.0), (40.0, 60.0));
        assert_eq!(board.scene().len(), 2);

        assert!(board.undo());
        assert_eq!(board.scene().len(), 1);
        assert!(board.redo());
        assert_eq!(board.scene().len(), 2);
        assert!(!board.redo());

        assert!(board.undo());
        assert!(board.undo());
        assert!(board.scene().is_empty());
        assert!(!board.undo());
    }

    #[test]
    fn test_undo_shortcut() {
        let mut board = board();
        board.set_tool(ToolKind::Line);
        drag(&mut board, (0.0, 0.0), (30.0, 0.0));
        assert_eq!(
            board.handle_key(KeyEvent::pressed("z", Modifiers::CTRL)),
            Some(Command::Undo)
        );
        assert!(board.scene().is_empty());
        assert_eq!(
            board.handle_key(KeyEvent::pressed("y", Modifiers::CTRL)),
            Some(Command::Redo)
        );
        assert_eq!(board.scene().len(), 1);
        assert_eq!(board.handle_key(KeyEvent::pressed("Enter", Modifiers::NONE)), None);
    }

    #[test]
    fn test_new_commit_prunes_redo_branch() {
        let mut board = board();
        board.set_tool(ToolKind::Sticky);
        down(&mut board, 0.0, 0.0);
        down(&mut board, 200.0, 0.0);
        board.undo();
        down(&mut board, 400.0, 0.0);
        assert!(!board.redo());
        assert_eq!(board.scene().len(), 2);
    }

    #[test]
    fn test_sticky_and_text() {
        let mut board = board();
        board.set_tool(ToolKind::Sticky);
        down(&mut board, 10.0, 10.0);
        up(&mut board, 10.0, 10.0);
        assert_eq!(board.scene().len(), 1);

        board.set_tool(ToolKind::Text);
        down(&mut board, 300.0, 300.0);
        assert!(matches!(board.tools.state(), ToolState::AwaitingTextInput { .. }));
        assert!(!board.set_tool(ToolKind::Freehand));
        board.submit_text("   ");
        assert_eq!(board.scene().len(), 1);

        down(&mut board, 300.0, 300.0);
        assert!(board.cancel_text());
        down(&mut board, 300.0, 300.0);
        board.submit_text("hello");
        assert_eq!(board.scene().len(), 2);
    }

    #[test]
    fn test_escape_cancels_drawing() {
        let mut board = board();
        down(&mut board, 0.0, 0.0);
        move_to(&mut board, 5.0, 5.0);
        assert_eq!(
            board.handle_key(KeyEvent::pressed("Escape", Modifiers::NONE)),
            Some(Command::Cancel)
        );
        up(&mut board, 5.0, 5.0);
        assert!(board.scene().is_empty());
    }

    #[test]
    fn test_pan_and_zoom_do_not_touch_scene() {
        let mut board = board();
        board.handle_pointer(PointerEvent::Down {
            position: Point::new(100.0, 100.0),
            button: MouseButton::Middle,
        });
        move_to(&mut board, 130.0, 90.0);
        board.handle_pointer(PointerEvent::Up {
            position: Point::new(130.0, 90.0),
            button: MouseButton::Middle,
        });
        assert_eq!(board.camera.offset, Vec2::new(30.0, -10.0));

        board.handle_pointer(PointerEvent::Scroll {
            position: Point::new(0.0, 0.0),
            delta: Vec2::new(0.0, -1.0),
        });
        assert_eq!(board.camera.zoom_percent(), 125);
        assert!(board.scene().is_empty());
        assert_eq!(board.history().len(), 1);
    }

    #[test]
    fn test_drawing_uses_world_coordinates() {
        let mut board = board();
        board.camera.pan(Vec2::new(100.0, 0.0));
        board.set_tool(ToolKind::Sticky);
        down(&mut board, 100.0, 50.0);
        match &board.scene().iter().next().unwrap().shape {
            Shape::Sticky(sticky) => assert_eq!(sticky.anchor, Point::new(0.0, 50.0)),
            other => panic!("expected sticky, got {other:?}"),
        }
    }

    #[test]
    fn test_eraser_delete_mode() {
        let mut board = Whiteboard::new(
            BoardConfig {
                eraser_mode: EraserMode::Delete,
                ..BoardConfig::default()
            },
            Participant::new("me", "Me", "#fff"),
        );
        board.set_tool(ToolKind::Line);
        drag(&mut board, (0.0, 50.0), (100.0, 50.0));
        drag(&mut board, (0.0, 300.0), (100.0, 300.0));
        assert_eq!(board.scene().len(), 2);

        board.set_tool(ToolKind::Eraser);
        drag(&mut board, (50.0, 0.0), (50.0, 100.0));
        assert_eq!(board.scene().len(), 1);
        assert_eq!(board.history().len(), 4);

        board.undo();
        assert_eq!(board.scene().len(), 2);
    }

    #[test]
    fn test_eraser_overdraw_mode_commits_stroke() {
        let mut board = board();
        board.set_tool(ToolKind::Eraser);
        drag(&mut board, (0.0, 0.0), (10.0, 0.0));
        let element = board.scene().iter().next().unwrap();
        assert_eq!(element.style.color, board.config().background_color);
        assert_eq!(element.style.stroke_width, 9.0);
    }

    #[test]
    fn test_clear_is_one_step() {
        let mut board = board();
        board.set_tool(ToolKind::Sticky);
        down(&mut board, 0.0, 0.0);
        down(&mut board, 200.0, 0.0);
        assert!(board.clear());
        assert!(board.scene().is_empty());
        assert!(!board.clear());
        board.undo();
        assert_eq!(board.scene().len(), 2);
    }

    #[test]
    fn test_scene_json_round_trip_resets_history() {
        let mut source = board();
        source.set_tool(ToolKind::Ellipse);
        drag(&mut source, (0.0, 0.0), (40.0, 20.0));
        let json = source.scene_json().unwrap();

        let mut other = board();
        other.set_tool(ToolKind::Sticky);
        down(&mut other, 0.0, 0.0);
        other.load_scene_json(&json).unwrap();
        assert_eq!(other.scene().ids(), source.scene().ids());
        assert_eq!(other.history().len(), 1);
        assert!(!other.undo());

        assert!(other.load_scene_json("{oops").is_err());
        assert_eq!(other.scene().len(), 1);
    }

    #[test]
    fn test_edit_sticky_text() {
        let mut board = board();
        board.set_tool(ToolKind::Sticky);
        down(&mut board, 0.0, 0.0);
        let id = board.scene().ids()[0];
        board.edit_sticky_text(id, "Ship it").unwrap();
        match &board.scene().get(id).unwrap().shape {
            Shape::Sticky(Sticky { text, .. }) => assert_eq!(text, "Ship it"),
            other => panic!("expected sticky, got {other:?}"),
        }
        assert!(matches!(
            board.edit_sticky_text(uuid::Uuid::new_v4(), "x"),
            Err(SceneError::NotFound(_))
        ));
    }

    #[test]
    fn test_edit_sticky_text_on_other_kind() {
        let mut board = board();
        board.set_tool(ToolKind::Rectangle);
        drag(&mut board, (0.0, 0.0), (30.0, 20.0));
        let id = board.scene().ids()[0];
        assert_eq!(
            board.edit_sticky_text(id, "x"),
            Err(SceneError::WrongKind {
                id,
                expected: ElementKind::Sticky,
                found: ElementKind::Rectangle,
            })
        );
        assert_eq!(board.history().len(), 2);
    }

    fn relay(from: &mut Whiteboard, to: &mut Whiteboard) {
        for msg in from.take_outgoing() {
            to.handle_message(&msg);
        }
    }

    #[test]
    fn test_undo_redo_of_remote_edit_restores_content() {
        let mut alice = Whiteboard::new(BoardConfig::default(), Participant::new("a", "A", "#f00"));
        let mut bob = Whiteboard::new(BoardConfig::default(), Participant::new("b", "B", "#00f"));
        joined(&mut alice, "r");
        joined(&mut bob, "r");
        alice.take_outgoing();
        bob.take_outgoing();

        alice.set_tool(ToolKind::Sticky);
        down(&mut alice, 0.0, 0.0);
        relay(&mut alice, &mut bob);
        let id = alice.scene().ids()[0];
        let original = bob.scene().get(id).unwrap().clone();

        alice.edit_sticky_text(id, "Ship it").unwrap();
        relay(&mut alice, &mut bob);
        let edited = bob.scene().get(id).unwrap().clone();
        assert!(edited.same_content(alice.scene().get(id).unwrap()));
        assert!(!edited.same_content(&original));

        // Bob undoes Alice's edit: both boards go back to the placeholder.
        assert!(bob.undo());
        assert!(bob.scene().get(id).unwrap().same_content(&original));
        relay(&mut bob, &mut alice);
        assert!(alice.scene().get(id).unwrap().same_content(&original));

        assert!(bob.redo());
        assert!(bob.scene().get(id).unwrap().same_content(&edited));
        relay(&mut bob, &mut alice);
        assert!(alice.scene().get(id).unwrap().same_content(&edited));
    }

    #[test]
    fn test_repeated_joined_backlog_is_idempotent() {
        let mut board = board();
        joined(&mut board, "r");
        let element = Element::new(
            Shape::Sticky(Sticky::new(Point::new(0.0, 0.0), "resync")),
            ElementStyle::default(),
        );
        let joined = crate::sync::ServerMessage::Joined {
            room: "r".into(),
            participants: vec![],
            backlog: vec![Operation::create(&element, "peer", 3)],
        };
        let json = serde_json::to_string(&joined).unwrap();

        board.handle_message(&json);
        assert_eq!(board.scene().ids(), vec![element.id]);
        // A relay that fell behind sends the same registers again.
        board.handle_message(&json);
        assert_eq!(board.scene().len(), 1);
        assert_eq!(board.history().len(), 2);
    }

    #[test]
    fn test_save_to_and_load_from_storage() {
        let storage = MemoryStorage::new();
        let mut source = board();
        source.set_tool(ToolKind::Rectangle);
        drag(&mut source, (0.0, 0.0), (40.0, 40.0));
        pollster::block_on(source.save_to(&storage, "plan")).unwrap();

        let mut target = board();
        pollster::block_on(target.load_from(&storage, "plan")).unwrap();
        assert_eq!(target.scene().ids(), source.scene().ids());
        assert_eq!(target.history().len(), 1);
        assert!(matches!(
            pollster::block_on(target.load_from(&storage, "missing")),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_two_boards_converge() {
        let mut alice = Whiteboard::new(BoardConfig::default(), Participant::new("a", "A", "#f00"));
        let mut bob = Whiteboard::new(BoardConfig::default(), Participant::new("b", "B", "#00f"));
        joined(&mut alice, "r");
        joined(&mut bob, "r");
        alice.take_outgoing();
        bob.take_outgoing();

        alice.set_tool(ToolKind::Rectangle);
        drag(&mut alice, (0.0, 0.0), (50.0, 50.0));
        // The relay forwards operations unchanged.
        for msg in alice.take_outgoing() {
            bob.handle_message(&msg);
        }
        assert_eq!(bob.scene().ids(), alice.scene().ids());
        assert_eq!(bob.history().len(), 2);

        let id = alice.scene().ids()[0];
        let original = alice.scene().get(id).unwrap().clone();
        bob.delete_element(id).unwrap();
        for msg in bob.take_outgoing() {
            alice.handle_message(&msg);
        }
        assert!(alice.scene().is_empty());

        // Alice undoes the remote delete; Bob sees the element again.
        assert!(alice.undo());
        for msg in alice.take_outgoing() {
            bob.handle_message(&msg);
        }
        assert_eq!(bob.scene().ids(), vec![id]);
        assert!(bob.scene().get(id).unwrap().same_content(&original));
        assert!(alice.scene().get(id).unwrap().same_content(&original));

        // Redo deletes it again everywhere.
        assert!(alice.redo());
        for msg in alice.take_outgoing() {
            bob.handle_message(&msg);
        }
        assert!(alice.scene().is_empty());
        assert!(bob.scene().is_empty());
    }

    #[test]
    fn test_local_work_published_on_join() {
        let mut board = board();
        board.set_tool(ToolKind::Sticky);
        down(&mut board, 0.0, 0.0);
        board.connect("room");
        let before: Vec<String> = board.take_outgoing();
        assert_eq!(before.len(), 1);
        board.handle_message(r#"{"type":"joined","room":"room","participants":[]}"#);
        let after = board.take_outgoing();
        assert_eq!(after.len(), 1);
        assert!(after[0].contains("\"create\""));
    }

    #[test]
    fn test_cursor_is_sent_in_world_coordinates() {
        let mut board = board();
        joined(&mut board, "room");
        board.take_outgoing();
        board.camera.pan(Vec2::new(10.0, 0.0));
        board.handle_pointer_at(
            PointerEvent::Move {
                position: Point::new(110.0, 20.0),
            },
            Instant::now(),
        );
        let sent = board.take_outgoing();
        assert_eq!(sent.len(), 1);
        let msg: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(msg["type"], "cursor");
        assert_eq!(msg["position"]["x"], 100.0);
    }

    #[test]
    fn test_sample_path() {
        let samples = sample_path(&[Point::ZERO, Point::new(10.0, 0.0)], 4.0);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples.last(), Some(&Point::new(10.0, 0.0)));
        assert!(sample_path(&[], 1.0).is_empty());
    }
}
