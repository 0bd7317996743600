//! Pointer and keyboard events, plus the keyboard shortcut table.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };

    pub const CTRL_SHIFT: Modifiers = Modifiers {
        ctrl: true,
        shift: true,
        ..Modifiers::NONE
    };

    /// Ctrl on Windows/Linux, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point, button: MouseButton },
    Up { position: Point, button: MouseButton },
    Move { position: Point },
    /// The pointer left the canvas.
    Leave,
    Scroll { position: Point, delta: Vec2 },
}

/// Keyboard event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyEvent {
    Pressed { key: String, modifiers: Modifiers },
    Released { key: String },
}

impl KeyEvent {
    pub fn pressed(key: impl Into<String>, modifiers: Modifiers) -> Self {
        KeyEvent::Pressed {
            key: key.into(),
            modifiers,
        }
    }
}

/// Board-level commands reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Undo,
    Redo,
    /// Abort the drawing in progress or the pending text input.
    Cancel,
    ZoomIn,
    ZoomOut,
    ResetZoom,
}

/// A key plus the modifiers that must be held.
#[derive(Debug, Clone, Copy)]
pub struct Shortcut {
    pub key: &'static str,
    pub command_key: bool,
    pub shift: bool,
    pub command: Command,
}

/// Default shortcut table. Order matters: the first match wins.
pub const SHORTCUTS: &[Shortcut] = &[
    Shortcut { key: "z", command_key: true, shift: true, command: Command::Redo },
    Shortcut { key: "z", command_key: true, shift: false, command: Command::Undo },
    Shortcut { key: "y", command_key: true, shift: false, command: Command::Redo },
    Shortcut { key: "Escape", command_key: false, shift: false, command: Command::Cancel },
    Shortcut { key: "=", command_key: true, shift: false, command: Command::ZoomIn },
    Shortcut { key: "+", command_key: true, shift: false, command: Command::ZoomIn },
    Shortcut { key: "-", command_key: true, shift: false, command: Command::ZoomOut },
    Shortcut { key: "0", command_key: true, shift: false, command: Command::ResetZoom },
];

impl Shortcut {
    fn matches(&self, key: &str, modifiers: Modifiers) -> bool {
        self.key.eq_ignore_ascii_case(key)
            && self.command_key == modifiers.command()
            && self.shift == modifiers.shift
    }
}

/// Look up the command bound to a key press.
pub fn command_for(key: &str, modifiers: Modifiers) -> Option<Command> {
    SHORTCUTS
        .iter()
        .find(|s| s.matches(key, modifiers))
        .map(|s| s.command)
}

/// Tracks pointer and key state between events.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Current pointer position in screen coordinates.
    pub pointer_position: Point,
    /// Previous pointer position for delta calculations.
    pub previous_pointer_position: Point,
    /// Whether the pointer is over the canvas.
    pub inside: bool,
    pressed_buttons: HashSet<MouseButton>,
    pressed_keys: HashSet<String>,
    pub modifiers: Modifiers,
}

impl InputState {
    /// Create a new input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a pointer event.
    pub fn handle_pointer_event(&mut self, event: &PointerEvent) {
        match event {
            PointerEvent::Down { position, button } => {
                self.move_to(*position);
                self.pressed_buttons.insert(*button);
            }
            PointerEvent::Up { position, button } => {
                self.move_to(*position);
                self.pressed_buttons.remove(button);
            }
            PointerEvent::Move { position } | PointerEvent::Scroll { position, .. } => {
                self.move_to(*position);
            }
            PointerEvent::Leave => {
                self.inside = false;
                self.pressed_buttons.clear();
            }
        }
    }

    fn move_to(&mut self, position: Point) {
        self.previous_pointer_position = if self.inside {
            self.pointer_position
        } else {
            position
        };
        self.pointer_position = position;
        self.inside = true;
    }

    /// Process a key event.
    pub fn handle_key_event(&mut self, event: &KeyEvent) {
        match event {
            KeyEvent::Pressed { key, modifiers } => {
                self.modifiers = *modifiers;
                self.pressed_keys.insert(key.clone());
            }
            KeyEvent::Released { key } => {
                self.pressed_keys.remove(key);
            }
        }
    }

    /// Check if a button is currently pressed.
    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Check if a key is currently pressed.
    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    /// Get the pointer movement delta since the previous event.
    pub fn pointer_delta(&self) -> Vec2 {
        self.pointer_position - self.previous_pointer_position
    }
}
