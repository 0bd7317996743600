//! Tool system for the whiteboard.
//!
//! [`ToolManager`] turns world-space pointer input into a transient element
//! and, on release, into an element ready to commit. It never touches the
//! scene itself; the board applies whatever [`ToolOutcome`] it returns.

use crate::shapes::{
    Arrow, DEFAULT_STROKE_WIDTH, Element, ElementStyle, Ellipse, Freehand, Line, Rectangle,
    SerializableColor, Shape, Sticky, Text,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Default label of a new sticky note.
pub const DEFAULT_STICKY_TEXT: &str = "New note";

/// Default eraser width relative to the current stroke width.
pub const DEFAULT_ERASER_SCALE: f64 = 3.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Freehand,
    Eraser,
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Sticky,
    Text,
    Pan,
}

/// How the eraser affects the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraserMode {
    /// Commit a stroke painted in the background color.
    #[default]
    Overdraw,
    /// Delete every element the eraser path touches.
    Delete,
}

/// State of a tool interaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolState {
    /// Tool is idle, waiting for interaction.
    #[default]
    Idle,
    /// A drag is in progress; `transient` is drawn live but not in the scene.
    Drawing { transient: Element },
    /// A text anchor was placed and the UI is collecting the string.
    AwaitingTextInput { anchor: Point },
}

/// What the board should do after an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Nothing to apply.
    None,
    /// Insert this element into the scene.
    Commit(Element),
    /// Delete the elements hit by a stroke through `path` of the given radius.
    Erase { path: Vec<Point>, radius: f64 },
    /// The drawing was abandoned or failed validation.
    Discarded,
}

/// Manages the current tool and its state.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    current_tool: ToolKind,
    /// Current state of the tool.
    state: ToolState,
    /// Current style to apply to new elements.
    pub current_style: ElementStyle,
    /// Color painted by the eraser in overdraw mode.
    pub background: SerializableColor,
    pub eraser_mode: EraserMode,
    /// Eraser width as a multiple of the current stroke width.
    pub eraser_scale: f64,
    pub sticky_text: String,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self {
            current_tool: ToolKind::default(),
            state: ToolState::default(),
            current_style: ElementStyle::default(),
            background: SerializableColor::black(),
            eraser_mode: EraserMode::default(),
            eraser_scale: DEFAULT_ERASER_SCALE,
            sticky_text: DEFAULT_STICKY_TEXT.to_string(),
        }
    }
}

impl ToolManager {
    /// Create a new tool manager.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tool(&self) -> ToolKind {
        self.current_tool
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, ToolState::Drawing { .. })
    }

    pub fn is_awaiting_text(&self) -> bool {
        matches!(self.state, ToolState::AwaitingTextInput { .. })
    }

    /// The element being drawn, if any.
    pub fn transient(&self) -> Option<&Element> {
        match &self.state {
            ToolState::Drawing { transient } => Some(transient),
            _ => None,
        }
    }

    /// Set the current tool. Refused while text input is pending.
    ///
    /// Switching mid-drag discards the drag.
    pub fn set_tool(&mut self, tool: ToolKind) -> bool {
        if self.is_awaiting_text() {
            log::debug!("Tool change to {tool:?} ignored while awaiting text");
            return false;
        }
        self.current_tool = tool;
        self.state = ToolState::Idle;
        true
    }

    pub fn set_color(&mut self, color: SerializableColor) {
        self.current_style.color = color;
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        self.current_style.stroke_width = if width.is_finite() && width > 0.0 {
            width
        } else {
            DEFAULT_STROKE_WIDTH
        };
    }

    fn eraser_style(&self) -> ElementStyle {
        ElementStyle::new(
            self.background,
            self.current_style.stroke_width * self.eraser_scale,
        )
    }

    /// Primary button pressed at `point` (world coordinates).
    pub fn pointer_down(&mut self, point: Point) -> ToolOutcome {
        if !matches!(self.state, ToolState::Idle) {
            return ToolOutcome::None;
        }
        let style = self.current_style;
        let (shape, style) = match self.current_tool {
            ToolKind::Freehand => (Shape::Freehand(Freehand::starting_at(point)), style),
            ToolKind::Eraser => (
                Shape::Freehand(Freehand::starting_at(point)),
                self.eraser_style(),
            ),
            ToolKind::Rectangle => (Shape::Rectangle(Rectangle::new(point, 0.0, 0.0)), style),
            ToolKind::Ellipse => (Shape::Ellipse(Ellipse::new(point, 0.0, 0.0)), style),
            ToolKind::Line => (Shape::Line(Line::new(point, point)), style),
            ToolKind::Arrow => (Shape::Arrow(Arrow::new(point, point)), style),
            ToolKind::Sticky => {
                let sticky = Sticky::new(point, self.sticky_text.clone());
                return ToolOutcome::Commit(Element::new(Shape::Sticky(sticky), style));
            }
            ToolKind::Text => {
                self.state = ToolState::AwaitingTextInput { anchor: point };
                return ToolOutcome::None;
            }
            ToolKind::Pan => return ToolOutcome::None,
        };
        self.state = ToolState::Drawing {
            transient: Element::new(shape, style),
        };
        ToolOutcome::None
    }

    /// Pointer moved to `point` (world coordinates).
    pub fn pointer_move(&mut self, point: Point) {
        let ToolState::Drawing { transient } = &mut self.state else {
            return;
        };
        match &mut transient.shape {
            Shape::Freehand(freehand) => freehand.add_point(point),
            Shape::Rectangle(rect) => rect.drag_to(point),
            Shape::Ellipse(ellipse) => ellipse.drag_to(point),
            Shape::Line(line) => line.end = point,
            Shape::Arrow(arrow) => arrow.end = point,
            Shape::Sticky(_) | Shape::Text(_) => {}
        }
    }

    /// Primary button released. The release position itself adds no geometry.
    pub fn pointer_up(&mut self) -> ToolOutcome {
        if !self.is_drawing() {
            return ToolOutcome::None;
        }
        let ToolState::Drawing { transient } = std::mem::take(&mut self.state) else {
            return ToolOutcome::None;
        };

        let mut element = transient;
        element.shape = element.shape.normalized();

        if self.current_tool == ToolKind::Eraser && self.eraser_mode == EraserMode::Delete {
            if let Shape::Freehand(freehand) = element.shape {
                return ToolOutcome::Erase {
                    path: freehand.points,
                    radius: element.style.stroke_width / 2.0,
                };
            }
        }

        match element.validate() {
            Ok(()) => ToolOutcome::Commit(element),
            Err(e) => {
                log::debug!("Discarding invalid {}: {e}", element.kind());
                ToolOutcome::Discarded
            }
        }
    }

    /// The pointer left the canvas: an in-progress drawing is dropped.
    pub fn pointer_leave(&mut self) -> ToolOutcome {
        if self.is_drawing() {
            self.state = ToolState::Idle;
            ToolOutcome::Discarded
        } else {
            ToolOutcome::None
        }
    }

    /// Finish pending text input. Blank text commits nothing.
    pub fn submit_text(&mut self, text: &str) -> ToolOutcome {
        let ToolState::AwaitingTextInput { anchor } = self.state else {
            return ToolOutcome::None;
        };
        self.state = ToolState::Idle;
        if text.trim().is_empty() {
            return ToolOutcome::Discarded;
        }
        let shape = Text::with_stroke_width(anchor, text, self.current_style.stroke_width);
        ToolOutcome::Commit(Element::new(Shape::Text(shape), self.current_style))
    }

    /// Abandon pending text input.
    pub fn cancel_text(&mut self) -> bool {
        if self.is_awaiting_text() {
            self.state = ToolState::Idle;
            true
        } else {
            false
        }
    }

    /// Abandon whatever is in progress (Escape).
    pub fn cancel(&mut self) -> bool {
        let active = !matches!(self.state, ToolState::Idle);
        self.state = ToolState::Idle;
        active
    }
}
