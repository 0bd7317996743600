//! Renderer trait abstraction.

use ideaboard_core::Whiteboard;
use ideaboard_core::camera::Camera;
use ideaboard_core::collaboration::CollaboratorCursor;
use ideaboard_core::config::{BoardConfig, ConfigError, DEFAULT_BACKGROUND, DEFAULT_GRID_SIZE};
use ideaboard_core::scene::{Scene, SceneError};
use ideaboard_core::shapes::{ARROW_HEAD_LENGTH, Element, SerializableColor};
use ideaboard_core::storage::StorageError;
use kurbo::Size;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid target size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Grid display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    /// No grid.
    None,
    /// Full grid lines.
    #[default]
    Lines,
    /// Only dots at the intersections.
    Dots,
}

impl GridStyle {
    /// Lines when visible, nothing otherwise.
    pub fn from_visibility(visible: bool) -> Self {
        if visible { GridStyle::Lines } else { GridStyle::None }
    }
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    /// Target size in pixels.
    pub viewport_size: Size,
    pub background_color: SerializableColor,
    pub grid_style: GridStyle,
    /// Grid spacing in world units.
    pub grid_size: f64,
    /// In-progress drawing, drawn above the scene.
    pub transient: Option<&'a Element>,
    pub cursors: Vec<CollaboratorCursor>,
    /// Arrow head length in screen pixels.
    pub arrow_head_length: f64,
}

impl<'a> RenderContext<'a> {
    pub fn new(scene: &'a Scene, camera: &'a Camera, viewport_size: Size) -> Self {
        Self {
            scene,
            camera,
            viewport_size,
            background_color: DEFAULT_BACKGROUND,
            grid_style: GridStyle::Lines,
            grid_size: DEFAULT_GRID_SIZE,
            transient: None,
            cursors: Vec::new(),
            arrow_head_length: ARROW_HEAD_LENGTH,
        }
    }

    /// Frame for a live board: its scene, viewport, drawing and peers.
    pub fn for_board(board: &'a Whiteboard) -> Self {
        Self::new(board.scene(), &board.camera, board.viewport())
            .with_config(board.config())
            .with_transient(board.transient())
            .with_cursors(board.collaborator_cursors())
    }

    /// Apply the drawing settings of a board config.
    pub fn with_config(mut self, config: &BoardConfig) -> Self {
        self.background_color = config.background_color;
        self.grid_style = GridStyle::from_visibility(config.show_grid);
        self.grid_size = config.grid_size;
        self.arrow_head_length = config.arrow_head_length;
        self
    }

    pub fn with_background(mut self, color: SerializableColor) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_grid(mut self, style: GridStyle) -> Self {
        self.grid_style = style;
        self
    }

    pub fn with_transient(mut self, transient: Option<&'a Element>) -> Self {
        self.transient = transient;
        self
    }

    pub fn with_cursors(mut self, cursors: Vec<CollaboratorCursor>) -> Self {
        self.cursors = cursors;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// What a finished frame looks like for this backend.
    type Output;

    /// Draw one frame. Rendering the same context twice gives the same output.
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<Self::Output>;
}
