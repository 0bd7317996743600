//! Whiteboard viewport.
//!
//! The camera never touches scene data. It maps world space to the screen
//! for rendering, and the screen back to world space for pointer input.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom level shown as "100%".
pub const BASE_ZOOM: f64 = 1.0;

/// Smallest zoom (25%).
pub const MIN_ZOOM: f64 = 0.25;

/// Largest zoom (200%).
pub const MAX_ZOOM: f64 = 2.0;

/// Increment used by the zoom in/out commands (25%).
pub const ZOOM_STEP: f64 = 0.25;

/// Pan offset and zoom of the board.
///
/// `screen = world * zoom + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Screen position of the world origin, in pixels.
    pub offset: Vec2,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: BASE_ZOOM,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// World → screen.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.zoom).then_translate(self.offset)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        ((screen_point.to_vec2() - self.offset) / self.zoom).to_point()
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        (world_point.to_vec2() * self.zoom + self.offset).to_point()
    }

    /// Part of the board visible through a viewport of `viewport` pixels.
    pub fn visible_world_rect(&self, viewport: Size) -> Rect {
        Rect::from_points(
            self.screen_to_world(Point::ZERO),
            self.screen_to_world(viewport.to_vec2().to_point()),
        )
    }

    /// Zoom as a whole percentage, as shown in the toolbar.
    pub fn zoom_percent(&self) -> u32 {
        (self.zoom / BASE_ZOOM * 100.0).round() as u32
    }

    /// Move the board by a screen-space delta.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Change the zoom within bounds, keeping the board point under
    /// `anchor` where it is on screen.
    pub fn set_zoom_at(&mut self, anchor: Point, zoom: f64) {
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let pinned = self.screen_to_world(anchor);
        self.zoom = zoom;
        self.offset = anchor.to_vec2() - pinned.to_vec2() * zoom;
    }

    /// Scale the zoom by `factor` around `anchor` (scroll wheel).
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        self.set_zoom_at(anchor, self.zoom * factor);
    }

    pub fn zoom_in(&mut self, anchor: Point) {
        self.set_zoom_at(anchor, self.zoom + ZOOM_STEP * BASE_ZOOM);
    }

    pub fn zoom_out(&mut self, anchor: Point) {
        self.set_zoom_at(anchor, self.zoom - ZOOM_STEP * BASE_ZOOM);
    }

    /// Back to the origin at 100%.
    pub fn reset(&mut self) {
        *self = Self {
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            ..Self::default()
        };
    }

    /// Frame `bounds` in the middle of the viewport, leaving `padding`
    /// pixels on every side when the zoom bounds allow it.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }
        let room = Size::new(
            (viewport.width - 2.0 * padding).max(1.0),
            (viewport.height - 2.0 * padding).max(1.0),
        );
        self.zoom = (room.width / bounds.width())
            .min(room.height / bounds.height())
            .clamp(self.min_zoom, self.max_zoom);
        let viewport_center = (viewport.to_vec2() / 2.0).to_point();
        self.offset = viewport_center.to_vec2() - bounds.center().to_vec2() * self.zoom;
    }
}
