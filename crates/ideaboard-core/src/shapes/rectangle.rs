//! Rectangle shape.

use super::{ElementError, ElementKind, ShapeTrait, is_finite_point};
use kurbo::{BezPath, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle outline.
///
/// While drawing, `width` and `height` may be negative (the pointer moved up
/// or left of the anchor). [`Rectangle::normalized`] fixes that at commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Corner where the drag started.
    pub anchor: Point,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    pub fn new(anchor: Point, width: f64, height: f64) -> Self {
        Self {
            anchor,
            width,
            height,
        }
    }

    /// Set the extent so the opposite corner lands on `corner`.
    pub fn drag_to(&mut self, corner: Point) {
        self.width = corner.x - self.anchor.x;
        self.height = corner.y - self.anchor.y;
    }

    /// Copy with the anchor at the top-left and a non-negative extent.
    pub fn normalized(&self) -> Self {
        let (anchor, width, height) = normalize_box(self.anchor, self.width, self.height);
        Self::new(anchor, width, height)
    }

    /// Get the rectangle as a kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        Rect::new(
            self.anchor.x,
            self.anchor.y,
            self.anchor.x + self.width,
            self.anchor.y + self.height,
        )
        .abs()
    }
}

/// `{x=min(ax,ax+w), y=min(ay,ay+h), w=|w|, h=|h|}`
pub(crate) fn normalize_box(anchor: Point, width: f64, height: f64) -> (Point, f64, f64) {
    (
        Point::new(anchor.x.min(anchor.x + width), anchor.y.min(anchor.y + height)),
        width.abs(),
        height.abs(),
    )
}

pub(crate) fn validate_box(
    kind: ElementKind,
    anchor: Point,
    width: f64,
    height: f64,
) -> Result<(), ElementError> {
    if is_finite_point(anchor) && width.is_finite() && height.is_finite() {
        Ok(())
    } else {
        Err(ElementError::NonFinite(kind))
    }
}

impl ShapeTrait for Rectangle {
    fn bounds(&self) -> Rect {
        self.as_rect()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        // Outline only: hit on the border
        let rect = self.as_rect();
        let outer = rect.inflate(tolerance, tolerance);
        let inner = rect.inflate(-tolerance, -tolerance);
        let inside_inner = inner.width() > 0.0 && inner.height() > 0.0 && inner.contains(point);
        outer.contains(point) && !inside_inner
    }

    fn to_path(&self) -> BezPath {
        self.as_rect().to_path(0.1)
    }

    fn validate(&self) -> Result<(), ElementError> {
        validate_box(ElementKind::Rectangle, self.anchor, self.width, self.height)
    }
}
