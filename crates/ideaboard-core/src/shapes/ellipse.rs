//! Ellipse shape.

use super::ShapeTrait;
use super::rectangle::{normalize_box, validate_box};
use super::{ElementError, ElementKind};
use kurbo::{BezPath, Ellipse as KurboEllipse, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// An ellipse inscribed in the box spanned by `anchor` and the signed extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub anchor: Point,
    pub width: f64,
    pub height: f64,
}

impl Ellipse {
    pub fn new(anchor: Point, width: f64, height: f64) -> Self {
        Self {
            anchor,
            width,
            height,
        }
    }

    pub fn drag_to(&mut self, corner: Point) {
        self.width = corner.x - self.anchor.x;
        self.height = corner.y - self.anchor.y;
    }

    pub fn normalized(&self) -> Self {
        let (anchor, width, height) = normalize_box(self.anchor, self.width, self.height);
        Self::new(anchor, width, height)
    }

    /// The bounding box of the ellipse.
    pub fn frame(&self) -> Rect {
        Rect::new(
            self.anchor.x,
            self.anchor.y,
            self.anchor.x + self.width,
            self.anchor.y + self.height,
        )
        .abs()
    }

    pub fn center(&self) -> Point {
        self.frame().center()
    }

    pub fn radii(&self) -> (f64, f64) {
        let frame = self.frame();
        (frame.width() / 2.0, frame.height() / 2.0)
    }

    /// Get as a kurbo Ellipse.
    pub fn as_kurbo(&self) -> KurboEllipse {
        KurboEllipse::from_rect(self.frame())
    }
}

impl ShapeTrait for Ellipse {
    fn bounds(&self) -> Rect {
        self.frame()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let center = self.center();
        let (radius_x, radius_y) = self.radii();
        let dx_outer = (point.x - center.x) / (radius_x + tolerance);
        let dy_outer = (point.y - center.y) / (radius_y + tolerance);
        if dx_outer * dx_outer + dy_outer * dy_outer > 1.0 {
            return false;
        }
        // Outline only: reject if inside inner ellipse
        let inner_rx = (radius_x - tolerance).max(0.0);
        let inner_ry = (radius_y - tolerance).max(0.0);
        if inner_rx < f64::EPSILON || inner_ry < f64::EPSILON {
            return true;
        }
        let dx_inner = (point.x - center.x) / inner_rx;
        let dy_inner = (point.y - center.y) / inner_ry;
        dx_inner * dx_inner + dy_inner * dy_inner > 1.0
    }

    fn to_path(&self) -> BezPath {
        self.as_kurbo().to_path(0.1)
    }

    fn validate(&self) -> Result<(), ElementError> {
        validate_box(ElementKind::Ellipse, self.anchor, self.width, self.height)
    }
}
