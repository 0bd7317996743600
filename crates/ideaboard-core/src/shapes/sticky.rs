//! Sticky note shape.

use super::{ElementError, ElementKind, ShapeTrait, is_finite_point};
use kurbo::{BezPath, Point, Rect, Shape as KurboShape, Vec2};
use serde::{Deserialize, Serialize};

/// A square note with a fixed footprint and a short label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sticky {
    /// Top-left corner.
    pub anchor: Point,
    pub text: String,
}

impl Sticky {
    /// Side length of every sticky note, in world units.
    pub const SIZE: f64 = 150.0;

    /// Offset of the label baseline from the anchor.
    pub const TEXT_OFFSET: Vec2 = Vec2::new(10.0, 30.0);

    /// Label font size in world units.
    pub const FONT_SIZE: f64 = 14.0;

    pub fn new(anchor: Point, text: impl Into<String>) -> Self {
        Self {
            anchor,
            text: text.into(),
        }
    }

    pub fn frame(&self) -> Rect {
        Rect::from_origin_size(self.anchor, (Self::SIZE, Self::SIZE))
    }

    /// Baseline origin of the label.
    pub fn text_origin(&self) -> Point {
        self.anchor + Self::TEXT_OFFSET
    }
}

impl ShapeTrait for Sticky {
    fn bounds(&self) -> Rect {
        self.frame()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        // Notes are filled, so the whole square is a hit target.
        self.frame().inflate(tolerance, tolerance).contains(point)
    }

    fn to_path(&self) -> BezPath {
        self.frame().to_path(0.1)
    }

    fn validate(&self) -> Result<(), ElementError> {
        if is_finite_point(self.anchor) {
            Ok(())
        } else {
            Err(ElementError::NonFinite(ElementKind::Sticky))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_footprint() {
        let sticky = Sticky::new(Point::new(10.0, 20.0), "note");
        assert_eq!(sticky.bounds(), Rect::new(10.0, 20.0, 160.0, 170.0));
        assert_eq!(sticky.text_origin(), Point::new(20.0, 50.0));
    }

    #[test]
    fn test_hit_inside() {
        let sticky = Sticky::new(Point::ZERO, "");
        assert!(sticky.hit_test(Point::new(75.0, 75.0), 0.0));
        assert!(!sticky.hit_test(Point::new(200.0, 75.0), 0.0));
        assert!(sticky.validate().is_ok());
    }
}
