//! Single-line text shape.

use super::{ElementError, ElementKind, ShapeTrait, is_finite_point};
use kurbo::{BezPath, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// A single line of text whose anchor sits on the baseline at the left edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub anchor: Point,
    pub content: String,
    /// Font size in world units.
    pub font_size: f64,
}

impl Text {
    /// Font size relative to the stroke width the text was created with.
    pub const FONT_SCALE: f64 = 6.0;

    /// Horizontal advance of one glyph cell, in ems.
    pub const ADVANCE: f64 = 0.6;

    /// Portion of an em below the baseline.
    pub const DESCENT: f64 = 0.25;

    pub fn new(anchor: Point, content: impl Into<String>, font_size: f64) -> Self {
        Self {
            anchor,
            content: content.into(),
            font_size,
        }
    }

    /// Text sized for the current stroke width.
    pub fn with_stroke_width(anchor: Point, content: impl Into<String>, stroke_width: f64) -> Self {
        Self::new(anchor, content, stroke_width * Self::FONT_SCALE)
    }

    /// Approximate laid-out width using fixed glyph cells.
    pub fn approximate_width(&self) -> f64 {
        self.content.chars().count() as f64 * self.font_size * Self::ADVANCE
    }
}

impl ShapeTrait for Text {
    fn bounds(&self) -> Rect {
        Rect::new(
            self.anchor.x,
            self.anchor.y - self.font_size,
            self.anchor.x + self.approximate_width(),
            self.anchor.y + self.font_size * Self::DESCENT,
        )
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    fn to_path(&self) -> BezPath {
        // Text has no outline; the bounding box stands in for hit regions.
        self.bounds().to_path(0.1)
    }

    fn validate(&self) -> Result<(), ElementError> {
        if self.content.trim().is_empty() {
            return Err(ElementError::EmptyText(ElementKind::Text));
        }
        if !is_finite_point(self.anchor) {
            return Err(ElementError::NonFinite(ElementKind::Text));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(ElementError::FontSize(self.font_size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_size_follows_stroke_width() {
        let text = Text::with_stroke_width(Point::ZERO, "hi", 3.0);
        assert_eq!(text.font_size, 18.0);
    }

    #[test]
    fn test_bounds_sit_on_baseline() {
        let text = Text::new(Point::new(10.0, 100.0), "abcd", 20.0);
        let bounds = text.bounds();
        assert_eq!(bounds.x0, 10.0);
        assert_eq!(bounds.y0, 80.0);
        assert!((bounds.x1 - 58.0).abs() < 1e-9);
        assert_eq!(bounds.y1, 105.0);
        assert!(text.hit_test(Point::new(20.0, 90.0), 0.0));
    }

    #[test]
    fn test_blank_text_is_invalid() {
        let text = Text::new(Point::ZERO, "   ", 18.0);
        assert_eq!(
            text.validate(),
            Err(ElementError::EmptyText(ElementKind::Text))
        );
    }

    #[test]
    fn test_invalid_font_size() {
        let text = Text::new(Point::ZERO, "x", 0.0);
        assert_eq!(text.validate(), Err(ElementError::FontSize(0.0)));
    }
}
