//! Line shape.

use super::{ElementError, ElementKind, ShapeTrait, is_finite_point, point_to_segment_dist};
use kurbo::{BezPath, Line as KurboLine, Point, Rect};
use serde::{Deserialize, Serialize};

/// Persisted form shared by lines and arrows: an explicit point list so that
/// payloads with the wrong number of points are rejected while decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SegmentPoints {
    pub points: Vec<Point>,
}

impl SegmentPoints {
    pub(crate) fn endpoints(self, kind: ElementKind) -> Result<(Point, Point), ElementError> {
        match self.points.as_slice() {
            [start, end] => Ok((*start, *end)),
            other => Err(ElementError::PointCount {
                kind,
                expected: 2,
                found: other.len(),
            }),
        }
    }
}

/// A straight segment between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SegmentPoints", into = "SegmentPoints")]
pub struct Line {
    pub start: Point,
    pub end: Point,
}

impl Line {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Get the line length.
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// Get as a kurbo Line.
    pub fn as_kurbo(&self) -> KurboLine {
        KurboLine::new(self.start, self.end)
    }
}

impl TryFrom<SegmentPoints> for Line {
    type Error = ElementError;

    fn try_from(value: SegmentPoints) -> Result<Self, Self::Error> {
        let (start, end) = value.endpoints(ElementKind::Line)?;
        Ok(Self::new(start, end))
    }
}

impl From<Line> for SegmentPoints {
    fn from(line: Line) -> Self {
        Self {
            points: vec![line.start, line.end],
        }
    }
}

impl ShapeTrait for Line {
    fn bounds(&self) -> Rect {
        Rect::from_points(self.start, self.end)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_segment_dist(point, self.start, self.end) <= tolerance
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        path.move_to(self.start);
        path.line_to(self.end);
        path
    }

    fn validate(&self) -> Result<(), ElementError> {
        if is_finite_point(self.start) && is_finite_point(self.end) {
            Ok(())
        } else {
            Err(ElementError::NonFinite(ElementKind::Line))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_test_on_line() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(line.hit_test(Point::new(50.0, 2.0), 5.0));
        assert!(!line.hit_test(Point::new(50.0, 20.0), 5.0));
    }

    #[test]
    fn test_hit_test_endpoints() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(line.hit_test(Point::new(-3.0, 0.0), 5.0));
        assert!(!line.hit_test(Point::new(110.0, 0.0), 5.0));
    }

    #[test]
    fn test_bounds() {
        let line = Line::new(Point::new(10.0, 20.0), Point::new(0.0, 5.0));
        assert_eq!(line.bounds(), Rect::new(0.0, 5.0, 10.0, 20.0));
        assert!((line.length() - (325.0f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_persisted_as_point_list() {
        let line = Line::new(Point::new(1.0, 2.0), Point::new(3.0, 4.0));
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["points"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_wrong_point_count_is_rejected() {
        let err = Line::try_from(SegmentPoints {
            points: vec![Point::ZERO],
        })
        .unwrap_err();
        assert_eq!(
            err,
            ElementError::PointCount {
                kind: ElementKind::Line,
                expected: 2,
                found: 1,
            }
        );
    }
}
