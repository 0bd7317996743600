//! Arrow shape.

use super::line::SegmentPoints;
use super::{ElementError, ElementKind, ShapeTrait, is_finite_point, point_to_segment_dist};
use kurbo::{BezPath, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Length of each arrow head segment, in screen pixels.
pub const ARROW_HEAD_LENGTH: f64 = 15.0;

/// Angle between each head segment and the reversed shaft.
pub const ARROW_HEAD_ANGLE: f64 = PI / 6.0;

/// The far ends of the two head segments that start at `end`.
///
/// Each segment is rotated ±[`ARROW_HEAD_ANGLE`] from the reversed shaft
/// direction and has the given length regardless of the shaft's length.
pub fn arrow_head(start: Point, end: Point, length: f64) -> [Point; 2] {
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let barb = |theta: f64| end - Vec2::from_angle(theta) * length;
    [barb(angle - ARROW_HEAD_ANGLE), barb(angle + ARROW_HEAD_ANGLE)]
}

/// A segment with a head at `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SegmentPoints", into = "SegmentPoints")]
pub struct Arrow {
    pub start: Point,
    pub end: Point,
}

impl Arrow {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Head segment end points in world units, using `length` world units.
    pub fn head(&self, length: f64) -> [Point; 2] {
        arrow_head(self.start, self.end, length)
    }
}

impl TryFrom<SegmentPoints> for Arrow {
    type Error = ElementError;

    fn try_from(value: SegmentPoints) -> Result<Self, Self::Error> {
        let (start, end) = value.endpoints(ElementKind::Arrow)?;
        Ok(Self::new(start, end))
    }
}

impl From<Arrow> for SegmentPoints {
    fn from(arrow: Arrow) -> Self {
        Self {
            points: vec![arrow.start, arrow.end],
        }
    }
}

impl ShapeTrait for Arrow {
    fn bounds(&self) -> Rect {
        let [left, right] = self.head(ARROW_HEAD_LENGTH);
        Rect::from_points(self.start, self.end)
            .union_pt(left)
            .union_pt(right)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        if point_to_segment_dist(point, self.start, self.end) <= tolerance {
            return true;
        }
        self.head(ARROW_HEAD_LENGTH)
            .iter()
            .any(|barb| point_to_segment_dist(point, self.end, *barb) <= tolerance)
    }

    fn to_path(&self) -> BezPath {
        let [left, right] = self.head(ARROW_HEAD_LENGTH);
        let mut path = BezPath::new();
        path.move_to(self.start);
        path.line_to(self.end);
        path.move_to(left);
        path.line_to(self.end);
        path.line_to(right);
        path
    }

    fn validate(&self) -> Result<(), ElementError> {
        if is_finite_point(self.start) && is_finite_point(self.end) {
            Ok(())
        } else {
            Err(ElementError::NonFinite(ElementKind::Arrow))
        }
    }
}
