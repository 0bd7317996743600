//! Freehand drawing shape.

use super::{ElementError, ShapeTrait, is_finite_point, point_to_polyline_dist};
use kurbo::{BezPath, Point, Rect};
use serde::{Deserialize, Serialize};

/// A freehand stroke (series of points). Also used by the eraser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Freehand {
    /// Points in the freehand path.
    pub points: Vec<Point>,
}

impl Freehand {
    /// Create a stroke seeded with a single point.
    pub fn starting_at(point: Point) -> Self {
        Self {
            points: vec![point],
        }
    }

    /// Create from existing points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Add a point to the path.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl ShapeTrait for Freehand {
    fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .fold(Rect::from_points(*first, *first), |rect, p| {
                rect.union_pt(*p)
            })
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, &self.points) <= tolerance
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut points = self.points.iter();
        if let Some(first) = points.next() {
            path.move_to(*first);
            for point in points {
                path.line_to(*point);
            }
        }
        path
    }

    fn validate(&self) -> Result<(), ElementError> {
        if self.points.is_empty() {
            return Err(ElementError::EmptyPath);
        }
        if !self.points.iter().all(|p| is_finite_point(*p)) {
            return Err(ElementError::NonFinite(super::ElementKind::Freehand));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_points() {
        let mut freehand = Freehand::starting_at(Point::new(0.0, 0.0));
        freehand.add_point(Point::new(10.0, 10.0));
        assert_eq!(freehand.len(), 2);
        assert!(!freehand.is_empty());
    }

    #[test]
    fn test_bounds() {
        let freehand = Freehand::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 50.0),
            Point::new(50.0, 100.0),
        ]);

        let bounds = freehand.bounds();
        assert!((bounds.x0).abs() < f64::EPSILON);
        assert!((bounds.y0).abs() < f64::EPSILON);
        assert!((bounds.x1 - 100.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_test() {
        let freehand = Freehand::from_points(vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);

        assert!(freehand.hit_test(Point::new(50.0, 0.0), 5.0));
        assert!(!freehand.hit_test(Point::new(50.0, 20.0), 5.0));
    }

    #[test]
    fn test_single_point_is_a_dot() {
        let dot = Freehand::starting_at(Point::new(5.0, 5.0));
        assert!(dot.validate().is_ok());
        assert!(dot.hit_test(Point::new(6.0, 5.0), 2.0));
        assert_eq!(dot.bounds(), Rect::new(5.0, 5.0, 5.0, 5.0));
    }

    #[test]
    fn test_empty_is_invalid() {
        assert_eq!(Freehand::default().validate(), Err(ElementError::EmptyPath));
    }
}
