//! Element definitions for the whiteboard.

mod arrow;
mod ellipse;
mod freehand;
mod line;
mod rectangle;
mod sticky;
mod text;

pub use arrow::{ARROW_HEAD_ANGLE, ARROW_HEAD_LENGTH, Arrow, arrow_head};
pub use ellipse::Ellipse;
pub use freehand::Freehand;
pub use line::Line;
pub use rectangle::Rectangle;
pub use sticky::Sticky;
pub use text::Text;

use kurbo::{BezPath, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Identifier of a collaboration participant.
pub type ParticipantId = String;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => {
                let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Default drawing color (`#00d4aa`).
pub const DEFAULT_COLOR: SerializableColor = SerializableColor::rgb(0x00, 0xd4, 0xaa);

/// Default stroke width in world units.
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;

/// Style properties shared by every element kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementStyle {
    /// Stroke (and text) color.
    pub color: SerializableColor,
    /// Stroke width in world units.
    pub stroke_width: f64,
}

impl ElementStyle {
    pub fn new(color: SerializableColor, stroke_width: f64) -> Self {
        Self { color, stroke_width }
    }

    /// Get the color as a peniko Color.
    pub fn color(&self) -> Color {
        self.color.into()
    }
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR,
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

/// Discriminant of [`Shape`], used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Freehand,
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Sticky,
    Text,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Freehand => "freehand",
            ElementKind::Rectangle => "rectangle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Line => "line",
            ElementKind::Arrow => "arrow",
            ElementKind::Sticky => "sticky",
            ElementKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Element validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElementError {
    #[error("freehand path has no points")]
    EmptyPath,
    #[error("{kind} requires exactly {expected} points, found {found}")]
    PointCount {
        kind: ElementKind,
        expected: usize,
        found: usize,
    },
    #[error("{0} has a non-finite coordinate")]
    NonFinite(ElementKind),
    #[error("stroke width must be positive and finite, got {0}")]
    StrokeWidth(f64),
    #[error("{0} text is empty")]
    EmptyText(ElementKind),
    #[error("font size must be positive and finite, got {0}")]
    FontSize(f64),
}

pub(crate) fn is_finite_point(point: Point) -> bool {
    point.x.is_finite() && point.y.is_finite()
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = kurbo::Vec2::new(b.x - a.x, b.y - a.y);
    let pv = kurbo::Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => point.distance(*only),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Geometry behaviour common to all element kinds.
pub trait ShapeTrait {
    /// Get the bounding box in world coordinates.
    fn bounds(&self) -> Rect;

    /// Check if a point (in world coordinates) hits this shape.
    ///
    /// `tolerance` already includes half the stroke width.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Get the path representation for rendering.
    fn to_path(&self) -> BezPath;

    /// Check the geometry invariants of this kind.
    fn validate(&self) -> Result<(), ElementError>;
}

/// Geometry payload of an element, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Freehand(Freehand),
    Rectangle(Rectangle),
    Ellipse(Ellipse),
    Line(Line),
    Arrow(Arrow),
    Sticky(Sticky),
    Text(Text),
}

impl Shape {
    pub fn kind(&self) -> ElementKind {
        match self {
            Shape::Freehand(_) => ElementKind::Freehand,
            Shape::Rectangle(_) => ElementKind::Rectangle,
            Shape::Ellipse(_) => ElementKind::Ellipse,
            Shape::Line(_) => ElementKind::Line,
            Shape::Arrow(_) => ElementKind::Arrow,
            Shape::Sticky(_) => ElementKind::Sticky,
            Shape::Text(_) => ElementKind::Text,
        }
    }

    fn as_trait(&self) -> &dyn ShapeTrait {
        match self {
            Shape::Freehand(s) => s,
            Shape::Rectangle(s) => s,
            Shape::Ellipse(s) => s,
            Shape::Line(s) => s,
            Shape::Arrow(s) => s,
            Shape::Sticky(s) => s,
            Shape::Text(s) => s,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.as_trait().bounds()
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.as_trait().hit_test(point, tolerance)
    }

    pub fn to_path(&self) -> BezPath {
        self.as_trait().to_path()
    }

    pub fn validate(&self) -> Result<(), ElementError> {
        self.as_trait().validate()
    }

    /// Copy with a non-negative box for Rectangle and Ellipse; other kinds unchanged.
    pub fn normalized(&self) -> Shape {
        match self {
            Shape::Rectangle(r) => Shape::Rectangle(r.normalized()),
            Shape::Ellipse(e) => Shape::Ellipse(e.normalized()),
            other => other.clone(),
        }
    }
}

/// A committed drawable item of the scene.
///
/// `version` and `author` describe the last operation that wrote the element
/// and are not part of the persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub shape: Shape,
    pub style: ElementStyle,
    #[serde(skip)]
    pub version: u64,
    #[serde(skip)]
    pub author: Option<ParticipantId>,
}

impl Element {
    /// Create a new element with a fresh id.
    pub fn new(shape: Shape, style: ElementStyle) -> Self {
        Self::with_id(Uuid::new_v4(), shape, style)
    }

    pub fn with_id(id: ElementId, shape: Shape, style: ElementStyle) -> Self {
        Self {
            id,
            shape,
            style,
            version: 0,
            author: None,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.shape.kind()
    }

    pub fn bounds(&self) -> Rect {
        let half = self.style.stroke_width / 2.0;
        self.shape.bounds().inflate(half, half)
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.shape
            .hit_test(point, tolerance + self.style.stroke_width / 2.0)
    }

    pub fn validate(&self) -> Result<(), ElementError> {
        let width = self.style.stroke_width;
        if !width.is_finite() || width <= 0.0 {
            return Err(ElementError::StrokeWidth(width));
        }
        self.shape.validate()
    }

    /// Whether two elements carry the same geometry and style, ignoring
    /// version metadata.
    pub fn same_content(&self, other: &Element) -> bool {
        self.id == other.id && self.shape == other.shape && self.style == other.style
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_round_trip() {
        let color = SerializableColor::from_hex("#00d4aa").unwrap();
        assert_eq!(color, DEFAULT_COLOR);
        assert_eq!(color.to_hex(), "#00d4aa");

        let translucent = color.with_alpha(0x40);
        assert_eq!(translucent.to_hex(), "#00d4aa40");
        assert_eq!(SerializableColor::from_hex("#00d4aa40"), Some(translucent));
    }

    #[test]
    fn test_color_hex_short_and_invalid() {
        assert_eq!(
            SerializableColor::from_hex("#fff"),
            Some(SerializableColor::white())
        );
        assert_eq!(SerializableColor::from_hex("#12345"), None);
        assert_eq!(SerializableColor::from_hex("zzzzzz"), None);
        assert_eq!(SerializableColor::from_hex("#ééé"), None);
    }

    #[test]
    fn test_point_to_polyline_single_point() {
        let d = point_to_polyline_dist(Point::new(3.0, 4.0), &[Point::ZERO]);
        assert!((d - 5.0).abs() < 1e-9);
        assert!(point_to_polyline_dist(Point::ZERO, &[]).is_infinite());
    }

    #[test]
    fn test_shape_json_is_tagged_by_kind() {
        let shape = Shape::Rectangle(Rectangle::new(Point::new(1.0, 2.0), 3.0, 4.0));
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["kind"], "rectangle");
        assert_eq!(json["width"], 3.0);

        let back: Shape = serde_json::from_value(json).unwrap();
        assert_eq!(back, shape);
    }

    #[test]
    fn test_line_rejects_wrong_point_count() {
        let json = r#"{"kind":"line","points":[{"x":0.0,"y":0.0},{"x":1.0,"y":1.0},{"x":2.0,"y":2.0}]}"#;
        assert!(serde_json::from_str::<Shape>(json).is_err());

        let json = r#"{"kind":"arrow","points":[{"x":0.0,"y":0.0},{"x":1.0,"y":1.0}]}"#;
        let shape: Shape = serde_json::from_str(json).unwrap();
        assert_eq!(shape.kind(), ElementKind::Arrow);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{"kind":"hexagon","points":[]}"#;
        assert!(serde_json::from_str::<Shape>(json).is_err());
    }

    #[test]
    fn test_element_serialization_skips_version() {
        let mut element = Element::new(
            Shape::Freehand(Freehand::from_points(vec![Point::new(1.0, 1.0)])),
            ElementStyle::default(),
        );
        element.version = 7;
        element.author = Some("alice".to_string());

        let json = serde_json::to_string(&element).unwrap();
        assert!(!json.contains("version"));
        assert!(!json.contains("alice"));

        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, 0);
        assert!(back.same_content(&element));
    }

    #[test]
    fn test_element_validation() {
        let good = Element::new(
            Shape::Line(Line::new(Point::ZERO, Point::new(10.0, 0.0))),
            ElementStyle::default(),
        );
        assert!(good.validate().is_ok());

        let thin = Element::new(good.shape.clone(), ElementStyle::new(DEFAULT_COLOR, 0.0));
        assert_eq!(thin.validate(), Err(ElementError::StrokeWidth(0.0)));

        let empty = Element::new(
            Shape::Freehand(Freehand::default()),
            ElementStyle::default(),
        );
        assert_eq!(empty.validate(), Err(ElementError::EmptyPath));

        let nan = Element::new(
            Shape::Line(Line::new(Point::new(f64::NAN, 0.0), Point::ZERO)),
            ElementStyle::default(),
        );
        assert_eq!(
            nan.validate(),
            Err(ElementError::NonFinite(ElementKind::Line))
        );
    }

    #[test]
    fn test_element_hit_test_includes_stroke() {
        let element = Element::new(
            Shape::Line(Line::new(Point::ZERO, Point::new(100.0, 0.0))),
            ElementStyle::new(DEFAULT_COLOR, 10.0),
        );
        assert!(element.hit_test(Point::new(50.0, 4.0), 0.0));
        assert!(!element.hit_test(Point::new(50.0, 6.0), 0.0));
    }
}
