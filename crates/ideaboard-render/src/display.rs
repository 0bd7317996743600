//! Frame description as a flat list of screen-space draw commands.
//!
//! Building the list is pure: it reads the context and allocates, nothing
//! else. Backends only have to know how to fill, stroke and place text.

use crate::renderer::{GridStyle, RenderContext};
use ideaboard_core::collaboration::CollaboratorCursor;
use ideaboard_core::shapes::{
    Element, ElementId, ParticipantId, SerializableColor, Shape, Sticky, arrow_head,
};
use kurbo::{Affine, BezPath, Circle, Point, Rect, Shape as KurboShape};
use peniko::Fill;

/// Grid line color: white at 5% opacity.
pub const GRID_COLOR: SerializableColor = SerializableColor::new(255, 255, 255, 13);

/// Cursor color for peers whose color does not parse.
pub const FALLBACK_CURSOR_COLOR: SerializableColor = SerializableColor::rgb(59, 130, 246);

/// Opacity of a sticky note's body.
const STICKY_FILL_ALPHA: u8 = 0x40;

/// Grids denser than this many pixels per cell are skipped.
const MIN_GRID_SPACING: f64 = 4.0;

const CURSOR_LABEL_SIZE: f64 = 12.0;

/// Where a draw command comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Background,
    Grid,
    Element(ElementId),
    Transient,
    Cursor(ParticipantId),
}

/// A single screen-space drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Fill {
        path: BezPath,
        color: SerializableColor,
        rule: Fill,
    },
    Stroke {
        path: BezPath,
        color: SerializableColor,
        width: f64,
    },
    /// A single line of text with its baseline starting at `origin`.
    Text {
        origin: Point,
        content: String,
        size: f64,
        color: SerializableColor,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub layer: Layer,
    pub command: DrawCommand,
}

/// Ordered draw commands for one frame, back to front.
pub type DisplayList = Vec<DrawItem>;

/// Describe a frame: background, grid, committed elements in scene order,
/// the transient element, then remote cursors.
pub fn build_display_list(ctx: &RenderContext) -> DisplayList {
    let mut list = Vec::new();
    let viewport = Rect::from_origin_size(Point::ZERO, ctx.viewport_size);

    list.push(DrawItem {
        layer: Layer::Background,
        command: DrawCommand::Fill {
            path: viewport.to_path(0.1),
            color: ctx.background_color,
            rule: Fill::NonZero,
        },
    });

    if let Some(command) = grid_command(ctx) {
        list.push(DrawItem {
            layer: Layer::Grid,
            command,
        });
    }

    let transform = ctx.camera.transform();
    let zoom = ctx.camera.zoom;
    for element in ctx.scene.iter() {
        let layer = Layer::Element(element.id);
        list.extend(
            element_commands(element, transform, zoom, ctx.arrow_head_length)
                .into_iter()
                .map(|command| DrawItem {
                    layer: layer.clone(),
                    command,
                }),
        );
    }

    if let Some(transient) = ctx.transient {
        list.extend(
            element_commands(transient, transform, zoom, ctx.arrow_head_length)
                .into_iter()
                .map(|command| DrawItem {
                    layer: Layer::Transient,
                    command,
                }),
        );
    }

    for cursor in &ctx.cursors {
        let layer = Layer::Cursor(cursor.participant_id.clone());
        let screen = ctx.camera.world_to_screen(cursor.position);
        list.extend(cursor_commands(cursor, screen).into_iter().map(|command| DrawItem {
            layer: layer.clone(),
            command,
        }));
    }

    list
}

fn grid_command(ctx: &RenderContext) -> Option<DrawCommand> {
    let grid_size = ctx.grid_size;
    if ctx.grid_style == GridStyle::None || grid_size * ctx.camera.zoom < MIN_GRID_SPACING {
        return None;
    }
    let world = ctx.camera.visible_world_rect(ctx.viewport_size);
    let start_x = (world.x0 / grid_size).floor() * grid_size;
    let start_y = (world.y0 / grid_size).floor() * grid_size;
    let end_x = (world.x1 / grid_size).ceil() * grid_size;
    let end_y = (world.y1 / grid_size).ceil() * grid_size;
    let to_screen = |x: f64, y: f64| ctx.camera.world_to_screen(Point::new(x, y));

    let mut path = BezPath::new();
    match ctx.grid_style {
        GridStyle::None => return None,
        GridStyle::Lines => {
            let mut x = start_x;
            while x <= end_x {
                path.move_to(to_screen(x, start_y));
                path.line_to(to_screen(x, end_y));
                x += grid_size;
            }
            let mut y = start_y;
            while y <= end_y {
                path.move_to(to_screen(start_x, y));
                path.line_to(to_screen(end_x, y));
                y += grid_size;
            }
            Some(DrawCommand::Stroke {
                path,
                color: GRID_COLOR,
                width: 1.0,
            })
        }
        GridStyle::Dots => {
            let mut x = start_x;
            while x <= end_x {
                let mut y = start_y;
                while y <= end_y {
                    let center = to_screen(x, y);
                    path.extend(Rect::from_center_size(center, (2.0, 2.0)).path_elements(0.1));
                    y += grid_size;
                }
                x += grid_size;
            }
            Some(DrawCommand::Fill {
                path,
                color: GRID_COLOR,
                rule: Fill::NonZero,
            })
        }
    }
}

/// A filled round dot standing in for a stroke with no length.
fn dot(center: Point, width: f64, color: SerializableColor) -> DrawCommand {
    DrawCommand::Fill {
        path: Circle::new(center, width / 2.0).to_path(0.1),
        color,
        rule: Fill::NonZero,
    }
}

/// Screen-space commands for one element.
pub fn element_commands(
    element: &Element,
    transform: Affine,
    zoom: f64,
    arrow_head_length: f64,
) -> Vec<DrawCommand> {
    let color = element.style.color;
    let width = element.style.stroke_width * zoom;
    let stroke = |path: BezPath| DrawCommand::Stroke { path, color, width };

    match &element.shape {
        Shape::Freehand(freehand) => match freehand.points.as_slice() {
            [] => Vec::new(),
            [point] => vec![dot(transform * *point, width, color)],
            _ => vec![stroke(transform * element.shape.to_path())],
        },
        Shape::Rectangle(_) | Shape::Ellipse(_) => {
            vec![stroke(transform * element.shape.to_path())]
        }
        Shape::Line(line) => {
            if line.start == line.end {
                vec![dot(transform * line.start, width, color)]
            } else {
                vec![stroke(transform * element.shape.to_path())]
            }
        }
        Shape::Arrow(arrow) => {
            let start = transform * arrow.start;
            let end = transform * arrow.end;
            if start == end {
                return vec![dot(end, width, color)];
            }
            // The head is sized in screen pixels, so it is built after the
            // transform.
            let [left, right] = arrow_head(start, end, arrow_head_length);
            let mut path = BezPath::new();
            path.move_to(start);
            path.line_to(end);
            path.move_to(left);
            path.line_to(end);
            path.line_to(right);
            vec![stroke(path)]
        }
        Shape::Sticky(sticky) => {
            let frame = transform * sticky.frame().to_path(0.1);
            vec![
                DrawCommand::Fill {
                    path: frame.clone(),
                    color: color.with_alpha(STICKY_FILL_ALPHA),
                    rule: Fill::NonZero,
                },
                stroke(frame),
                DrawCommand::Text {
                    origin: transform * sticky.text_origin(),
                    content: sticky.text.clone(),
                    size: Sticky::FONT_SIZE * zoom,
                    color: SerializableColor::white(),
                },
            ]
        }
        Shape::Text(text) => vec![DrawCommand::Text {
            origin: transform * text.anchor,
            content: text.content.clone(),
            size: text.font_size * zoom,
            color,
        }],
    }
}

/// Pointer triangle with a white outline, plus the peer's name.
fn cursor_commands(cursor: &CollaboratorCursor, tip: Point) -> Vec<DrawCommand> {
    let color = SerializableColor::from_hex(&cursor.color).unwrap_or(FALLBACK_CURSOR_COLOR);
    let mut path = BezPath::new();
    path.move_to(tip);
    path.line_to(Point::new(tip.x, tip.y + 18.0));
    path.line_to(Point::new(tip.x + 14.0, tip.y + 14.0));
    path.close_path();

    vec![
        DrawCommand::Fill {
            path: path.clone(),
            color,
            rule: Fill::NonZero,
        },
        DrawCommand::Stroke {
            path,
            color: SerializableColor::white(),
            width: 1.5,
        },
        DrawCommand::Text {
            origin: Point::new(tip.x + 16.0, tip.y + 28.0),
            content: cursor.display_name.clone(),
            size: CURSOR_LABEL_SIZE,
            color,
        },
    ]
}
