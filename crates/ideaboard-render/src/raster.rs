//! CPU backend: display lists are drawn with `vello_cpu`, text is shaped
//! with `parley`.

use crate::display::{DisplayList, DrawCommand, build_display_list};
use crate::renderer::{RenderContext, RenderError, RenderResult, Renderer};
use ideaboard_core::shapes::SerializableColor;
use kurbo::{Affine, Cap, Join, Point, Rect, Stroke};
use parley::layout::PositionedLayoutItem;
use parley::{
    Alignment, AlignmentOptions, FontContext, FontFamily, FontStack, GenericFamily, Layout,
    LayoutContext, StyleProperty,
};
use peniko::{Blob, Color, Fill};
use std::sync::Arc;
use vello_cpu::color::PremulRgba8;
use vello_cpu::{Glyph, RenderContext as CpuContext};

/// Largest width or height of a render target, in pixels.
pub const MAX_DIMENSION: u32 = 8192;

/// Drawn in place of text when no font could shape it.
const MISSING_TEXT_COLOR: SerializableColor = SerializableColor::new(255, 100, 100, 100);

/// An RGBA8 image (straight alpha, row-major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Check a target size against [`MAX_DIMENSION`].
fn target_size(width: u32, height: u32) -> RenderResult<(u16, u16)> {
    let invalid = || RenderError::InvalidSize { width, height };
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(invalid());
    }
    Ok((
        u16::try_from(width).map_err(|_| invalid())?,
        u16::try_from(height).map_err(|_| invalid())?,
    ))
}

fn unpremultiply(px: &PremulRgba8) -> [u8; 4] {
    if px.a == 0 {
        return [0, 0, 0, 0];
    }
    let alpha = u32::from(px.a);
    let channel = |c: u8| ((u32::from(c) * 255 + alpha / 2) / alpha).min(255) as u8;
    [channel(px.r), channel(px.g), channel(px.b), px.a]
}

impl Pixmap {
    /// A transparent image; fails for empty or oversized targets.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        target_size(width, height)?;
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or(RenderError::InvalidSize { width, height })?;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    fn from_premultiplied(width: u32, height: u32, pixels: &[PremulRgba8]) -> Self {
        Self {
            width,
            height,
            data: pixels.iter().flat_map(unpremultiply).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }
}

/// Renders frames into a [`Pixmap`] on the CPU.
pub struct SoftwareRenderer {
    /// Font context, kept across frames so fonts are only discovered once.
    font_cx: FontContext,
    layout_cx: LayoutContext<()>,
    last_list: DisplayList,
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self {
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
            last_list: DisplayList::new(),
        }
    }
}

impl SoftwareRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a TTF/OTF font and make it the sans-serif face used for
    /// board text. Returns false when the data holds no usable font.
    pub fn register_font(&mut self, data: Vec<u8>) -> bool {
        let families = self
            .font_cx
            .collection
            .register_fonts(Blob::new(Arc::new(data)), None);
        if families.is_empty() {
            return false;
        }
        self.font_cx.collection.set_generic_families(
            GenericFamily::SansSerif,
            families.into_iter().map(|(family, _)| family),
        );
        true
    }

    /// Display list of the most recent frame.
    pub fn last_display_list(&self) -> &DisplayList {
        &self.last_list
    }

    /// Draw a display list into a fresh `width`×`height` image.
    pub fn rasterize(&mut self, list: &DisplayList, width: u32, height: u32) -> RenderResult<Pixmap> {
        let (w, h) = target_size(width, height)?;
        let mut cpu = CpuContext::new(w, h);
        for item in list {
            self.execute(&mut cpu, &item.command);
        }
        cpu.flush();
        let mut target = vello_cpu::Pixmap::new(w, h);
        cpu.render_to_pixmap(&mut target);
        Ok(Pixmap::from_premultiplied(width, height, target.data()))
    }

    fn execute(&mut self, cpu: &mut CpuContext, command: &DrawCommand) {
        match command {
            DrawCommand::Fill { path, color, rule } => {
                cpu.set_paint(Color::from(*color));
                cpu.set_fill_rule(*rule);
                cpu.fill_path(path);
            }
            DrawCommand::Stroke { path, color, width } => {
                if !(width.is_finite() && *width > 0.0) {
                    return;
                }
                cpu.set_paint(Color::from(*color));
                cpu.set_stroke(Stroke::new(*width).with_caps(Cap::Round).with_join(Join::Round));
                cpu.stroke_path(path);
            }
            DrawCommand::Text {
                origin,
                content,
                size,
                color,
            } => self.draw_text(cpu, *origin, content, *size, *color),
        }
    }

    /// Shape `content` as one line and fill its glyphs with the baseline at
    /// `origin`.
    fn draw_text(
        &mut self,
        cpu: &mut CpuContext,
        origin: Point,
        content: &str,
        size: f64,
        color: SerializableColor,
    ) {
        if content.trim().is_empty() || !(size.is_finite() && size > 0.0) {
            return;
        }
        let mut builder = self
            .layout_cx
            .ranged_builder(&mut self.font_cx, content, 1.0, true);
        builder.push_default(StyleProperty::FontSize(size as f32));
        builder.push_default(StyleProperty::FontStack(FontStack::Single(
            FontFamily::Generic(GenericFamily::SansSerif),
        )));
        let mut layout: Layout<()> = builder.build(content);
        layout.break_all_lines(None);
        layout.align(None, Alignment::Start, AlignmentOptions::default());

        let first_baseline = layout
            .lines()
            .next()
            .map_or(0.0, |line| f64::from(line.metrics().baseline));
        cpu.set_paint(Color::from(color));
        cpu.set_transform(Affine::translate((origin.x, origin.y - first_baseline)));

        let mut glyph_count = 0;
        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline();
                let run = glyph_run.run();
                let glyphs: Vec<Glyph> = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let placed = Glyph {
                            id: glyph.id.into(),
                            x: x + glyph.x,
                            y: y - glyph.y,
                        };
                        x += glyph.advance;
                        placed
                    })
                    .collect();
                glyph_count += glyphs.len();
                cpu.glyph_run(run.font())
                    .font_size(run.font_size())
                    .fill_glyphs(glyphs.into_iter());
            }
        }
        cpu.set_transform(Affine::IDENTITY);

        if glyph_count == 0 {
            log::warn!("No font available for text {content:?}; drawing a placeholder");
            let width = content.chars().count() as f64 * size * 0.6;
            let rect = Rect::new(origin.x, origin.y - size, origin.x + width.max(20.0), origin.y);
            cpu.set_paint(Color::from(MISSING_TEXT_COLOR));
            cpu.set_fill_rule(Fill::NonZero);
            cpu.fill_rect(&rect);
        }
    }
}

fn pixel_size(value: f64) -> u32 {
    if value.is_finite() && value >= 1.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

impl Renderer for SoftwareRenderer {
    type Output = Pixmap;

    fn render(&mut self, ctx: &RenderContext) -> RenderResult<Pixmap> {
        let width = pixel_size(ctx.viewport_size.width);
        let height = pixel_size(ctx.viewport_size.height);
        target_size(width, height)?;
        let list = build_display_list(ctx);
        let pixmap = self.rasterize(&list, width, height)?;
        log::debug!(
            "Rendered {} draw command(s) into {}x{}",
            list.len(),
            width,
            height
        );
        self.last_list = list;
        Ok(pixmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DrawItem, Layer};
    use crate::renderer::GridStyle;
    use ideaboard_core::camera::Camera;
    use ideaboard_core::scene::Scene;
    use ideaboard_core::shapes::{Element, ElementStyle, Shape, Sticky, Text};
    use kurbo::{BezPath, Shape as KurboShape, Size};

    const BLACK: SerializableColor = SerializableColor::rgb(0, 0, 0);
    const WHITE: SerializableColor = SerializableColor::rgb(255, 255, 255);

    fn item(command: DrawCommand) -> DrawItem {
        DrawItem {
            layer: Layer::Transient,
            command,
        }
    }

    fn fill(path: BezPath, color: SerializableColor, rule: Fill) -> DrawItem {
        item(DrawCommand::Fill { path, color, rule })
    }

    /// A black `size`×`size` canvas followed by `commands`.
    fn draw(size: u32, commands: Vec<DrawItem>) -> Pixmap {
        let side = f64::from(size);
        let mut list = vec![fill(
            Rect::new(0.0, 0.0, side, side).to_path(0.1),
            BLACK,
            Fill::NonZero,
        )];
        list.extend(commands);
        SoftwareRenderer::new().rasterize(&list, size, size).unwrap()
    }

    fn close(actual: Option<[u8; 4]>, expected: [u8; 4]) -> bool {
        actual.is_some_and(|px| px.iter().zip(expected).all(|(a, e)| a.abs_diff(e) <= 2))
    }

    #[test]
    fn test_fill_rect() {
        let pixmap = draw(
            8,
            vec![fill(Rect::new(2.0, 2.0, 6.0, 6.0).to_path(0.1), WHITE, Fill::NonZero)],
        );
        assert!(close(pixmap.pixel(3, 3), [255, 255, 255, 255]));
        assert!(close(pixmap.pixel(5, 5), [255, 255, 255, 255]));
        assert!(close(pixmap.pixel(1, 1), [0, 0, 0, 255]));
        assert!(close(pixmap.pixel(6, 6), [0, 0, 0, 255]));
    }

    #[test]
    fn test_fill_rules() {
        let mut path = Rect::new(0.0, 0.0, 8.0, 8.0).to_path(0.1);
        path.extend(Rect::new(2.0, 2.0, 6.0, 6.0).path_elements(0.1));

        let even_odd = draw(8, vec![fill(path.clone(), WHITE, Fill::EvenOdd)]);
        assert!(close(even_odd.pixel(4, 4), [0, 0, 0, 255]));
        assert!(close(even_odd.pixel(0, 4), [255, 255, 255, 255]));

        let non_zero = draw(8, vec![fill(path, WHITE, Fill::NonZero)]);
        assert!(close(non_zero.pixel(4, 4), [255, 255, 255, 255]));
    }

    #[test]
    fn test_stroke_line() {
        let mut path = BezPath::new();
        path.move_to((1.0, 5.0));
        path.line_to((9.0, 5.0));
        let pixmap = draw(
            10,
            vec![item(DrawCommand::Stroke {
                path,
                color: WHITE,
                width: 2.0,
            })],
        );
        assert!(close(pixmap.pixel(5, 4), [255, 255, 255, 255]));
        assert!(close(pixmap.pixel(5, 1), [0, 0, 0, 255]));
    }

    #[test]
    fn test_translucent_blend() {
        let pixmap = draw(
            4,
            vec![fill(
                Rect::new(0.0, 0.0, 4.0, 4.0).to_path(0.1),
                WHITE.with_alpha(128),
                Fill::NonZero,
            )],
        );
        assert!(close(pixmap.pixel(1, 1), [128, 128, 128, 255]));
    }

    fn text_frame(content: &str) -> Pixmap {
        let scene = Scene::from_elements([Element::new(
            Shape::Text(Text::new(Point::new(20.0, 60.0), content, 24.0)),
            ElementStyle::new(WHITE, 2.0),
        )])
        .unwrap();
        let camera = Camera::new();
        let ctx = RenderContext::new(&scene, &camera, Size::new(160.0, 100.0))
            .with_background(BLACK)
            .with_grid(GridStyle::None);
        SoftwareRenderer::new().render(&ctx).unwrap()
    }

    #[test]
    fn test_text_is_shaped() {
        let hello = text_frame("HELLO");
        assert_ne!(hello, text_frame("XQZWM"));
        assert!(hello.data().chunks_exact(4).any(|px| px != [0, 0, 0, 255]));
    }

    #[test]
    fn test_renderer_output() {
        let scene = Scene::from_elements([Element::new(
            Shape::Sticky(Sticky::new(Point::new(10.0, 10.0), "")),
            ElementStyle::default(),
        )])
        .unwrap();
        let camera = Camera::new();
        let ctx = RenderContext::new(&scene, &camera, Size::new(64.0, 48.0))
            .with_background(SerializableColor::rgb(10, 15, 26))
            .with_grid(GridStyle::None);
        let mut renderer = SoftwareRenderer::new();
        let pixmap = renderer.render(&ctx).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (64, 48));
        assert_eq!(pixmap.data().len(), 64 * 48 * 4);
        // Untouched corner is background; the sticky body is tinted.
        assert!(close(pixmap.pixel(0, 0), [10, 15, 26, 255]));
        assert!(!close(pixmap.pixel(40, 40), [10, 15, 26, 255]));
        assert!(!renderer.last_display_list().is_empty());

        let again = renderer.render(&ctx).unwrap();
        assert_eq!(again, pixmap);
    }

    #[test]
    fn test_invalid_size() {
        let scene = Scene::new();
        let camera = Camera::new();
        let ctx = RenderContext::new(&scene, &camera, Size::new(0.0, 10.0));
        assert!(matches!(
            SoftwareRenderer::new().render(&ctx),
            Err(RenderError::InvalidSize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_oversized_targets_are_rejected() {
        assert!(matches!(
            Pixmap::new(u32::MAX, u32::MAX),
            Err(RenderError::InvalidSize { .. })
        ));
        assert!(matches!(
            Pixmap::new(MAX_DIMENSION + 1, 10),
            Err(RenderError::InvalidSize { .. })
        ));
        assert!(Pixmap::new(MAX_DIMENSION, 1).is_ok());
        assert!(matches!(
            SoftwareRenderer::new().rasterize(&DisplayList::new(), 10, 70_000),
            Err(RenderError::InvalidSize { width: 10, height: 70_000 })
        ));
    }
}
