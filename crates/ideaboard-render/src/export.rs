//! One-way raster export of a scene.

use crate::raster::{Pixmap, SoftwareRenderer};
use crate::renderer::{GridStyle, RenderContext, RenderResult, Renderer};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ideaboard_core::camera::Camera;
use ideaboard_core::config::BoardConfig;
use ideaboard_core::scene::Scene;
use kurbo::Size;

/// Prefix of a PNG data URL.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Margin around the scene when fitting it to the image.
const FIT_PADDING: f64 = 20.0;

/// How to frame an exported scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub width: u32,
    pub height: u32,
    pub show_grid: bool,
    /// Fit the camera to the scene instead of using the origin at 100%.
    pub fit_to_content: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            show_grid: true,
            fit_to_content: true,
        }
    }
}

impl ExportOptions {
    /// Canvas size and grid visibility taken from a board config.
    pub fn from_config(config: &BoardConfig) -> Self {
        Self {
            width: config.canvas_width,
            height: config.canvas_height,
            show_grid: config.show_grid,
            ..Self::default()
        }
    }
}

/// Encode RGBA pixel data to PNG bytes.
pub fn encode_png(pixmap: &Pixmap) -> RenderResult<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(pixmap.data())?;
    }
    Ok(png_data)
}

/// `data:image/png;base64,...` URL for PNG bytes.
pub fn png_data_url(png: &[u8]) -> String {
    format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png))
}

/// Rasterize a scene without any live state (no transient, no cursors).
pub fn render_scene(
    scene: &Scene,
    config: &BoardConfig,
    options: &ExportOptions,
) -> RenderResult<Pixmap> {
    render_scene_with(&mut SoftwareRenderer::new(), scene, config, options)
}

/// [`render_scene`] on a caller-provided renderer (custom fonts, reuse).
pub fn render_scene_with(
    renderer: &mut SoftwareRenderer,
    scene: &Scene,
    config: &BoardConfig,
    options: &ExportOptions,
) -> RenderResult<Pixmap> {
    let viewport = Size::new(f64::from(options.width), f64::from(options.height));
    let mut camera = Camera::new();
    if options.fit_to_content {
        if let Some(bounds) = scene.bounds() {
            camera.fit_to_bounds(bounds, viewport, FIT_PADDING);
        }
    }
    let ctx = RenderContext::new(scene, &camera, viewport)
        .with_config(config)
        .with_grid(GridStyle::from_visibility(options.show_grid));
    renderer.render(&ctx)
}

/// Rasterize and encode a scene as PNG.
pub fn export_png(
    scene: &Scene,
    config: &BoardConfig,
    options: &ExportOptions,
) -> RenderResult<Vec<u8>> {
    export_png_with(&mut SoftwareRenderer::new(), scene, config, options)
}

pub fn export_png_with(
    renderer: &mut SoftwareRenderer,
    scene: &Scene,
    config: &BoardConfig,
    options: &ExportOptions,
) -> RenderResult<Vec<u8>> {
    let pixmap = render_scene_with(renderer, scene, config, options)?;
    let png = encode_png(&pixmap)?;
    log::info!(
        "Exported {} element(s) as {}x{} PNG ({} bytes)",
        scene.len(),
        options.width,
        options.height,
        png.len()
    );
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::MAX_DIMENSION;
    use crate::renderer::RenderError;
    use ideaboard_core::shapes::{Element, ElementStyle, Rectangle, Shape};
    use kurbo::Point;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    fn small() -> ExportOptions {
        ExportOptions {
            width: 32,
            height: 24,
            show_grid: false,
            fit_to_content: false,
        }
    }

    #[test]
    fn test_export_png_header_and_size() {
        let png = export_png(&Scene::new(), &BoardConfig::default(), &small()).unwrap();
        assert_eq!(png[..8], PNG_SIGNATURE);

        let decoder = png::Decoder::new(std::io::Cursor::new(png));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 32);
        assert_eq!(reader.info().height, 24);
    }

    #[test]
    fn test_export_rejects_oversized_canvas() {
        for (width, height) in [(u32::MAX, u32::MAX), (MAX_DIMENSION + 1, 600), (800, 0)] {
            let options = ExportOptions {
                width,
                height,
                ..small()
            };
            assert!(matches!(
                export_png(&Scene::new(), &BoardConfig::default(), &options),
                Err(RenderError::InvalidSize { width: w, height: h }) if (w, h) == (width, height)
            ));
        }
    }

    #[test]
    fn test_data_url() {
        let url = png_data_url(&[1, 2, 3]);
        assert_eq!(url, "data:image/png;base64,AQID");
    }

    #[test]
    fn test_fit_to_content_centers_scene() {
        let scene = Scene::from_elements([Element::new(
            Shape::Rectangle(Rectangle::new(Point::new(1000.0, 1000.0), 100.0, 100.0)),
            ElementStyle::default(),
        )])
        .unwrap();
        let config = BoardConfig::default();
        let background = config.background_color;
        let bg = [background.r, background.g, background.b, 255];

        let unfitted = render_scene(&scene, &config, &small()).unwrap();
        assert!(unfitted.data().chunks_exact(4).all(|px| px == bg));

        let fitted = render_scene(
            &scene,
            &config,
            &ExportOptions {
                fit_to_content: true,
                ..small()
            },
        )
        .unwrap();
        assert!(fitted.data().chunks_exact(4).any(|px| px != bg));
    }

    #[test]
    fn test_options_from_config() {
        let config = BoardConfig {
            canvas_width: 800,
            show_grid: false,
            ..BoardConfig::default()
        };
        let options = ExportOptions::from_config(&config);
        assert_eq!(options.width, 800);
        assert_eq!(options.height, 1080);
        assert!(!options.show_grid);
    }
}
