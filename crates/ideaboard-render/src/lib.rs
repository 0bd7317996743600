//! Ideaboard Render Library
//!
//! Turns a frame ([`RenderContext`]) into a screen-space display list, and
//! rasterizes display lists on the CPU for previews and PNG export.

pub mod display;
pub mod export;
pub mod raster;
mod renderer;

pub use display::{DisplayList, DrawCommand, DrawItem, Layer, build_display_list};
pub use export::{
    ExportOptions, encode_png, export_png, export_png_with, png_data_url, render_scene,
    render_scene_with,
};
pub use raster::{MAX_DIMENSION, Pixmap, SoftwareRenderer};
pub use renderer::{GridStyle, RenderContext, RenderError, RenderResult, Renderer};
