//! Render a saved board to PNG.

use clap::{ArgGroup, Parser};
use ideaboard_core::config::BoardConfig;
use ideaboard_core::scene::Scene;
use ideaboard_core::storage::{FileStorage, Storage};
use ideaboard_render::{ExportOptions, RenderResult, SoftwareRenderer, export_png_with, png_data_url};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "ideaboard-export", about = "Render an Ideaboard scene to PNG")]
#[command(group(ArgGroup::new("source").required(true).args(["input", "board"])))]
struct Args {
    /// Scene JSON file
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Name of a saved board
    #[arg(short, long)]
    board: Option<String>,

    /// Board directory (defaults to the user data directory)
    #[arg(long, requires = "board")]
    store: Option<PathBuf>,

    /// TTF/OTF font used for text instead of the system sans-serif
    #[arg(long)]
    font: Option<PathBuf>,

    /// Output PNG file
    #[arg(short, long)]
    output: PathBuf,

    /// Board config JSON (colors, grid size)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 1920)]
    width: u32,

    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Hide the grid
    #[arg(long)]
    no_grid: bool,

    /// Keep the camera at the origin instead of fitting the scene
    #[arg(long)]
    no_fit: bool,

    /// Also print the image as a data URL
    #[arg(long)]
    data_url: bool,
}

fn load_scene(args: &Args) -> RenderResult<Scene> {
    if let Some(name) = &args.board {
        let storage = match &args.store {
            Some(dir) => FileStorage::new(dir.clone())?,
            None => FileStorage::default_location()?,
        };
        let scene = pollster::block_on(storage.load(name))?;
        log::info!(
            "Loaded {} element(s) from board {name} in {}",
            scene.len(),
            storage.base_path().display()
        );
        return Ok(scene);
    }
    let Some(path) = &args.input else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "no scene given").into());
    };
    let json = std::fs::read_to_string(path)?;
    let scene = Scene::from_json(&json)?;
    log::info!("Loaded {} element(s) from {}", scene.len(), path.display());
    Ok(scene)
}

fn run(args: &Args) -> RenderResult<()> {
    let config = match &args.config {
        Some(path) => BoardConfig::load(path)?,
        None => BoardConfig::default(),
    };
    let scene = load_scene(args)?;

    let mut renderer = SoftwareRenderer::new();
    if let Some(path) = &args.font {
        if !renderer.register_font(std::fs::read(path)?) {
            log::warn!("No usable font in {}", path.display());
        }
    }

    let options = ExportOptions {
        width: args.width,
        height: args.height,
        show_grid: config.show_grid && !args.no_grid,
        fit_to_content: !args.no_fit,
    };
    let png = export_png_with(&mut renderer, &scene, &config, &options)?;
    std::fs::write(&args.output, &png)?;
    log::info!("Wrote {}", args.output.display());

    if args.data_url {
        println!("{}", png_data_url(&png));
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Export failed: {e}");
            eprintln!("ideaboard-export: {e}");
            ExitCode::FAILURE
        }
    }
}
