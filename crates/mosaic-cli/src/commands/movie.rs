use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use mosaic_core::render::config::{PixelRange, RenderConfig, Scale};
use mosaic_core::render::{assemble_reported, encoder_for_path, FrameSequence};

use super::{load_toml, read_filelist};
use crate::progress::BarReporter;
use crate::summary::print_movie_summary;

#[derive(Clone, Copy, ValueEnum)]
pub enum ScaleArg {
    Linear,
    Log,
}

impl From<ScaleArg> for Scale {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::Linear => Scale::Linear,
            ScaleArg::Log => Scale::Log,
        }
    }
}

#[derive(Args)]
pub struct MovieArgs {
    /// Text file listing mosaic rasters (.fits), one per line
    pub filelist: PathBuf,

    /// Output .gif, .mp4/.mov/.mkv, or a directory for PNG frames
    #[arg(short, long, default_value = "mosaic-movie.gif")]
    pub output: PathBuf,

    /// Render config file (TOML); flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Detector rows to show [default: rows with data]
    #[arg(short, long, value_name = "ROW1..ROW2")]
    pub rows: Option<PixelRange>,

    /// Detector columns to show [default: columns with data]
    #[arg(short, long, value_name = "COL1..COL2")]
    pub cols: Option<PixelRange>,

    /// Frames per second [default: 15]
    #[arg(long)]
    pub fps: Option<f32>,

    /// Fixed cut levels [default: percentiles of the first frame]
    #[arg(long, value_name = "MIN_CUT..MAX_CUT")]
    pub cut: Option<String>,

    /// Intensity scale [default: log]
    #[arg(long, value_enum)]
    pub scale: Option<ScaleArg>,

    /// Integer upscale factor [default: 1]
    #[arg(long)]
    pub zoom: Option<u32>,
}

pub fn run(args: &MovieArgs) -> Result<()> {
    let config = build_config(args)?;
    config.validate()?;

    let paths = read_filelist(&args.filelist)?;
    let sequence = FrameSequence::from_raster_paths(&paths).context("Failed to read rasters")?;

    print_movie_summary(&sequence, &config, &args.output);

    let mut encoder = encoder_for_path(&args.output, config.fps, config.background)
        .with_context(|| format!("Failed to open {}", args.output.display()))?;
    let reporter = Arc::new(BarReporter::new()?);
    let summary = assemble_reported(&sequence, &config, encoder.as_mut(), reporter.clone())
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    reporter.finish("Done");

    println!(
        "\nWrote {} frames ({}x{}) to {}",
        summary.frames(),
        summary.width,
        summary.height,
        args.output.display()
    );
    Ok(())
}

fn build_config(args: &MovieArgs) -> Result<RenderConfig> {
    let mut config: RenderConfig = load_toml(args.config.as_ref())?;

    if let Some(rows) = args.rows {
        config.rows = Some(rows);
    }
    if let Some(cols) = args.cols {
        config.cols = Some(cols);
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(ref cut) = args.cut {
        let (min_cut, max_cut) = parse_cut(cut)?;
        config.stretch.min_cut = Some(min_cut);
        config.stretch.max_cut = Some(max_cut);
    }
    if let Some(scale) = args.scale {
        config.stretch.scale = scale.into();
    }
    if let Some(zoom) = args.zoom {
        config.zoom = zoom;
    }
    Ok(config)
}

/// Parse `MIN..MAX` cut levels.
fn parse_cut(s: &str) -> Result<(f32, f32)> {
    let (lo, hi) = s
        .split_once("..")
        .ok_or_else(|| anyhow!("Cut levels must look like 100..5000, got '{s}'"))?;
    let lo: f32 = lo.trim().parse().with_context(|| format!("Invalid min cut '{lo}'"))?;
    let hi: f32 = hi.trim().parse().with_context(|| format!("Invalid max cut '{hi}'"))?;
    Ok((lo, hi))
}
