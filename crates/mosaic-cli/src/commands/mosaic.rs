use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use mosaic_core::cadence::TimeStepRequest;
use mosaic_core::composite::OverlapPolicy;
use mosaic_core::io::fits::FitsRasterWriter;
use mosaic_core::io::source::StampSourceResolver;
use mosaic_core::io::AutoStampReader;
use mosaic_core::pipeline::config::MosaicConfig;
use mosaic_core::pipeline::{run_mosaic_reported, MosaicPipeline};

use super::{load_toml, mirror_dir, read_filelist};
use crate::progress::BarReporter;
use crate::summary::{print_mosaic_summary, print_run_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum OverlapArg {
    LastWins,
    FirstWins,
    Strict,
}

impl From<OverlapArg> for OverlapPolicy {
    fn from(arg: OverlapArg) -> Self {
        match arg {
            OverlapArg::LastWins => OverlapPolicy::LastWins,
            OverlapArg::FirstWins => OverlapPolicy::FirstWins,
            OverlapArg::Strict => OverlapPolicy::Strict,
        }
    }
}

#[derive(Args)]
pub struct MosaicArgs {
    /// Text file listing stamp paths or archive URLs, one per line
    pub filelist: Option<PathBuf>,

    /// Mosaic config file (TOML); flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Time steps: first, last, all, N or A..B [default: all]
    #[arg(short = 'c', long = "cadence", value_name = "REQUEST")]
    pub time_steps: Option<TimeStepRequest>,

    /// Only mosaic every Nth time step [default: 1]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub step: Option<u64>,

    /// Worker threads; 0 uses every core [default: 1]
    #[arg(short = 'p', long = "processes")]
    pub workers: Option<usize>,

    /// How to resolve overlapping stamps that disagree [default: last-wins]
    #[arg(long, value_enum)]
    pub overlap: Option<OverlapArg>,

    /// Quality bits that mark a sample bad [default: all bits]
    #[arg(long)]
    pub quality_mask: Option<u32>,

    /// Output directory for FITS rasters
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output file name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Local archive mirror [default: $MOSAIC_DATA]
    #[arg(long)]
    pub mirror: Option<PathBuf>,

    /// Directory checked first for each stamp's file name
    #[arg(long)]
    pub local: Option<PathBuf>,
}

pub fn run(args: &MosaicArgs) -> Result<()> {
    let config = build_config(args)?;
    config.validate()?;

    print_mosaic_summary(&config);

    let mut resolver = StampSourceResolver::new();
    if let Some(ref dir) = config.lookup.local_override {
        resolver = resolver.with_local_override(dir);
    }
    if let Some(ref dir) = config.lookup.mirror {
        resolver = resolver.with_mirror(dir);
    }

    let reporter = Arc::new(BarReporter::new()?);
    let pipeline =
        MosaicPipeline::load_reported(&config, &resolver, &AutoStampReader, reporter.clone())
            .context("Failed to load stamps")?;

    let writer = FitsRasterWriter::new(&config.output.dir, &config.output.prefix);
    let summary = run_mosaic_reported(&pipeline, &writer, reporter.clone())
        .with_context(|| format!("Failed to mosaic {}", pipeline.detector_id()))?;
    reporter.finish("Done");

    print_run_summary(&pipeline, &summary);
    Ok(())
}

fn build_config(args: &MosaicArgs) -> Result<MosaicConfig> {
    let mut config: MosaicConfig = load_toml(args.config.as_ref())?;

    if let Some(ref filelist) = args.filelist {
        config.sources = read_filelist(filelist)?;
    }
    if config.sources.is_empty() {
        bail!("No stamps given: pass a file list or set `sources` in the config");
    }

    if let Some(request) = args.time_steps {
        config.time_steps = request;
    }
    if let Some(step) = args.step {
        config.step = step as usize;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(overlap) = args.overlap {
        config.overlap = overlap.into();
    }
    if let Some(mask) = args.quality_mask {
        config.quality_mask = mask;
    }
    if let Some(ref dir) = args.output {
        config.output.dir = dir.clone();
    }
    if let Some(ref prefix) = args.prefix {
        config.output.prefix = prefix.clone();
    }
    if let Some(ref dir) = args.local {
        config.lookup.local_override = Some(dir.clone());
    }
    if let Some(dir) = mirror_dir(args.mirror.as_ref()) {
        if args.mirror.is_some() || config.lookup.mirror.is_none() {
            config.lookup.mirror = Some(dir);
        }
    }

    Ok(config)
}
