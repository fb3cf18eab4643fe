use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use mosaic_core::io::archive::{data_search_url, parse_period, stamp_url, CadenceMode};
use mosaic_core::io::read_stamp_header;
use mosaic_core::stamp::DetectorId;
use tracing::debug;

use super::mirror_dir;

/// Lays downloads out as `<mission>/target_pixel_files/...` below the current
/// directory, the layout a mirror is resolved against.
const WGET_CMD: &str = "wget -nH --cut-dirs=1 -x -c -N ";

#[derive(Args)]
pub struct ListArgs {
    /// Campaign (C4, or just 4) or Kepler quarter (Q4)
    pub campaign: String,

    /// CCD channel number
    #[arg(value_parser = clap::value_parser!(u32).range(1..=84))]
    pub channel: u32,

    /// Local archive mirror to scan [default: $MOSAIC_DATA]
    #[arg(long)]
    pub mirror: Option<PathBuf>,

    /// Print archive URLs for the data set names in this file instead
    #[arg(long)]
    pub names: Option<PathBuf>,

    /// Use short cadence products for --names and --query-url
    #[arg(long)]
    pub short_cadence: bool,

    /// Print wget commands instead of bare URLs
    #[arg(long)]
    pub wget: bool,

    /// Print the archive search URL listing this campaign's data sets
    #[arg(long)]
    pub query_url: bool,
}

pub fn run(args: &ListArgs) -> Result<()> {
    let (mission, period) = parse_period(&args.campaign)?;
    let mode = if args.short_cadence {
        CadenceMode::Short
    } else {
        CadenceMode::Long
    };

    if args.query_url {
        println!("{}", data_search_url(mission, period, Some(args.channel), mode));
        return Ok(());
    }

    if let Some(ref names) = args.names {
        let contents = fs::read_to_string(names)
            .with_context(|| format!("Failed to read data set names from {}", names.display()))?;
        for name in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let url = stamp_url(name, mode)?;
            if args.wget {
                println!("{WGET_CMD}{url}");
            } else {
                println!("{url}");
            }
        }
        return Ok(());
    }

    let Some(mirror) = mirror_dir(args.mirror.as_ref()) else {
        bail!("No mirror given: pass --mirror or set $MOSAIC_DATA");
    };
    let detector = DetectorId::new(mission, period, args.channel);

    let mut found = Vec::new();
    scan(&mirror, &detector, &mut found)
        .with_context(|| format!("Failed to scan mirror {}", mirror.display()))?;
    found.sort();

    if found.is_empty() {
        eprintln!("No stamps for {} under {}", detector, mirror.display());
    }
    for path in &found {
        println!("{}", path.display());
    }
    Ok(())
}

/// Collect every stamp file below `dir` belonging to `detector`.
fn scan(dir: &Path, detector: &DetectorId, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan(&path, detector, found)?;
            continue;
        }
        match read_stamp_header(&path) {
            Ok(header) if header.detector_id == *detector => found.push(path),
            Ok(_) => {}
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping non-stamp file"),
        }
    }
    Ok(())
}
