use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mosaic_core::io::fits::{read_fits_header_from_path, read_fits_mosaic};
use mosaic_core::io::{read_stamp_header, AutoStampReader, StampReader};

#[derive(Args)]
pub struct InfoArgs {
    /// Stamp container, target pixel file, or mosaic raster
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    // Only rasters written by `mosaic mosaic` carry TIMESTEP.
    let is_raster = read_fits_header_from_path(&args.file)
        .is_ok_and(|header| header.get_int("TIMESTEP").is_some());
    if is_raster {
        raster_info(args)
    } else {
        stamp_info(args)
    }
}

fn stamp_info(args: &InfoArgs) -> Result<()> {
    let header = read_stamp_header(&args.file)
        .with_context(|| format!("Failed to read stamp header from {}", args.file.display()))?;
    let stamp = AutoStampReader
        .read(&args.file)
        .with_context(|| format!("Failed to read stamp {}", args.file.display()))?;

    println!("File:        {}", args.file.display());
    println!("Mission:     {}", header.detector_id.mission);
    println!("Detector:    {}", header.detector_id);
    println!("Origin:      column {}, row {}", header.origin.column, header.origin.row);
    println!("Dimensions:  {}x{}", header.width, header.height);
    println!("Time steps:  {}", header.time_step_count);
    if let (Some(first), Some(last)) = (stamp.time_steps().first(), stamp.time_steps().last()) {
        println!("Range:       {}..{}", first, last);
    }
    if let Some(flags) = stamp.quality_flags() {
        let flagged = flags.iter().filter(|&&f| f != 0).count();
        println!("Flagged:     {} of {}", flagged, flags.len());
    }
    if let Some(mask) = stamp.aperture() {
        let inside = mask.iter().filter(|&&m| m).count();
        println!("Aperture:    {} of {} pixels", inside, mask.len());
    }

    let frame_bytes = header.pixels_per_frame() * 4;
    let total_mb = (frame_bytes * header.time_step_count as usize) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}

fn raster_info(args: &InfoArgs) -> Result<()> {
    let mosaic = read_fits_mosaic(&args.file)
        .with_context(|| format!("Failed to read raster {}", args.file.display()))?;
    let observed = mosaic.observed_pixels();
    let total = mosaic.width() * mosaic.height();

    println!("File:        {}", args.file.display());
    println!("Detector:    {}", mosaic.detector_id);
    println!("Time step:   {}", mosaic.time_step);
    println!("Dimensions:  {}x{}", mosaic.width(), mosaic.height());
    println!(
        "Observed:    {} of {} pixels ({:.1}%)",
        observed,
        total,
        observed as f64 * 100.0 / total.max(1) as f64
    );
    println!("Stamps:      {}", mosaic.contributors);
    if mosaic.conflicts > 0 {
        println!("Conflicts:   {}", mosaic.conflicts);
    }

    Ok(())
}
