#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::Array3;

use mosaic_core::io::stamp_writer::save_stamp;
use mosaic_core::pipeline::config::MosaicConfig;
use mosaic_core::stamp::{DetectorGrid, DetectorId, Mission, PixelOrigin, Stamp};

/// Detector used by most tests: K2 campaign 4, channel 15.
pub fn detector() -> DetectorId {
    DetectorId::new(Mission::K2, 4, 15)
}

/// A small grid keeps canvases cheap.
pub fn small_grid() -> DetectorGrid {
    DetectorGrid::new(16, 12)
}

pub fn small_config() -> MosaicConfig {
    MosaicConfig {
        detector: small_grid(),
        ..Default::default()
    }
}

/// Stamp whose every pixel at every time step holds `value`.
pub fn uniform_stamp(
    column: usize,
    row: usize,
    width: usize,
    height: usize,
    time_steps: &[i64],
    value: f32,
) -> Stamp {
    let series = Array3::from_elem((time_steps.len(), height, width), value);
    Stamp::new(
        detector(),
        PixelOrigin { column, row },
        time_steps.to_vec(),
        series,
    )
    .unwrap()
}

/// Stamp whose pixel value encodes the time step: `base + t`.
pub fn time_coded_stamp(
    column: usize,
    row: usize,
    width: usize,
    height: usize,
    time_steps: &[i64],
    base: f32,
) -> Stamp {
    let mut series = Array3::zeros((time_steps.len(), height, width));
    for (i, &t) in time_steps.iter().enumerate() {
        series
            .index_axis_mut(ndarray::Axis(0), i)
            .fill(base + t as f32);
    }
    Stamp::new(
        detector(),
        PixelOrigin { column, row },
        time_steps.to_vec(),
        series,
    )
    .unwrap()
}

/// Write `stamp` to `dir/name` and return the path.
pub fn write_stamp_file(dir: &Path, name: &str, stamp: &Stamp) -> PathBuf {
    let path = dir.join(name);
    save_stamp(stamp, &path).unwrap();
    path
}

/// All files in `dir`, sorted by name.
pub fn sorted_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}
