use std::fmt;

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::NO_DATA;
use crate::error::{MosaicError, Result};
use crate::stamp::{DetectorGrid, DetectorId, Stamp};

/// What to do when two stamps supply different values for one detector cell.
///
/// The instrument observes each cell once per time step, so overlapping
/// stamps should agree; a disagreement means the inputs are inconsistent.
/// Every policy counts and logs disagreements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// The stamp later in input order overwrites.
    #[default]
    LastWins,
    /// The first observed value is kept.
    FirstWins,
    /// Any disagreement aborts with `OverlapConflict`.
    Strict,
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastWins => write!(f, "Last Wins"),
            Self::FirstWins => write!(f, "First Wins"),
            Self::Strict => write!(f, "Strict"),
        }
    }
}

/// One composited full-detector raster for a single time step.
#[derive(Clone, Debug)]
pub struct Mosaic {
    pub detector_id: DetectorId,
    pub time_step: i64,
    /// shape = (height, width); row 0 is detector row 0. `NaN` = not observed.
    pub data: Array2<f32>,
    /// Stamps that supplied at least one observed pixel.
    pub contributors: usize,
    /// Cells where overlapping stamps disagreed.
    pub conflicts: usize,
}

impl Mosaic {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Number of cells holding an observed value.
    pub fn observed_pixels(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Project every contributing stamp's pixels for `time_step` onto a fresh
/// canvas of `grid` size.
///
/// `contributions` pairs each stamp with its local row for this time step and
/// is applied in order. Sentinel pixels and cells outside a stamp's aperture
/// never overwrite the canvas.
pub fn composite(
    grid: &DetectorGrid,
    detector_id: DetectorId,
    time_step: i64,
    contributions: &[(&Stamp, usize)],
    policy: OverlapPolicy,
) -> Result<Mosaic> {
    let mut canvas = Array2::<f32>::from_elem((grid.height, grid.width), NO_DATA);
    let mut contributors = 0;
    let mut conflicts = 0;

    for &(stamp, row) in contributions {
        let (w, h) = (stamp.width(), stamp.height());
        if !grid.contains(stamp.origin, w, h) {
            return Err(MosaicError::InvalidStamp(format!(
                "{}x{} footprint at ({}, {}) exceeds {}x{} detector",
                w, h, stamp.origin.column, stamp.origin.row, grid.width, grid.height
            )));
        }

        let (r0, c0) = (stamp.origin.row, stamp.origin.column);
        let frame = stamp.frame(row);
        let mut target = canvas.slice_mut(s![r0..r0 + h, c0..c0 + w]);
        let mut supplied = false;

        for ((r, c), &value) in frame.indexed_iter() {
            if value.is_nan() || !stamp.in_aperture(r, c) {
                continue;
            }
            supplied = true;

            let cell = &mut target[[r, c]];
            if cell.is_nan() {
                *cell = value;
            } else if *cell != value {
                conflicts += 1;
                match policy {
                    OverlapPolicy::LastWins => *cell = value,
                    OverlapPolicy::FirstWins => {}
                    OverlapPolicy::Strict => {
                        return Err(MosaicError::OverlapConflict {
                            time_step,
                            column: c0 + c,
                            row: r0 + r,
                        });
                    }
                }
            }
        }

        if supplied {
            contributors += 1;
        }
    }

    if conflicts > 0 {
        warn!(
            time_step,
            conflicts,
            policy = %policy,
            "Overlapping stamps disagree"
        );
    }
    debug!(time_step, contributors, "Composited mosaic");

    Ok(Mosaic {
        detector_id,
        time_step,
        data: canvas,
        contributors,
        conflicts,
    })
}
