use std::fmt;

use ndarray::{Array2, Array3, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::consts::{KEPLER_CHANNEL_HEIGHT, KEPLER_CHANNEL_WIDTH};
use crate::error::{MosaicError, Result};

/// Which mission a detector belongs to. Selects the campaign/quarter letter
/// used in output names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mission {
    K2,
    Kepler,
}

impl Mission {
    /// `c` for a K2 campaign, `q` for a Kepler quarter.
    pub fn period_letter(self) -> char {
        match self {
            Self::K2 => 'c',
            Self::Kepler => 'q',
        }
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::K2 => write!(f, "K2"),
            Self::Kepler => write!(f, "Kepler"),
        }
    }
}

/// Identifies the full-detector grid a stamp belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectorId {
    pub mission: Mission,
    /// K2 campaign or Kepler quarter.
    pub campaign: u32,
    pub channel: u32,
}

impl DetectorId {
    pub fn new(mission: Mission, campaign: u32, channel: u32) -> Self {
        Self {
            mission,
            campaign,
            channel,
        }
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:02}/ch{:02}",
            self.mission.period_letter(),
            self.campaign,
            self.channel
        )
    }
}

/// Integer (column, row) offset of a stamp's lower-left pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelOrigin {
    pub column: usize,
    pub row: usize,
}

/// Full-size canvas dimensions for one detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorGrid {
    pub width: usize,
    pub height: usize,
}

impl Default for DetectorGrid {
    fn default() -> Self {
        Self {
            width: KEPLER_CHANNEL_WIDTH,
            height: KEPLER_CHANNEL_HEIGHT,
        }
    }
}

impl DetectorGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// True if a `width`x`height` footprint at `origin` lies entirely inside the grid.
    pub fn contains(&self, origin: PixelOrigin, width: usize, height: usize) -> bool {
        origin.column + width <= self.width && origin.row + height <= self.height
    }
}

/// One input pixel cutout: a small rectangle on the detector sampled over
/// a gapped series of time steps.
#[derive(Clone, Debug)]
pub struct Stamp {
    pub detector_id: DetectorId,
    pub origin: PixelOrigin,
    time_steps: Vec<i64>,
    /// shape = (N, height, width); row 0 is the stamp's bottom row.
    pixel_series: Array3<f32>,
    quality_flags: Option<Vec<u32>>,
    aperture: Option<Array2<bool>>,
}

impl Stamp {
    /// Build a stamp, checking that the time steps are strictly increasing
    /// and match the pixel series length.
    pub fn new(
        detector_id: DetectorId,
        origin: PixelOrigin,
        time_steps: Vec<i64>,
        pixel_series: Array3<f32>,
    ) -> Result<Self> {
        let (n, h, w) = pixel_series.dim();
        if n != time_steps.len() {
            return Err(MosaicError::InvalidStamp(format!(
                "{} time steps but {} pixel frames",
                time_steps.len(),
                n
            )));
        }
        if w == 0 || h == 0 {
            return Err(MosaicError::InvalidStamp(format!(
                "empty footprint {w}x{h}"
            )));
        }
        if let Some(pair) = time_steps.windows(2).find(|p| p[0] >= p[1]) {
            return Err(MosaicError::InvalidStamp(format!(
                "time steps not strictly increasing ({} then {})",
                pair[0], pair[1]
            )));
        }

        Ok(Self {
            detector_id,
            origin,
            time_steps,
            pixel_series,
            quality_flags: None,
            aperture: None,
        })
    }

    /// Attach per-time-step quality flags.
    pub fn with_quality_flags(mut self, flags: Vec<u32>) -> Result<Self> {
        if flags.len() != self.time_steps.len() {
            return Err(MosaicError::InvalidStamp(format!(
                "{} quality flags for {} time steps",
                flags.len(),
                self.time_steps.len()
            )));
        }
        self.quality_flags = Some(flags);
        Ok(self)
    }

    /// Attach an aperture mask; only cells set to `true` contribute pixels.
    pub fn with_aperture(mut self, aperture: Array2<bool>) -> Result<Self> {
        if aperture.dim() != (self.height(), self.width()) {
            return Err(MosaicError::InvalidStamp(format!(
                "aperture shape {:?} does not match stamp {}x{}",
                aperture.dim(),
                self.width(),
                self.height()
            )));
        }
        self.aperture = Some(aperture);
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.pixel_series.dim().2
    }

    pub fn height(&self) -> usize {
        self.pixel_series.dim().1
    }

    pub fn time_steps(&self) -> &[i64] {
        &self.time_steps
    }

    pub fn quality_flags(&self) -> Option<&[u32]> {
        self.quality_flags.as_deref()
    }

    pub fn aperture(&self) -> Option<&Array2<bool>> {
        self.aperture.as_ref()
    }

    pub fn pixel_series(&self) -> &Array3<f32> {
        &self.pixel_series
    }

    /// Pixels for one local row of the time series.
    pub fn frame(&self, row: usize) -> ArrayView2<'_, f32> {
        self.pixel_series.index_axis(ndarray::Axis(0), row)
    }

    /// Local row holding `time_step`, if this stamp sampled it.
    pub fn row_of(&self, time_step: i64) -> Option<usize> {
        self.time_steps.binary_search(&time_step).ok()
    }

    /// True if the sample at `row` is flagged under `quality_mask`.
    pub fn is_flagged(&self, row: usize, quality_mask: u32) -> bool {
        self.quality_flags
            .as_ref()
            .and_then(|flags| flags.get(row))
            .is_some_and(|&f| f & quality_mask != 0)
    }

    /// True if the stamp's aperture (or its whole footprint) includes `(row, col)`.
    pub fn in_aperture(&self, row: usize, col: usize) -> bool {
        match &self.aperture {
            Some(mask) => mask[[row, col]],
            None => true,
        }
    }
}
