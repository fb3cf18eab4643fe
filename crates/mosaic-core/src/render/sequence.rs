use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::composite::Mosaic;
use crate::error::{MosaicError, Result};
use crate::io::fits::{read_fits_header_from_path, read_fits_mosaic};
use crate::stamp::DetectorId;

/// One animation frame, either in memory or as a raster on disk.
#[derive(Clone, Debug)]
pub enum FrameSource {
    Mosaic(Mosaic),
    /// Raster file whose header has already been read; pixels load on demand.
    Raster {
        path: PathBuf,
        detector_id: DetectorId,
        time_step: i64,
    },
}

impl FrameSource {
    /// Read just enough of a raster to place it in a sequence.
    pub fn raster(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let header = read_fits_header_from_path(&path).map_err(|e| with_path(&path, e))?;
        Ok(Self::Raster {
            detector_id: header.detector_id().map_err(|e| with_path(&path, e))?,
            time_step: header.time_step().map_err(|e| with_path(&path, e))?,
            path,
        })
    }

    pub fn time_step(&self) -> i64 {
        match self {
            Self::Mosaic(m) => m.time_step,
            Self::Raster { time_step, .. } => *time_step,
        }
    }

    pub fn detector_id(&self) -> DetectorId {
        match self {
            Self::Mosaic(m) => m.detector_id,
            Self::Raster { detector_id, .. } => *detector_id,
        }
    }

    /// The frame's mosaic, reading it from disk if needed.
    pub fn load(&self) -> Result<Cow<'_, Mosaic>> {
        match self {
            Self::Mosaic(m) => Ok(Cow::Borrowed(m)),
            Self::Raster { path, .. } => read_fits_mosaic(path).map(Cow::Owned),
        }
    }
}

fn with_path(path: &Path, err: MosaicError) -> MosaicError {
    match err {
        MosaicError::InvalidFits(reason) => {
            MosaicError::InvalidFits(format!("{}: {reason}", path.display()))
        }
        MosaicError::Io(e) => MosaicError::InvalidFits(format!("{}: {e}", path.display())),
        other => other,
    }
}

/// Frames of one detector in ascending time-step order.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    detector_id: DetectorId,
    frames: Vec<FrameSource>,
}

impl FrameSequence {
    /// Sort `frames` by time step, rejecting duplicates and mixed detectors.
    pub fn new(mut frames: Vec<FrameSource>) -> Result<Self> {
        let detector_id = frames
            .first()
            .map(FrameSource::detector_id)
            .ok_or(MosaicError::EmptySequence)?;

        for frame in &frames {
            if frame.detector_id() != detector_id {
                return Err(MosaicError::DetectorMismatch {
                    expected: detector_id,
                    found: frame.detector_id(),
                    locator: match frame {
                        FrameSource::Raster { path, .. } => path.display().to_string(),
                        FrameSource::Mosaic(m) => format!("mosaic for time step {}", m.time_step),
                    },
                });
            }
        }

        frames.sort_by_key(FrameSource::time_step);
        if let Some(pair) = frames
            .windows(2)
            .find(|p| p[0].time_step() == p[1].time_step())
        {
            return Err(MosaicError::DuplicateTimeStep(pair[0].time_step()));
        }

        debug!(detector = %detector_id, frames = frames.len(), "Built frame sequence");
        Ok(Self {
            detector_id,
            frames,
        })
    }

    pub fn from_mosaics(mosaics: Vec<Mosaic>) -> Result<Self> {
        Self::new(mosaics.into_iter().map(FrameSource::Mosaic).collect())
    }

    /// Build a sequence from raster files, reading only their headers.
    pub fn from_raster_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let frames = paths
            .iter()
            .map(|p| FrameSource::raster(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(frames)
    }

    pub fn detector_id(&self) -> DetectorId {
        self.detector_id
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn time_steps(&self) -> Vec<i64> {
        self.frames.iter().map(FrameSource::time_step).collect()
    }

    pub fn frames(&self) -> &[FrameSource] {
        &self.frames
    }
}
