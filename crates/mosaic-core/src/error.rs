use thiserror::Error;

use crate::stamp::DetectorId;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load stamp {locator}: {reason}")]
    StampLoad { locator: String, reason: String },

    #[error("Stamp {locator} belongs to detector {found}, expected {expected}")]
    DetectorMismatch {
        expected: DetectorId,
        found: DetectorId,
        locator: String,
    },

    #[error("Time step {0} is not present in any stamp")]
    UnknownTimeStep(i64),

    #[error("Failed to render frame for time step {time_step}: {reason}")]
    FrameRender { time_step: i64, reason: String },

    #[error("Overlapping stamps disagree at column {column}, row {row} (time step {time_step})")]
    OverlapConflict {
        time_step: i64,
        column: usize,
        row: usize,
    },

    #[error("Time step {0} appears more than once in the frame sequence")]
    DuplicateTimeStep(i64),

    #[error("Invalid time step request: {0}")]
    InvalidRequest(String),

    #[error("Invalid stamp: {0}")]
    InvalidStamp(String),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoder error: {0}")]
    Encode(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Empty stamp or frame sequence")]
    EmptySequence,
}

impl MosaicError {
    pub(crate) fn stamp_load(locator: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::StampLoad {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn frame_render(time_step: i64, reason: impl std::fmt::Display) -> Self {
        Self::FrameRender {
            time_step,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MosaicError>;
