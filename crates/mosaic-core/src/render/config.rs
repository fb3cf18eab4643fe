use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_FPS, DEFAULT_HIGH_PERCENTILE, DEFAULT_LOG_EXPONENT, DEFAULT_LOW_PERCENTILE,
};
use crate::error::{MosaicError, Result};

/// Intensity scaling applied after clipping to the cut levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Linear,
    /// `ln(a*x + 1) / ln(a + 1)`.
    #[default]
    Log,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Log => write!(f, "log"),
        }
    }
}

impl FromStr for Scale {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "lin" => Ok(Self::Linear),
            "log" => Ok(Self::Log),
            other => Err(MosaicError::InvalidConfig(format!(
                "unknown scale '{other}' (expected linear or log)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StretchConfig {
    #[serde(default)]
    pub scale: Scale,
    /// Fixed cut levels, set together. When both are missing they come from
    /// percentiles of the first frame that has observed pixels.
    #[serde(default)]
    pub min_cut: Option<f32>,
    #[serde(default)]
    pub max_cut: Option<f32>,
    #[serde(default = "default_low_percentile")]
    pub low_percentile: f32,
    #[serde(default = "default_high_percentile")]
    pub high_percentile: f32,
    #[serde(default = "default_log_exponent")]
    pub log_exponent: f32,
}

fn default_low_percentile() -> f32 {
    DEFAULT_LOW_PERCENTILE
}

fn default_high_percentile() -> f32 {
    DEFAULT_HIGH_PERCENTILE
}

fn default_log_exponent() -> f32 {
    DEFAULT_LOG_EXPONENT
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            scale: Scale::default(),
            min_cut: None,
            max_cut: None,
            low_percentile: DEFAULT_LOW_PERCENTILE,
            high_percentile: DEFAULT_HIGH_PERCENTILE,
            log_exponent: DEFAULT_LOG_EXPONENT,
        }
    }
}

impl StretchConfig {
    /// Fixed cut levels, if both are configured.
    pub fn fixed_cuts(&self) -> Option<(f32, f32)> {
        self.min_cut.zip(self.max_cut)
    }
}

/// Half-open pixel interval `start..end` on one detector axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRange {
    pub start: usize,
    pub end: usize,
}

impl PixelRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for PixelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl FromStr for PixelRange {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MosaicError::InvalidConfig(format!("'{s}' is not a range like 100..200"));
        let (a, b) = s.split_once("..").ok_or_else(invalid)?;
        let start = a.trim().parse().map_err(|_| invalid())?;
        let end = b.trim().parse().map_err(|_| invalid())?;
        let range = Self { start, end };
        if range.is_empty() {
            return Err(invalid());
        }
        Ok(range)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub stretch: StretchConfig,
    #[serde(default = "default_fps")]
    pub fps: f32,
    /// Detector rows to show; defaults to the rows holding observed pixels
    /// in the first frame.
    #[serde(default)]
    pub rows: Option<PixelRange>,
    #[serde(default)]
    pub cols: Option<PixelRange>,
    /// Integer nearest-neighbour upscale factor.
    #[serde(default = "default_zoom")]
    pub zoom: u32,
    /// RGB shown where no stamp observed the sky.
    #[serde(default)]
    pub background: [u8; 3],
}

fn default_fps() -> f32 {
    DEFAULT_FPS
}

fn default_zoom() -> u32 {
    1
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            stretch: StretchConfig::default(),
            fps: DEFAULT_FPS,
            rows: None,
            cols: None,
            zoom: 1,
            background: [0, 0, 0],
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(MosaicError::InvalidConfig(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if self.zoom == 0 {
            return Err(MosaicError::InvalidConfig("zoom must be at least 1".into()));
        }
        let s = &self.stretch;
        if !(0.0..=100.0).contains(&s.low_percentile)
            || !(0.0..=100.0).contains(&s.high_percentile)
            || s.low_percentile > s.high_percentile
        {
            return Err(MosaicError::InvalidConfig(format!(
                "percentiles {}..{} must satisfy 0 <= low <= high <= 100",
                s.low_percentile, s.high_percentile
            )));
        }
        if s.min_cut.is_some() != s.max_cut.is_some() {
            return Err(MosaicError::InvalidConfig(
                "min_cut and max_cut must be set together".into(),
            ));
        }
        if let Some((lo, hi)) = s.fixed_cuts() {
            if lo >= hi {
                return Err(MosaicError::InvalidConfig(format!(
                    "min cut {lo} must be below max cut {hi}"
                )));
            }
        }
        if s.scale == Scale::Log && s.log_exponent <= 0.0 {
            return Err(MosaicError::InvalidConfig(
                "log exponent must be positive".into(),
            ));
        }
        for range in [self.rows, self.cols].into_iter().flatten() {
            if range.is_empty() {
                return Err(MosaicError::InvalidConfig(format!("empty crop range {range}")));
            }
        }
        Ok(())
    }
}
