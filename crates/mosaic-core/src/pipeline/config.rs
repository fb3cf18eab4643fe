use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cadence::TimeStepRequest;
use crate::composite::OverlapPolicy;
use crate::consts::DEFAULT_OUTPUT_PREFIX;
use crate::error::{MosaicError, Result};
use crate::stamp::DetectorGrid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MosaicConfig {
    /// Stamp locators (paths or archive URLs), in compositing order.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub time_steps: TimeStepRequest,
    /// Keep every Nth resolved time step.
    #[serde(default = "default_step")]
    pub step: usize,
    #[serde(default)]
    pub overlap: OverlapPolicy,
    #[serde(default)]
    pub detector: DetectorGrid,
    /// Quality bits that mark a sample absent.
    #[serde(default = "default_quality_mask")]
    pub quality_mask: u32,
    /// Worker threads; 1 runs sequentially, 0 uses every core.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub lookup: SourceLookupConfig,
}

fn default_step() -> usize {
    1
}

fn default_quality_mask() -> u32 {
    u32::MAX
}

fn default_workers() -> usize {
    1
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            time_steps: TimeStepRequest::default(),
            step: default_step(),
            overlap: OverlapPolicy::default(),
            detector: DetectorGrid::default(),
            quality_mask: default_quality_mask(),
            workers: default_workers(),
            output: OutputConfig::default(),
            lookup: SourceLookupConfig::default(),
        }
    }
}

impl MosaicConfig {
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(MosaicError::InvalidConfig("step must be at least 1".into()));
        }
        if self.detector.width == 0 || self.detector.height == 0 {
            return Err(MosaicError::InvalidConfig(format!(
                "detector grid {}x{} is empty",
                self.detector.width, self.detector.height
            )));
        }
        if self.output.prefix.is_empty() {
            return Err(MosaicError::InvalidConfig("output prefix is empty".into()));
        }
        Ok(())
    }

    /// True when compositing should use a worker pool.
    pub fn is_parallel(&self) -> bool {
        self.workers != 1
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

/// Where to look for stamps that are not plain local paths.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceLookupConfig {
    pub local_override: Option<PathBuf>,
    pub mirror: Option<PathBuf>,
}
