use std::path::PathBuf;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Loading,
    Resolving,
    Compositing,
    Rendering,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading stamps"),
            Self::Resolving => write!(f, "Resolving time steps"),
            Self::Compositing => write!(f, "Compositing"),
            Self::Rendering => write!(f, "Rendering frames"),
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (stamps, time steps, frames), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items_done` work items within the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when a caller does not supply one.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Rasters written by one mosaic run, ascending by time step.
#[derive(Clone, Debug, Default)]
pub struct MosaicRunSummary {
    pub written: Vec<(i64, PathBuf)>,
}

impl MosaicRunSummary {
    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.written.iter().map(|(_, p)| p)
    }
}
