pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{run_mosaic, run_mosaic_reported, MosaicPipeline};
pub use types::{MosaicRunSummary, NoOpReporter, PipelineStage, ProgressReporter};
