use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cadence::CadenceResolver;
use crate::composite::{composite, Mosaic};
use crate::consts::PARALLEL_TIME_STEP_THRESHOLD;
use crate::error::{MosaicError, Result};
use crate::io::source::StampSourceResolver;
use crate::io::{RasterWriter, StampReader};
use crate::stamp::{DetectorId, Stamp};

use super::config::MosaicConfig;
use super::types::{MosaicRunSummary, NoOpReporter, PipelineStage, ProgressReporter};

/// Loaded, validated stamps for one detector, ready to composite.
///
/// Each stamp is read exactly once, however many time steps are requested.
pub struct MosaicPipeline {
    stamps: Vec<Stamp>,
    locators: Vec<String>,
    detector_id: DetectorId,
    config: MosaicConfig,
}

/// Run `f` inside a dedicated pool of `workers` threads (0 = rayon default).
fn in_pool<T, F>(workers: usize, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| MosaicError::InvalidConfig(format!("cannot start worker pool: {e}")))?;
    pool.install(f)
}

impl MosaicPipeline {
    /// Resolve and read every source in `config.sources`.
    pub fn load(
        config: &MosaicConfig,
        resolver: &StampSourceResolver,
        reader: &dyn StampReader,
    ) -> Result<Self> {
        Self::load_reported(config, resolver, reader, Arc::new(NoOpReporter))
    }

    pub fn load_reported(
        config: &MosaicConfig,
        resolver: &StampSourceResolver,
        reader: &dyn StampReader,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Self> {
        config.validate()?;
        if config.sources.is_empty() {
            return Err(MosaicError::EmptySequence);
        }

        let total = config.sources.len();
        info!(stamps = total, workers = config.workers, "Loading stamps");
        reporter.begin_stage(PipelineStage::Loading, Some(total));

        let done = AtomicUsize::new(0);
        let load_one = |locator: &String| -> Result<Stamp> {
            let path = resolver.resolve(locator)?;
            let stamp = reader.read(&path)?;
            reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
            Ok(stamp)
        };

        // Both paths keep input order, which the overlap policy depends on.
        let stamps = if config.is_parallel() {
            in_pool(config.workers, || {
                config.sources.par_iter().map(load_one).collect::<Result<Vec<_>>>()
            })?
        } else {
            config.sources.iter().map(load_one).collect::<Result<Vec<_>>>()?
        };
        reporter.finish_stage();

        Self::from_stamps(stamps, config.sources.clone(), config.clone())
    }

    /// Build a pipeline from stamps already in memory. `locators` names each
    /// stamp in error messages.
    pub fn from_stamps(
        stamps: Vec<Stamp>,
        locators: Vec<String>,
        config: MosaicConfig,
    ) -> Result<Self> {
        config.validate()?;
        let first = stamps.first().ok_or(MosaicError::EmptySequence)?;
        let detector_id = first.detector_id;

        let locators: Vec<String> = if locators.len() == stamps.len() {
            locators
        } else {
            (0..stamps.len()).map(|i| format!("stamp #{i}")).collect()
        };

        for (stamp, locator) in stamps.iter().zip(&locators) {
            if stamp.detector_id != detector_id {
                return Err(MosaicError::DetectorMismatch {
                    expected: detector_id,
                    found: stamp.detector_id,
                    locator: locator.clone(),
                });
            }
            if !config
                .detector
                .contains(stamp.origin, stamp.width(), stamp.height())
            {
                return Err(MosaicError::stamp_load(
                    locator,
                    format!(
                        "{}x{} footprint at column {}, row {} exceeds the {}x{} detector",
                        stamp.width(),
                        stamp.height(),
                        stamp.origin.column,
                        stamp.origin.row,
                        config.detector.width,
                        config.detector.height
                    ),
                ));
            }
        }

        info!(detector = %detector_id, stamps = stamps.len(), "Stamps validated");
        Ok(Self {
            stamps,
            locators,
            detector_id,
            config,
        })
    }

    pub fn detector_id(&self) -> DetectorId {
        self.detector_id
    }

    pub fn stamps(&self) -> &[Stamp] {
        &self.stamps
    }

    pub fn locators(&self) -> &[String] {
        &self.locators
    }

    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    pub fn cadence_resolver(&self) -> Result<CadenceResolver<'_>> {
        CadenceResolver::new(&self.stamps, self.config.quality_mask)
    }

    /// Time steps selected by the configured request, ascending.
    pub fn time_steps(&self) -> Result<Vec<i64>> {
        self.cadence_resolver()?
            .resolve(&self.config.time_steps, self.config.step)
    }

    /// Lazily composite each requested time step in ascending order.
    ///
    /// Nothing is retained between items, so "all" over thousands of time
    /// steps needs memory for one mosaic at a time.
    pub fn mosaics(&self) -> Result<impl Iterator<Item = Result<Mosaic>> + '_> {
        let resolver = self.cadence_resolver()?;
        let steps = resolver.resolve(&self.config.time_steps, self.config.step)?;
        Ok(steps
            .into_iter()
            .map(move |t| self.composite_step(&resolver, t)))
    }

    /// Composite a single time step, which must be present in some stamp.
    pub fn mosaic_at(&self, time_step: i64) -> Result<Mosaic> {
        let resolver = self.cadence_resolver()?;
        if resolver.union().binary_search(&time_step).is_err() {
            return Err(MosaicError::UnknownTimeStep(time_step));
        }
        self.composite_step(&resolver, time_step)
    }

    fn composite_step(&self, resolver: &CadenceResolver<'_>, time_step: i64) -> Result<Mosaic> {
        let contributions = resolver.contributions(time_step);
        composite(
            &self.config.detector,
            self.detector_id,
            time_step,
            &contributions,
            self.config.overlap,
        )
    }
}

/// Composite every requested time step and hand each mosaic to `writer`.
pub fn run_mosaic(pipeline: &MosaicPipeline, writer: &dyn RasterWriter) -> Result<MosaicRunSummary> {
    run_mosaic_reported(pipeline, writer, Arc::new(NoOpReporter))
}

/// Composite and write with a thread-safe progress reporter.
///
/// With `workers != 1` time steps are composited concurrently; each worker
/// finishes its mosaic before writing it. Write order is arbitrary, the
/// returned summary is sorted by time step. The first error aborts the run.
pub fn run_mosaic_reported(
    pipeline: &MosaicPipeline,
    writer: &dyn RasterWriter,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<MosaicRunSummary> {
    reporter.begin_stage(PipelineStage::Resolving, None);
    let resolver = pipeline.cadence_resolver()?;
    let steps = resolver.resolve(&pipeline.config.time_steps, pipeline.config.step)?;
    reporter.finish_stage();

    info!(
        detector = %pipeline.detector_id,
        time_steps = steps.len(),
        request = %pipeline.config.time_steps,
        "Compositing mosaics"
    );
    reporter.begin_stage(PipelineStage::Compositing, Some(steps.len()));

    let done = AtomicUsize::new(0);
    let build_and_write = |&time_step: &i64| -> Result<(i64, PathBuf)> {
        let mosaic = pipeline.composite_step(&resolver, time_step)?;
        let path = writer.write(&mosaic)?;
        debug!(time_step, path = %path.display(), "Mosaic written");
        reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
        Ok((time_step, path))
    };

    let parallel =
        pipeline.config.is_parallel() && steps.len() >= PARALLEL_TIME_STEP_THRESHOLD;
    let mut written = if parallel {
        in_pool(pipeline.config.workers, || {
            steps
                .par_iter()
                .map(build_and_write)
                .collect::<Result<Vec<_>>>()
        })?
    } else {
        steps
            .iter()
            .map(build_and_write)
            .collect::<Result<Vec<_>>>()?
    };
    reporter.finish_stage();

    written.sort_by_key(|(t, _)| *t);
    info!(written = written.len(), "Mosaic run complete");
    Ok(MosaicRunSummary { written })
}
