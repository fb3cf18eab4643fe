use std::sync::Arc;

use ndarray::{s, ArrayView2};
use tracing::{debug, info};

use crate::composite::Mosaic;
use crate::error::{MosaicError, Result};
use crate::pipeline::{NoOpReporter, PipelineStage, ProgressReporter};

use super::config::{PixelRange, RenderConfig};
use super::encode::FrameEncoder;
use super::sequence::FrameSequence;
use super::stretch::{cut_levels, stretch_levels, NO_DATA_LEVEL};
use super::RenderedFrame;

/// Crop window and cut levels shared by every frame of one animation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameLayout {
    pub rows: PixelRange,
    pub cols: PixelRange,
    pub min_cut: f32,
    pub max_cut: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationSummary {
    /// Encoded time steps, in frame order.
    pub time_steps: Vec<i64>,
    pub layout: FrameLayout,
    pub width: u32,
    pub height: u32,
}

impl AnimationSummary {
    pub fn frames(&self) -> usize {
        self.time_steps.len()
    }
}

/// Rows and columns spanned by observed pixels, or `None` if there are none.
pub fn observed_bounds(data: ArrayView2<'_, f32>) -> Option<(PixelRange, PixelRange)> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for ((r, c), v) in data.indexed_iter() {
        if v.is_nan() {
            continue;
        }
        bounds = Some(match bounds {
            None => (r, r, c, c),
            Some((r0, r1, c0, c1)) => (r0.min(r), r1.max(r), c0.min(c), c1.max(c)),
        });
    }
    bounds.map(|(r0, r1, c0, c1)| (PixelRange::new(r0, r1 + 1), PixelRange::new(c0, c1 + 1)))
}

/// Fix the crop window and cut levels from the first frame that has any
/// observed pixel. Configured values take precedence.
pub fn plan_layout(sequence: &FrameSequence, config: &RenderConfig) -> Result<FrameLayout> {
    for source in sequence.frames() {
        let time_step = source.time_step();
        let mosaic = source
            .load()
            .map_err(|e| MosaicError::frame_render(time_step, e))?;
        let Some((observed_rows, observed_cols)) = observed_bounds(mosaic.data.view()) else {
            debug!(time_step, "Frame has no observed pixels, trying next");
            continue;
        };

        let rows = config.rows.unwrap_or(observed_rows);
        let cols = config.cols.unwrap_or(observed_cols);
        check_crop(&mosaic, rows, cols)?;

        let window = mosaic.data.slice(s![rows.start..rows.end, cols.start..cols.end]);
        let (min_cut, max_cut) = cut_levels(window, &config.stretch)
            .or_else(|| cut_levels(mosaic.data.view(), &config.stretch))
            .ok_or_else(|| MosaicError::frame_render(time_step, "no observed pixels"))?;

        info!(
            time_step,
            rows = %rows,
            cols = %cols,
            min_cut,
            max_cut,
            scale = %config.stretch.scale,
            "Animation layout"
        );
        return Ok(FrameLayout {
            rows,
            cols,
            min_cut,
            max_cut,
        });
    }

    let first = sequence.frames().first().ok_or(MosaicError::EmptySequence)?;
    Err(MosaicError::frame_render(
        first.time_step(),
        "no frame in the sequence has observed pixels",
    ))
}

fn check_crop(mosaic: &Mosaic, rows: PixelRange, cols: PixelRange) -> Result<()> {
    if rows.is_empty() || cols.is_empty() || rows.end > mosaic.height() || cols.end > mosaic.width() {
        return Err(MosaicError::frame_render(
            mosaic.time_step,
            format!(
                "crop rows {rows}, cols {cols} outside the {}x{} raster",
                mosaic.width(),
                mosaic.height()
            ),
        ));
    }
    Ok(())
}

/// Crop, stretch, flip and zoom one mosaic into an RGBA frame.
///
/// Detector row 0 ends up at the bottom of the picture.
pub fn render_frame(
    mosaic: &Mosaic,
    layout: &FrameLayout,
    config: &RenderConfig,
) -> Result<RenderedFrame> {
    check_crop(mosaic, layout.rows, layout.cols)?;
    let window = mosaic
        .data
        .slice(s![layout.rows.start..layout.rows.end, layout.cols.start..layout.cols.end]);
    let levels = stretch_levels(window, layout.min_cut, layout.max_cut, &config.stretch);

    let zoom = config.zoom as usize;
    let (src_h, src_w) = levels.dim();
    let (width, height) = (src_w * zoom, src_h * zoom);
    let [br, bg, bb] = config.background;

    let mut data = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let src_row = src_h - 1 - y / zoom;
        for x in 0..width {
            match levels[[src_row, x / zoom]] {
                NO_DATA_LEVEL => data.extend_from_slice(&[br, bg, bb, 255]),
                level => data.extend_from_slice(&[level, level, level, 255]),
            }
        }
    }

    Ok(RenderedFrame {
        time_step: mosaic.time_step,
        width: width as u32,
        height: height as u32,
        data,
    })
}

/// Render every frame of `sequence` in order and feed it to `encoder`.
pub fn assemble(
    sequence: &FrameSequence,
    config: &RenderConfig,
    encoder: &mut dyn FrameEncoder,
) -> Result<AnimationSummary> {
    assemble_reported(sequence, config, encoder, Arc::new(NoOpReporter))
}

/// Like `assemble`, reporting per-frame progress.
///
/// The first frame that cannot be loaded, rendered or encoded aborts with
/// `FrameRender`; frames already handed to the encoder stay written.
pub fn assemble_reported(
    sequence: &FrameSequence,
    config: &RenderConfig,
    encoder: &mut dyn FrameEncoder,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<AnimationSummary> {
    config.validate()?;
    let layout = plan_layout(sequence, config)?;

    info!(
        detector = %sequence.detector_id(),
        frames = sequence.len(),
        fps = config.fps,
        zoom = config.zoom,
        "Assembling animation"
    );
    reporter.begin_stage(PipelineStage::Rendering, Some(sequence.len()));

    let mut time_steps = Vec::with_capacity(sequence.len());
    let mut size = (0, 0);
    for (i, source) in sequence.frames().iter().enumerate() {
        let time_step = source.time_step();
        let frame = source
            .load()
            .and_then(|mosaic| render_frame(&mosaic, &layout, config))
            .map_err(|e| as_frame_error(time_step, e))?;
        encoder
            .encode_frame(&frame)
            .map_err(|e| as_frame_error(time_step, e))?;

        size = (frame.width, frame.height);
        time_steps.push(time_step);
        reporter.advance(i + 1);
    }

    let last = time_steps.last().copied().unwrap_or_default();
    encoder.finish().map_err(|e| as_frame_error(last, e))?;
    reporter.finish_stage();

    info!(frames = time_steps.len(), width = size.0, height = size.1, "Animation complete");
    Ok(AnimationSummary {
        time_steps,
        layout,
        width: size.0,
        height: size.1,
    })
}

fn as_frame_error(time_step: i64, err: MosaicError) -> MosaicError {
    match err {
        e @ MosaicError::FrameRender { .. } => e,
        other => MosaicError::frame_render(time_step, other),
    }
}
