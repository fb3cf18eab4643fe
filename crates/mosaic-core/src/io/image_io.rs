use std::path::Path;

use image::{ImageFormat, RgbaImage};

use crate::error::{MosaicError, Result};
use crate::render::RenderedFrame;

/// Convert a rendered frame into an `image` buffer.
pub fn to_rgba_image(frame: &RenderedFrame) -> Result<RgbaImage> {
    RgbaImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
        MosaicError::frame_render(frame.time_step, "pixel buffer does not match dimensions")
    })
}

/// Save a rendered frame as 8-bit RGBA PNG.
pub fn save_frame_png(frame: &RenderedFrame, path: &Path) -> Result<()> {
    let img = to_rgba_image(frame)?;
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
