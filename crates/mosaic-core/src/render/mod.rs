pub mod animation;
pub mod config;
pub mod encode;
pub mod sequence;
pub mod stretch;

pub use animation::{assemble, assemble_reported, AnimationSummary};
pub use config::{RenderConfig, Scale, StretchConfig};
pub use encode::{encoder_for_path, FfmpegEncoder, FrameEncoder, GifEncoder, PngSequenceEncoder};
pub use sequence::{FrameSequence, FrameSource};

/// One 8-bit RGBA animation frame, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedFrame {
    pub time_step: i64,
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl RenderedFrame {
    /// RGBA bytes of the pixel at (`x`, `y`), `y = 0` being the top row.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}
