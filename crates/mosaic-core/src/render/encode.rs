use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use image::codecs::gif::{self, Repeat};
use image::{Delay, Frame};
use tracing::{debug, info};

use crate::error::{MosaicError, Result};
use crate::io::image_io::{save_frame_png, to_rgba_image};

use super::RenderedFrame;

/// Consumes rendered frames in order and produces an animation.
pub trait FrameEncoder {
    fn encode_frame(&mut self, frame: &RenderedFrame) -> Result<()>;

    /// Flush and close the output. No frames may follow.
    fn finish(&mut self) -> Result<()>;
}

/// Pick an encoder from the output path: `.gif`, `.mp4`/`.mov`/`.mkv`, or a
/// directory (no extension) for a PNG sequence.
pub fn encoder_for_path(
    path: &Path,
    fps: f32,
    background: [u8; 3],
) -> Result<Box<dyn FrameEncoder>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("gif") => Ok(Box::new(GifEncoder::create(path, fps)?)),
        Some("mp4" | "mov" | "mkv") => Ok(Box::new(FfmpegEncoder::new(path, fps, background))),
        None => Ok(Box::new(PngSequenceEncoder::new(path))),
        Some(_) if path.is_dir() => Ok(Box::new(PngSequenceEncoder::new(path))),
        Some(other) => Err(MosaicError::InvalidConfig(format!(
            "unsupported animation format '.{other}' (use .gif, .mp4, .mov, .mkv or a directory)"
        ))),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GIF
// ---------------------------------------------------------------------------

/// Output file shared with the GIF encoder. The encoder writes its trailer
/// when dropped and ignores errors there, so the file is flushed through
/// this handle afterwards.
#[derive(Clone)]
struct SharedFile(Arc<Mutex<BufWriter<File>>>);

impl SharedFile {
    fn lock(&self) -> io::Result<MutexGuard<'_, BufWriter<File>>> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("GIF output lock poisoned"))
    }
}

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

/// Looping animated GIF; each frame is shown for `1 / fps` seconds.
pub struct GifEncoder {
    encoder: Option<gif::GifEncoder<SharedFile>>,
    file: SharedFile,
    delay: Delay,
    frames: usize,
}

/// Quantizer speed passed to the GIF encoder (1 = best, 30 = fastest).
const GIF_QUANTIZER_SPEED: i32 = 10;

impl GifEncoder {
    pub fn create(path: &Path, fps: f32) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MosaicError::InvalidConfig(format!("fps must be positive, got {fps}")));
        }
        ensure_parent_dir(path)?;
        let file = SharedFile(Arc::new(Mutex::new(BufWriter::new(File::create(path)?))));
        let mut encoder = gif::GifEncoder::new_with_speed(file.clone(), GIF_QUANTIZER_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;

        Ok(Self {
            encoder: Some(encoder),
            file,
            delay: Delay::from_saturating_duration(Duration::from_secs_f32(1.0 / fps)),
            frames: 0,
        })
    }
}

impl FrameEncoder for GifEncoder {
    fn encode_frame(&mut self, frame: &RenderedFrame) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| MosaicError::Encode("GIF encoder is already finished".into()))?;
        let image = to_rgba_image(frame)?;
        encoder.encode_frame(Frame::from_parts(image, 0, 0, self.delay))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        drop(encoder);
        self.file
            .flush()
            .map_err(|e| MosaicError::Encode(format!("failed to finish GIF: {e}")))?;
        debug!(frames = self.frames, "GIF finished");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ffmpeg (MP4 / MOV / MKV)
// ---------------------------------------------------------------------------

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

struct FfmpegProcess {
    child: Child,
    stdin: ChildStdin,
    /// Frame size the process was started with, before padding.
    width: u32,
    height: u32,
    padded_width: u32,
    padded_height: u32,
}

/// Streams raw RGBA frames into a system `ffmpeg` producing H.264 video.
///
/// yuv420p needs even dimensions, so odd frames are padded on the right and
/// bottom with the background colour. The process starts with the first frame.
pub struct FfmpegEncoder {
    out_path: PathBuf,
    fps: f32,
    background: [u8; 3],
    process: Option<FfmpegProcess>,
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    pub fn new(out_path: impl Into<PathBuf>, fps: f32, background: [u8; 3]) -> Self {
        Self {
            out_path: out_path.into(),
            fps,
            background,
            process: None,
            scratch: Vec::new(),
        }
    }

    fn spawn(&self, width: u32, height: u32) -> Result<FfmpegProcess> {
        ensure_parent_dir(&self.out_path)?;
        if !is_ffmpeg_on_path() {
            return Err(MosaicError::Encode(
                "ffmpeg is required for video output, but was not found on PATH".into(),
            ));
        }

        let padded_width = width + width % 2;
        let padded_height = height + height % 2;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{padded_width}x{padded_height}"),
                "-r",
                &self.fps.to_string(),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ])
            .arg(&self.out_path);

        let mut child = cmd
            .spawn()
            .map_err(|e| MosaicError::Encode(format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MosaicError::Encode("failed to open ffmpeg stdin".into()))?;

        info!(
            path = %self.out_path.display(),
            width = padded_width,
            height = padded_height,
            fps = self.fps,
            "Started ffmpeg"
        );
        Ok(FfmpegProcess {
            child,
            stdin,
            width,
            height,
            padded_width,
            padded_height,
        })
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn encode_frame(&mut self, frame: &RenderedFrame) -> Result<()> {
        if self.process.is_none() {
            self.process = Some(self.spawn(frame.width, frame.height)?);
        }
        let Some(process) = self.process.as_mut() else {
            return Err(MosaicError::Encode("ffmpeg is not running".into()));
        };

        if frame.width != process.width || frame.height != process.height {
            return Err(MosaicError::Encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, process.width, process.height
            )));
        }

        let [r, g, b] = self.background;
        let row_bytes = frame.width as usize * 4;
        let padded_row_bytes = process.padded_width as usize * 4;
        self.scratch.clear();
        for row in frame.data.chunks_exact(row_bytes) {
            self.scratch.extend_from_slice(row);
            for _ in process.width..process.padded_width {
                self.scratch.extend_from_slice(&[r, g, b, 255]);
            }
        }
        for _ in process.height..process.padded_height {
            for _ in 0..padded_row_bytes / 4 {
                self.scratch.extend_from_slice(&[r, g, b, 255]);
            }
        }

        process
            .stdin
            .write_all(&self.scratch)
            .map_err(|e| MosaicError::Encode(format!("failed to write frame to ffmpeg: {e}")))
    }

    fn finish(&mut self) -> Result<()> {
        let Some(process) = self.process.take() else {
            return Ok(());
        };
        drop(process.stdin);

        let output = process
            .child
            .wait_with_output()
            .map_err(|e| MosaicError::Encode(format!("failed to wait for ffmpeg: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MosaicError::Encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PNG sequence
// ---------------------------------------------------------------------------

/// Writes `frame-{time_step}.png` files into a directory.
pub struct PngSequenceEncoder {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl PngSequenceEncoder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn path_for(&self, time_step: i64) -> PathBuf {
        self.dir.join(format!("frame-{time_step}.png"))
    }

    /// Files written so far, in frame order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl FrameEncoder for PngSequenceEncoder {
    fn encode_frame(&mut self, frame: &RenderedFrame) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(frame.time_step);
        save_frame_png(frame, &path)?;
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        debug!(frames = self.written.len(), dir = %self.dir.display(), "PNG sequence finished");
        Ok(())
    }
}
