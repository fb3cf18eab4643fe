use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{Array2, Array3};

use crate::error::{MosaicError, Result};
use crate::io::StampReader;
use crate::stamp::{DetectorId, Mission, PixelOrigin, Stamp};

pub const STAMP_HEADER_SIZE: usize = 40;
pub const STAMP_MAGIC: &[u8; 8] = b"PIXSTAMP";
pub const STAMP_VERSION: u16 = 1;

pub(crate) const FLAG_QUALITY: u8 = 0b01;
pub(crate) const FLAG_APERTURE: u8 = 0b10;

/// Stamp container header (40 bytes, little-endian).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StampHeader {
    pub detector_id: DetectorId,
    pub origin: PixelOrigin,
    pub width: u32,
    pub height: u32,
    pub time_step_count: u32,
    pub has_quality: bool,
    pub has_aperture: bool,
}

impl StampHeader {
    pub fn pixels_per_frame(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes following the header, or `None` if the sizes overflow.
    pub fn body_byte_size(&self) -> Option<usize> {
        let n = self.time_step_count as usize;
        let pixels = self.pixels_per_frame();
        let time_steps = n.checked_mul(8)?;
        let quality = if self.has_quality { n.checked_mul(4)? } else { 0 };
        let aperture = if self.has_aperture { pixels } else { 0 };
        let data = n.checked_mul(pixels)?.checked_mul(4)?;
        time_steps
            .checked_add(quality)?
            .checked_add(aperture)?
            .checked_add(data)
    }

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.has_quality {
            flags |= FLAG_QUALITY;
        }
        if self.has_aperture {
            flags |= FLAG_APERTURE;
        }
        flags
    }
}

pub(crate) fn mission_code(mission: Mission) -> u8 {
    match mission {
        Mission::K2 => 0,
        Mission::Kepler => 1,
    }
}

fn mission_from_code(code: u8) -> Result<Mission> {
    match code {
        0 => Ok(Mission::K2),
        1 => Ok(Mission::Kepler),
        other => Err(MosaicError::InvalidStamp(format!(
            "unknown mission code {other}"
        ))),
    }
}

/// Parse the fixed-size header from the first `STAMP_HEADER_SIZE` bytes.
pub fn parse_header(buf: &[u8]) -> Result<StampHeader> {
    if buf.len() < STAMP_HEADER_SIZE {
        return Err(MosaicError::InvalidStamp(
            "file too small for stamp header".into(),
        ));
    }
    if &buf[0..8] != STAMP_MAGIC {
        return Err(MosaicError::InvalidStamp("missing PIXSTAMP magic".into()));
    }

    let mut cursor = Cursor::new(&buf[8..STAMP_HEADER_SIZE]);
    let version = cursor.read_u16::<LittleEndian>()?;
    if version != STAMP_VERSION {
        return Err(MosaicError::InvalidStamp(format!(
            "unsupported container version {version}"
        )));
    }
    let mission = mission_from_code(cursor.read_u8()?)?;
    let flags = cursor.read_u8()?;
    let campaign = cursor.read_u32::<LittleEndian>()?;
    let channel = cursor.read_u32::<LittleEndian>()?;
    let column = cursor.read_u32::<LittleEndian>()? as usize;
    let row = cursor.read_u32::<LittleEndian>()? as usize;
    let width = cursor.read_u32::<LittleEndian>()?;
    let height = cursor.read_u32::<LittleEndian>()?;
    let time_step_count = cursor.read_u32::<LittleEndian>()?;

    if width == 0 || height == 0 {
        return Err(MosaicError::InvalidStamp(format!(
            "empty footprint {width}x{height}"
        )));
    }

    Ok(StampHeader {
        detector_id: DetectorId::new(mission, campaign, channel),
        origin: PixelOrigin { column, row },
        width,
        height,
        time_step_count,
        has_quality: flags & FLAG_QUALITY != 0,
        has_aperture: flags & FLAG_APERTURE != 0,
    })
}

/// Read only the header of a stamp file.
pub fn read_header(path: &Path) -> Result<StampHeader> {
    let mut buf = [0u8; STAMP_HEADER_SIZE];
    File::open(path)?.read_exact(&mut buf)?;
    parse_header(&buf)
}

/// Memory-mapped stamp container.
pub struct StampFile {
    mmap: Mmap,
    pub header: StampHeader,
}

impl StampFile {
    /// Open a stamp file and validate its size against the header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let header = parse_header(&mmap)?;
        let body = header
            .body_byte_size()
            .ok_or_else(|| MosaicError::InvalidStamp("stamp dimensions too large".into()))?;
        let expected = STAMP_HEADER_SIZE + body;
        if mmap.len() < expected {
            return Err(MosaicError::InvalidStamp(format!(
                "file truncated: expected at least {} bytes, got {}",
                expected,
                mmap.len()
            )));
        }

        Ok(Self { mmap, header })
    }

    /// Decode the whole file into a `Stamp`.
    pub fn to_stamp(&self) -> Result<Stamp> {
        let h = &self.header;
        let n = h.time_step_count as usize;
        let (w, ht) = (h.width as usize, h.height as usize);
        let pixels = h.pixels_per_frame();

        let body = &self.mmap[STAMP_HEADER_SIZE..];
        let (ts_bytes, body) = body.split_at(n * 8);
        let mut time_steps = vec![0i64; n];
        LittleEndian::read_i64_into(ts_bytes, &mut time_steps);

        let (quality, body) = if h.has_quality {
            let (flag_bytes, rest) = body.split_at(n * 4);
            let mut flags = vec![0u32; n];
            LittleEndian::read_u32_into(flag_bytes, &mut flags);
            (Some(flags), rest)
        } else {
            (None, body)
        };

        let (aperture, body) = if h.has_aperture {
            let (mask_bytes, rest) = body.split_at(pixels);
            let mask: Vec<bool> = mask_bytes.iter().map(|&b| b != 0).collect();
            let mask = Array2::from_shape_vec((ht, w), mask)
                .map_err(|e| MosaicError::InvalidStamp(e.to_string()))?;
            (Some(mask), rest)
        } else {
            (None, body)
        };

        let mut data = vec![0f32; n * pixels];
        LittleEndian::read_f32_into(&body[..n * pixels * 4], &mut data);
        let series = Array3::from_shape_vec((n, ht, w), data)
            .map_err(|e| MosaicError::InvalidStamp(e.to_string()))?;

        let mut stamp = Stamp::new(h.detector_id, h.origin, time_steps, series)?;
        if let Some(flags) = quality {
            stamp = stamp.with_quality_flags(flags)?;
        }
        if let Some(mask) = aperture {
            stamp = stamp.with_aperture(mask)?;
        }
        Ok(stamp)
    }
}

/// Reads stamps from the binary container format.
#[derive(Clone, Copy, Debug, Default)]
pub struct StampFileReader;

impl StampReader for StampFileReader {
    fn read(&self, path: &Path) -> Result<Stamp> {
        StampFile::open(path)
            .and_then(|file| file.to_stamp())
            .map_err(|e| MosaicError::stamp_load(path.display(), e))
    }
}
