//! Kepler/K2 target pixel files (TPFs), as distributed by the archive.
//!
//! A TPF is a FITS file, usually gzip-compressed, with three HDUs:
//!
//! 0. primary header: `CHANNEL` plus `CAMPAIGN` (K2) or `QUARTER` (Kepler);
//! 1. binary table, one row per cadence: `CADENCENO`, `FLUX` (an image per
//!    row, shape given by `TDIMn`), `QUALITY`. The `1CRVnP`/`2CRVnP` keys of
//!    the `FLUX` column give the detector column/row of its first pixel;
//! 2. aperture image (`BITPIX = 32`), nonzero where pixels were collected.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::ops::Deref;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use flate2::read::GzDecoder;
use memmap2::Mmap;
use ndarray::{Array2, Array3};
use tracing::debug;

use crate::error::{MosaicError, Result};
use crate::io::fits::{block_padded, read_fits_header, FitsHeader};
use crate::io::stamp_file::StampHeader;
use crate::io::StampReader;
use crate::stamp::{DetectorId, Mission, PixelOrigin, Stamp};

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const FLUX_COLUMN: &str = "FLUX";
const CADENCE_COLUMN: &str = "CADENCENO";
const QUALITY_COLUMN: &str = "QUALITY";

/// One binary table column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableColumn {
    /// 1-based column number, as used in `TTYPEn`/`TFORMn`.
    pub index: usize,
    pub name: String,
    /// Byte offset within a row.
    pub offset: usize,
    pub repeat: usize,
    pub code: char,
}

/// Bytes per element of a `TFORM` type code; `X` is handled by the caller.
fn element_size(code: char) -> Option<usize> {
    match code {
        'L' | 'B' | 'A' => Some(1),
        'I' => Some(2),
        'J' | 'E' => Some(4),
        'K' | 'D' | 'C' | 'P' => Some(8),
        'M' | 'Q' => Some(16),
        _ => None,
    }
}

/// Split `TFORM` such as `30E` or `J` into repeat count and type code.
fn parse_tform(form: &str) -> Result<(usize, char)> {
    let form = form.trim();
    let digits = form.chars().take_while(char::is_ascii_digit).count();
    let repeat = if digits == 0 {
        1
    } else {
        form[..digits]
            .parse()
            .map_err(|_| MosaicError::InvalidFits(format!("bad TFORM '{form}'")))?
    };
    let code = form[digits..]
        .chars()
        .next()
        .ok_or_else(|| MosaicError::InvalidFits(format!("bad TFORM '{form}'")))?;
    Ok((repeat, code))
}

fn field_size(repeat: usize, code: char) -> Result<usize> {
    let size = if code == 'X' {
        Some(repeat.div_ceil(8))
    } else {
        element_size(code).and_then(|s| s.checked_mul(repeat))
    };
    size.ok_or_else(|| MosaicError::InvalidFits(format!("unsupported column type {repeat}{code}")))
}

/// Column layout of a `BINTABLE` header.
pub fn table_columns(header: &FitsHeader) -> Result<Vec<TableColumn>> {
    if header.get_text("XTENSION") != Some("BINTABLE") {
        return Err(MosaicError::InvalidFits("expected a BINTABLE extension".into()));
    }
    let fields = header.require_int("TFIELDS")?;
    if !(0..=999).contains(&fields) {
        return Err(MosaicError::InvalidFits(format!("TFIELDS = {fields} out of range")));
    }

    let mut columns = Vec::with_capacity(fields as usize);
    let mut offset = 0usize;
    for index in 1..=fields as usize {
        let (repeat, code) = parse_tform(header.require_text(&format!("TFORM{index}"))?)?;
        let name = header
            .get_text(&format!("TTYPE{index}"))
            .unwrap_or_default()
            .trim()
            .to_string();
        columns.push(TableColumn {
            index,
            name,
            offset,
            repeat,
            code,
        });
        offset = offset
            .checked_add(field_size(repeat, code)?)
            .ok_or_else(|| MosaicError::InvalidFits("row size overflows".into()))?;
    }

    let row_len = header.axis_len(1)?;
    if offset > row_len {
        return Err(MosaicError::InvalidFits(format!(
            "columns need {offset} bytes per row, NAXIS1 is {row_len}"
        )));
    }
    Ok(columns)
}

/// Parse `TDIMn = '(w,h)'` into `(width, height)`.
fn parse_tdim(tdim: &str) -> Result<(usize, usize)> {
    let bad = || MosaicError::InvalidFits(format!("bad TDIM '{tdim}'"));
    let inner = tdim
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(bad)?;
    let (w, h) = inner.split_once(',').ok_or_else(bad)?;
    let width: usize = w.trim().parse().map_err(|_| bad())?;
    let height: usize = h.trim().parse().map_err(|_| bad())?;
    if width == 0 || height == 0 {
        return Err(bad());
    }
    Ok((width, height))
}

fn tpf_detector(primary: &FitsHeader) -> Result<DetectorId> {
    let channel = primary.require_u32("CHANNEL")?;
    if primary.get_int("CAMPAIGN").is_some() {
        Ok(DetectorId::new(Mission::K2, primary.require_u32("CAMPAIGN")?, channel))
    } else if primary.get_int("QUARTER").is_some() {
        Ok(DetectorId::new(Mission::Kepler, primary.require_u32("QUARTER")?, channel))
    } else {
        Err(MosaicError::InvalidFits(
            "primary header has neither CAMPAIGN nor QUARTER".into(),
        ))
    }
}

/// Everything about a TPF except the pixel values, taken from the primary and
/// table headers.
#[derive(Clone, Debug)]
pub struct TpfLayout {
    pub detector_id: DetectorId,
    pub origin: PixelOrigin,
    pub width: usize,
    pub height: usize,
    pub rows: usize,
    pub row_len: usize,
    pub flux: TableColumn,
    pub cadence: TableColumn,
    pub quality: Option<TableColumn>,
    /// Aperture HDU announced by `NEXTEND`.
    pub has_aperture: bool,
}

impl TpfLayout {
    pub fn from_headers(primary: &FitsHeader, table: &FitsHeader) -> Result<Self> {
        let columns = table_columns(table)?;
        let find = |name: &str| columns.iter().find(|c| c.name == name).cloned();

        let flux = find(FLUX_COLUMN)
            .ok_or_else(|| MosaicError::InvalidFits("no FLUX column".into()))?;
        if flux.code != 'E' {
            return Err(MosaicError::InvalidFits(format!(
                "FLUX column has type {}, expected E",
                flux.code
            )));
        }
        let (width, height) = parse_tdim(table.require_text(&format!("TDIM{}", flux.index))?)?;
        if width.checked_mul(height) != Some(flux.repeat) {
            return Err(MosaicError::InvalidFits(format!(
                "FLUX holds {} values, TDIM says {width}x{height}",
                flux.repeat
            )));
        }

        let cadence = find(CADENCE_COLUMN)
            .filter(|c| c.code == 'J' && c.repeat == 1)
            .ok_or_else(|| MosaicError::InvalidFits("no scalar CADENCENO column".into()))?;
        let quality = find(QUALITY_COLUMN).filter(|c| c.code == 'J' && c.repeat == 1);

        let column = table.require_int(&format!("1CRV{}P", flux.index))?;
        let row = table.require_int(&format!("2CRV{}P", flux.index))?;
        let (Ok(column), Ok(row)) = (usize::try_from(column), usize::try_from(row)) else {
            return Err(MosaicError::InvalidFits(format!(
                "negative stamp origin (column {column}, row {row})"
            )));
        };

        Ok(Self {
            detector_id: tpf_detector(primary)?,
            origin: PixelOrigin { column, row },
            width,
            height,
            rows: table.axis_len(2)?,
            row_len: table.axis_len(1)?,
            flux,
            cadence,
            quality,
            has_aperture: primary.get_int("NEXTEND").is_some_and(|n| n >= 2),
        })
    }

    /// Stamp container header describing the same stamp.
    pub fn stamp_header(&self) -> StampHeader {
        StampHeader {
            detector_id: self.detector_id,
            origin: self.origin,
            width: self.width as u32,
            height: self.height as u32,
            time_step_count: self.rows as u32,
            has_quality: self.quality.is_some(),
            has_aperture: self.has_aperture,
        }
    }
}

/// File contents, mapped directly or inflated from gzip.
enum TpfBytes {
    Mapped(Mmap),
    Inflated(Vec<u8>),
}

impl Deref for TpfBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => &mmap[..],
            Self::Inflated(bytes) => &bytes[..],
        }
    }
}

fn load_bytes(path: &Path) -> Result<TpfBytes> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    if mmap.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(&mmap[..]).read_to_end(&mut inflated)?;
        debug!(path = %path.display(), bytes = inflated.len(), "Inflated target pixel file");
        Ok(TpfBytes::Inflated(inflated))
    } else {
        Ok(TpfBytes::Mapped(mmap))
    }
}

/// Reader over a plain or gzip-compressed file.
fn open_stream(path: &Path) -> Result<Box<dyn Read>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let gzipped = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
    let file = File::open(path)?;
    Ok(if gzipped {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    })
}

/// Read the primary and table headers only. Compressed files are inflated
/// just far enough to reach the end of the table header.
pub fn read_tpf_header(path: &Path) -> Result<TpfLayout> {
    let mut stream = open_stream(path)?;
    let primary = read_fits_header(&mut stream)?;
    let skip = block_padded(primary.data_byte_len()?)? as u64;
    let skipped = io::copy(&mut (&mut stream).take(skip), &mut io::sink())?;
    if skipped < skip {
        return Err(MosaicError::InvalidFits("file ends inside the primary HDU".into()));
    }
    let table = read_fits_header(&mut stream)?;
    TpfLayout::from_headers(&primary, &table)
}

fn read_aperture(cursor: &mut Cursor<&[u8]>, layout: &TpfLayout) -> Result<Option<Array2<bool>>> {
    if cursor.position() as usize >= cursor.get_ref().len() {
        return Ok(None);
    }
    let header = read_fits_header(cursor)?;
    if header.get_int("BITPIX") != Some(32) || header.get_int("NAXIS") != Some(2) {
        return Err(MosaicError::InvalidFits(
            "aperture HDU is not a 2-D 32-bit integer image".into(),
        ));
    }
    let (width, height) = (header.axis_len(1)?, header.axis_len(2)?);
    if (width, height) != (layout.width, layout.height) {
        return Err(MosaicError::InvalidFits(format!(
            "aperture is {width}x{height}, FLUX is {}x{}",
            layout.width, layout.height
        )));
    }

    let start = cursor.position() as usize;
    let len = header.data_byte_len()?;
    let bytes = cursor
        .get_ref()
        .get(start..start.saturating_add(len))
        .ok_or_else(|| MosaicError::InvalidFits("aperture image is truncated".into()))?;
    let mut values = vec![0i32; width * height];
    BigEndian::read_i32_into(bytes, &mut values);
    let mask = values.into_iter().map(|v| v > 0).collect();
    Array2::from_shape_vec((height, width), mask)
        .map(Some)
        .map_err(|e| MosaicError::InvalidFits(e.to_string()))
}

/// Decode a whole TPF into a `Stamp`.
pub fn read_tpf(path: &Path) -> Result<Stamp> {
    let bytes = load_bytes(path)?;
    let bytes: &[u8] = &bytes;
    let mut cursor = Cursor::new(bytes);

    let primary = read_fits_header(&mut cursor)?;
    cursor.set_position(cursor.position() + block_padded(primary.data_byte_len()?)? as u64);
    let table = read_fits_header(&mut cursor)?;
    let layout = TpfLayout::from_headers(&primary, &table)?;

    let table_start = cursor.position() as usize;
    let table_len = table.data_byte_len()?;
    let rows_len = layout
        .rows
        .checked_mul(layout.row_len)
        .ok_or_else(|| MosaicError::InvalidFits("table size overflows".into()))?;
    let table_bytes = bytes
        .get(table_start..table_start.saturating_add(rows_len))
        .ok_or_else(|| MosaicError::InvalidFits("table data is truncated".into()))?;

    let pixels = layout.width * layout.height;
    let mut time_steps = Vec::with_capacity(layout.rows);
    let mut quality = layout.quality.as_ref().map(|_| Vec::with_capacity(layout.rows));
    let mut flux = vec![0f32; layout.rows * pixels];

    for (row, frame) in table_bytes
        .chunks_exact(layout.row_len)
        .zip(flux.chunks_exact_mut(pixels))
    {
        let at = layout.cadence.offset;
        time_steps.push(BigEndian::read_i32(&row[at..at + 4]) as i64);
        if let (Some(column), Some(flags)) = (&layout.quality, quality.as_mut()) {
            let at = column.offset;
            flags.push(BigEndian::read_u32(&row[at..at + 4]));
        }
        let at = layout.flux.offset;
        BigEndian::read_f32_into(&row[at..at + pixels * 4], frame);
    }

    cursor.set_position((table_start + block_padded(table_len)?) as u64);
    let aperture = if layout.has_aperture {
        read_aperture(&mut cursor, &layout)?
    } else {
        None
    };

    let series = Array3::from_shape_vec((layout.rows, layout.height, layout.width), flux)
        .map_err(|e| MosaicError::InvalidFits(e.to_string()))?;
    let mut stamp = Stamp::new(layout.detector_id, layout.origin, time_steps, series)?;
    if let Some(flags) = quality {
        stamp = stamp.with_quality_flags(flags)?;
    }
    if let Some(mask) = aperture {
        stamp = stamp.with_aperture(mask)?;
    }
    Ok(stamp)
}

/// Reads stamps from archive target pixel files (`*_lpd-targ.fits[.gz]`).
#[derive(Clone, Copy, Debug, Default)]
pub struct TpfReader;

impl StampReader for TpfReader {
    fn read(&self, path: &Path) -> Result<Stamp> {
        read_tpf(path).map_err(|e| MosaicError::stamp_load(path.display(), e))
    }
}
