//! Minimal FITS image I/O for mosaic rasters.
//!
//! Mosaics are written as a single primary HDU holding a 32-bit IEEE float
//! image (`BITPIX = -32`). `NaN` marks cells no stamp observed. The header
//! carries the detector and time step so a raster can be fed back into the
//! animation assembler without any side files.
//!
//! Output contains nothing time-dependent, so re-running the same mosaic
//! produces byte-identical files.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use ndarray::Array2;

use crate::composite::Mosaic;
use crate::consts::{FITS_BLOCK_SIZE, FITS_CARD_SIZE};
use crate::error::{MosaicError, Result};
use crate::io::RasterWriter;
use crate::stamp::{DetectorId, Mission};

/// Header value as written in a card.
#[derive(Clone, Debug, PartialEq)]
pub enum FitsValue {
    Logical(bool),
    Integer(i64),
    Text(String),
}

impl FitsValue {
    fn render(&self) -> String {
        match self {
            // Fixed format: numbers and logicals right-justified to column 30.
            Self::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
            Self::Integer(i) => format!("{i:>20}"),
            // Strings are quoted, padded to at least 8 characters.
            Self::Text(s) => format!("'{:<8}'", s.replace('\'', "''")),
        }
    }
}

/// Ordered list of header cards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<(String, FitsValue)>,
}

impl FitsHeader {
    pub fn push(&mut self, keyword: &str, value: FitsValue) {
        self.cards.push((keyword.to_uppercase(), value));
    }

    pub fn get(&self, keyword: &str) -> Option<&FitsValue> {
        self.cards
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, v)| v)
    }

    pub fn get_int(&self, keyword: &str) -> Option<i64> {
        match self.get(keyword)? {
            FitsValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_text(&self, keyword: &str) -> Option<&str> {
        match self.get(keyword)? {
            FitsValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn require_int(&self, keyword: &str) -> Result<i64> {
        self.get_int(keyword)
            .ok_or_else(|| MosaicError::InvalidFits(format!("missing keyword {keyword}")))
    }

    pub fn require_text(&self, keyword: &str) -> Result<&str> {
        self.get_text(keyword)
            .ok_or_else(|| MosaicError::InvalidFits(format!("missing keyword {keyword}")))
    }

    /// Length of axis `n` (1-based). Must be positive.
    pub fn axis_len(&self, n: usize) -> Result<usize> {
        let keyword = format!("NAXIS{n}");
        let value = self.require_int(&keyword)?;
        if value <= 0 {
            return Err(MosaicError::InvalidFits(format!(
                "{keyword} = {value}, expected a positive length"
            )));
        }
        usize::try_from(value)
            .map_err(|_| MosaicError::InvalidFits(format!("{keyword} = {value} is too large")))
    }

    /// Size of the data unit that follows this header, excluding block padding.
    pub fn data_byte_len(&self) -> Result<usize> {
        let too_large = || MosaicError::InvalidFits("data unit size overflows".into());

        let naxis = self.require_int("NAXIS")?;
        if !(0..=999).contains(&naxis) {
            return Err(MosaicError::InvalidFits(format!("NAXIS = {naxis} out of range")));
        }
        if naxis == 0 {
            return Ok(0);
        }
        let bytes_per_value: usize = match self.require_int("BITPIX")? {
            8 => 1,
            16 => 2,
            32 | -32 => 4,
            64 | -64 => 8,
            other => {
                return Err(MosaicError::InvalidFits(format!("unsupported BITPIX {other}")));
            }
        };

        let mut values = 1usize;
        for n in 1..=naxis as usize {
            values = values.checked_mul(self.axis_len(n)?).ok_or_else(too_large)?;
        }
        let pcount = self.get_int("PCOUNT").unwrap_or(0);
        let gcount = self.get_int("GCOUNT").unwrap_or(1);
        let (Ok(pcount), Ok(gcount)) = (usize::try_from(pcount), usize::try_from(gcount)) else {
            return Err(MosaicError::InvalidFits(format!(
                "negative PCOUNT {pcount} or GCOUNT {gcount}"
            )));
        };

        values
            .checked_add(pcount)
            .and_then(|v| v.checked_mul(gcount))
            .and_then(|v| v.checked_mul(bytes_per_value))
            .ok_or_else(too_large)
    }

    /// Detector recorded by `mosaic_header`.
    pub fn detector_id(&self) -> Result<DetectorId> {
        let mission = match self.get_text("MISSION") {
            Some("K2") => Mission::K2,
            Some("Kepler") => Mission::Kepler,
            Some(other) => {
                return Err(MosaicError::InvalidFits(format!("unknown mission '{other}'")));
            }
            None => return Err(MosaicError::InvalidFits("missing keyword MISSION".into())),
        };
        Ok(DetectorId::new(
            mission,
            self.require_u32("CAMPAIGN")?,
            self.require_u32("CHANNEL")?,
        ))
    }

    pub(crate) fn require_u32(&self, keyword: &str) -> Result<u32> {
        let value = self.require_int(keyword)?;
        u32::try_from(value)
            .map_err(|_| MosaicError::InvalidFits(format!("{keyword} = {value} out of range")))
    }

    pub fn time_step(&self) -> Result<i64> {
        self.require_int("TIMESTEP")
    }
}

/// Header cards describing `mosaic`.
pub fn mosaic_header(mosaic: &Mosaic) -> FitsHeader {
    let mut header = FitsHeader::default();
    header.push("SIMPLE", FitsValue::Logical(true));
    header.push("BITPIX", FitsValue::Integer(-32));
    header.push("NAXIS", FitsValue::Integer(2));
    header.push("NAXIS1", FitsValue::Integer(mosaic.width() as i64));
    header.push("NAXIS2", FitsValue::Integer(mosaic.height() as i64));
    header.push("MISSION", FitsValue::Text(mosaic.detector_id.mission.to_string()));
    header.push("CAMPAIGN", FitsValue::Integer(mosaic.detector_id.campaign as i64));
    header.push("CHANNEL", FitsValue::Integer(mosaic.detector_id.channel as i64));
    header.push("TIMESTEP", FitsValue::Integer(mosaic.time_step));
    header.push("NSTAMPS", FitsValue::Integer(mosaic.contributors as i64));
    header.push("NCONFLCT", FitsValue::Integer(mosaic.conflicts as i64));
    header
}

fn write_card(w: &mut impl Write, keyword: &str, value: Option<&FitsValue>) -> Result<()> {
    let mut card = format!("{keyword:<8}");
    if let Some(v) = value {
        card.push_str("= ");
        card.push_str(&v.render());
    }
    card.truncate(FITS_CARD_SIZE);
    w.write_all(format!("{card:<80}").as_bytes())?;
    Ok(())
}

/// `len` rounded up to a whole number of FITS blocks.
pub fn block_padded(len: usize) -> Result<usize> {
    len.div_ceil(FITS_BLOCK_SIZE)
        .checked_mul(FITS_BLOCK_SIZE)
        .ok_or_else(|| MosaicError::InvalidFits("data unit size overflows".into()))
}

fn pad_to_block(w: &mut impl Write, written: usize, fill: u8) -> Result<()> {
    let padding = (FITS_BLOCK_SIZE - written % FITS_BLOCK_SIZE) % FITS_BLOCK_SIZE;
    w.write_all(&vec![fill; padding])?;
    Ok(())
}

/// Serialize a mosaic as a FITS primary HDU.
pub fn write_fits_mosaic(w: &mut impl Write, mosaic: &Mosaic) -> Result<()> {
    let header = mosaic_header(mosaic);
    for (keyword, value) in &header.cards {
        write_card(w, keyword, Some(value))?;
    }
    write_card(w, "END", None)?;
    pad_to_block(w, (header.cards.len() + 1) * FITS_CARD_SIZE, b' ')?;

    for &v in mosaic.data.iter() {
        w.write_f32::<BigEndian>(v)?;
    }
    pad_to_block(w, mosaic.data.len() * 4, 0)?;
    Ok(())
}

fn parse_value(raw: &str) -> FitsValue {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('\'') {
        let end = rest.rfind('\'').unwrap_or(rest.len());
        return FitsValue::Text(rest[..end].replace("''", "'").trim_end().to_string());
    }
    let value = raw.split('/').next().unwrap_or("").trim();
    match value {
        "T" => FitsValue::Logical(true),
        "F" => FitsValue::Logical(false),
        _ => value
            .parse::<i64>()
            .map(FitsValue::Integer)
            .unwrap_or_else(|_| FitsValue::Text(value.to_string())),
    }
}

/// Read header cards up to `END`, consuming the padding of the last block.
pub fn read_fits_header(r: &mut impl Read) -> Result<FitsHeader> {
    let mut header = FitsHeader::default();
    let mut card = [0u8; FITS_CARD_SIZE];
    let mut cards_read = 0;

    loop {
        r.read_exact(&mut card)
            .map_err(|_| MosaicError::InvalidFits("header ended before END".into()))?;
        cards_read += 1;
        if !card.is_ascii() {
            return Err(MosaicError::InvalidFits("non-ASCII header card".into()));
        }
        let text = String::from_utf8_lossy(&card);
        let keyword = text[..8].trim();
        if keyword == "END" {
            break;
        }
        if &text[8..10] == "= " {
            header
                .cards
                .push((keyword.to_string(), parse_value(&text[10..])));
        }
    }

    let consumed = cards_read * FITS_CARD_SIZE;
    let padding = (FITS_BLOCK_SIZE - consumed % FITS_BLOCK_SIZE) % FITS_BLOCK_SIZE;
    let mut skip = vec![0u8; padding];
    r.read_exact(&mut skip)?;
    Ok(header)
}

/// Read only the header of a mosaic raster.
pub fn read_fits_header_from_path(path: &Path) -> Result<FitsHeader> {
    let mut reader = BufReader::new(File::open(path)?);
    read_fits_header(&mut reader)
}

/// Read a raster written by `write_fits_mosaic`.
pub fn read_fits_mosaic(path: &Path) -> Result<Mosaic> {
    decode_fits_mosaic(path).map_err(|e| match e {
        MosaicError::InvalidFits(reason) => {
            MosaicError::InvalidFits(format!("{}: {reason}", path.display()))
        }
        other => other,
    })
}

fn decode_fits_mosaic(path: &Path) -> Result<Mosaic> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let header = read_fits_header(&mut reader)?;

    if header.get_int("BITPIX") != Some(-32) || header.get_int("NAXIS") != Some(2) {
        return Err(MosaicError::InvalidFits("not a 2-D 32-bit float image".into()));
    }
    let width = header.axis_len(1)?;
    let height = header.axis_len(2)?;
    let byte_len = header.data_byte_len()?;

    // Checked before allocating; the header alone can claim any size.
    let available = file_len.saturating_sub(reader.stream_position()?);
    if available < byte_len as u64 {
        return Err(MosaicError::InvalidFits(format!(
            "truncated: {width}x{height} image needs {byte_len} bytes, {available} remain"
        )));
    }

    let mut bytes = vec![0u8; byte_len];
    reader.read_exact(&mut bytes)?;
    let mut values = vec![0f32; width * height];
    BigEndian::read_f32_into(&bytes, &mut values);
    let data = Array2::from_shape_vec((height, width), values)
        .map_err(|e| MosaicError::InvalidFits(e.to_string()))?;

    Ok(Mosaic {
        detector_id: header.detector_id()?,
        time_step: header.time_step()?,
        data,
        contributors: header.get_int("NSTAMPS").unwrap_or(0).max(0) as usize,
        conflicts: header.get_int("NCONFLCT").unwrap_or(0).max(0) as usize,
    })
}

/// Deterministic raster name for a detector and time step,
/// e.g. `mosaic-c04-ch15-cad3051.fits`.
pub fn raster_file_name(prefix: &str, detector: &DetectorId, time_step: i64) -> String {
    format!(
        "{}-{}{:02}-ch{:02}-cad{}.fits",
        prefix,
        detector.mission.period_letter(),
        detector.campaign,
        detector.channel,
        time_step
    )
}

/// Writes each mosaic to `<output_dir>/<raster_file_name>`.
#[derive(Clone, Debug)]
pub struct FitsRasterWriter {
    pub output_dir: PathBuf,
    pub prefix: String,
}

impl FitsRasterWriter {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, detector: &DetectorId, time_step: i64) -> PathBuf {
        self.output_dir
            .join(raster_file_name(&self.prefix, detector, time_step))
    }
}

impl RasterWriter for FitsRasterWriter {
    fn write(&self, mosaic: &Mosaic) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(&mosaic.detector_id, mosaic.time_step);

        // Written beside the target then renamed; a truncated raster never
        // appears under the final name.
        let partial = path.with_extension("fits.part");
        {
            let mut writer = BufWriter::new(File::create(&partial)?);
            write_fits_mosaic(&mut writer, mosaic)?;
            writer.flush()?;
        }
        fs::rename(&partial, &path)?;
        Ok(path)
    }
}
