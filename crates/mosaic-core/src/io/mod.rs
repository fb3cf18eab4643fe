pub mod archive;
pub mod fits;
pub mod image_io;
pub mod source;
pub mod stamp_file;
pub mod stamp_writer;
pub mod tpf;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::composite::Mosaic;
use crate::error::{MosaicError, Result};
use crate::stamp::Stamp;

use self::stamp_file::{StampFileReader, StampHeader, STAMP_MAGIC};
use self::tpf::{TpfReader, GZIP_MAGIC};

/// Decodes one stamp source into a `Stamp`.
pub trait StampReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Stamp>;
}

/// Persists a finished mosaic and returns where it went.
///
/// Called from worker threads when the pipeline runs in parallel.
pub trait RasterWriter: Send + Sync {
    fn write(&self, mosaic: &Mosaic) -> Result<PathBuf>;
}

/// On-disk stamp formats, told apart by their leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StampFormat {
    /// `PIXSTAMP` container.
    Container,
    /// Archive target pixel file, plain FITS or gzip-compressed.
    TargetPixelFile,
}

pub fn detect_stamp_format(path: &Path) -> Result<StampFormat> {
    let mut magic = [0u8; 8];
    let read = File::open(path)?.read(&mut magic)?;
    let magic = &magic[..read];
    if magic == STAMP_MAGIC {
        Ok(StampFormat::Container)
    } else if magic.starts_with(&GZIP_MAGIC) || magic.starts_with(b"SIMPLE") {
        Ok(StampFormat::TargetPixelFile)
    } else {
        Err(MosaicError::InvalidStamp(format!(
            "{} is neither a stamp container nor a target pixel file",
            path.display()
        )))
    }
}

/// Header of a stamp in either format, without reading its pixels.
pub fn read_stamp_header(path: &Path) -> Result<StampHeader> {
    match detect_stamp_format(path)? {
        StampFormat::Container => stamp_file::read_header(path),
        StampFormat::TargetPixelFile => tpf::read_tpf_header(path).map(|l| l.stamp_header()),
    }
}

/// Reads each source with the reader matching its format.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoStampReader;

impl StampReader for AutoStampReader {
    fn read(&self, path: &Path) -> Result<Stamp> {
        match detect_stamp_format(path) {
            Ok(StampFormat::Container) => StampFileReader.read(path),
            Ok(StampFormat::TargetPixelFile) => TpfReader.read(path),
            Err(e) => Err(MosaicError::stamp_load(path.display(), e)),
        }
    }
}
