mod common;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;

use mosaic_core::error::MosaicError;
use mosaic_core::io::source::StampSourceResolver;
use mosaic_core::io::tpf::{read_tpf, read_tpf_header, TpfReader};
use mosaic_core::io::{
    detect_stamp_format, read_stamp_header, AutoStampReader, StampFormat, StampReader,
};
use mosaic_core::pipeline::config::MosaicConfig;
use mosaic_core::pipeline::MosaicPipeline;
use mosaic_core::stamp::{DetectorId, Mission, PixelOrigin};

use common::{detector, small_config, uniform_stamp, write_stamp_file};

// ---------------------------------------------------------------------------
// Synthetic target pixel files
// ---------------------------------------------------------------------------

struct TpfSpec {
    column: i64,
    row: i64,
    width: usize,
    height: usize,
    cadences: Vec<i32>,
    quality: Vec<u32>,
    /// Row-major `height x width`; nonzero = collected.
    aperture: Vec<i32>,
    gzip: bool,
}

impl TpfSpec {
    fn new(column: i64, row: i64, width: usize, height: usize, cadences: &[i32]) -> Self {
        Self {
            column,
            row,
            width,
            height,
            cadences: cadences.to_vec(),
            quality: vec![0; cadences.len()],
            aperture: vec![1; width * height],
            gzip: false,
        }
    }

    /// Flux of pixel `(y, x)` in table row `i`.
    fn flux(&self, i: usize, y: usize, x: usize) -> f32 {
        1000.0 * self.column as f32 + 100.0 * i as f32 + 10.0 * y as f32 + x as f32
    }
}

fn int(v: impl ToString) -> String {
    format!("{:>20}", v.to_string())
}

fn text(v: &str) -> String {
    format!("'{v:<8}'")
}

fn header_block(cards: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (key, value) in cards {
        buf.extend_from_slice(format!("{:<80}", format!("{key:<8}= {value}")).as_bytes());
    }
    buf.extend_from_slice(format!("{:<80}", "END").as_bytes());
    pad_block(&mut buf, b' ');
    buf
}

fn pad_block(buf: &mut Vec<u8>, fill: u8) {
    let len = buf.len().div_ceil(2880) * 2880;
    buf.resize(len, fill);
}

fn tpf_bytes(spec: &TpfSpec) -> Vec<u8> {
    let pixels = spec.width * spec.height;
    let row_len = 8 + 4 + 4 * pixels + 4;

    let mut out = header_block(&[
        ("SIMPLE", int("T")),
        ("BITPIX", int(8)),
        ("NAXIS", int(0)),
        ("EXTEND", int("T")),
        ("NEXTEND", int(2)),
        ("TELESCOP", text("Kepler")),
        ("MISSION", text("K2")),
        ("CAMPAIGN", int(4)),
        ("CHANNEL", int(15)),
    ]);

    out.extend(header_block(&[
        ("XTENSION", text("BINTABLE")),
        ("BITPIX", int(8)),
        ("NAXIS", int(2)),
        ("NAXIS1", int(row_len)),
        ("NAXIS2", int(spec.cadences.len())),
        ("PCOUNT", int(0)),
        ("GCOUNT", int(1)),
        ("TFIELDS", int(4)),
        ("TTYPE1", text("TIME")),
        ("TFORM1", text("D")),
        ("TTYPE2", text("CADENCENO")),
        ("TFORM2", text("J")),
        ("TTYPE3", text("FLUX")),
        ("TFORM3", text(&format!("{pixels}E"))),
        ("TDIM3", text(&format!("({},{})", spec.width, spec.height))),
        ("1CRV3P", int(spec.column)),
        ("2CRV3P", int(spec.row)),
        ("TTYPE4", text("QUALITY")),
        ("TFORM4", text("J")),
    ]));
    let mut table = Vec::new();
    for (i, &cadence) in spec.cadences.iter().enumerate() {
        table.extend_from_slice(&(i as f64).to_be_bytes());
        table.extend_from_slice(&cadence.to_be_bytes());
        for y in 0..spec.height {
            for x in 0..spec.width {
                table.extend_from_slice(&spec.flux(i, y, x).to_be_bytes());
            }
        }
        table.extend_from_slice(&spec.quality[i].to_be_bytes());
    }
    pad_block(&mut table, 0);
    out.extend(table);

    out.extend(header_block(&[
        ("XTENSION", text("IMAGE")),
        ("BITPIX", int(32)),
        ("NAXIS", int(2)),
        ("NAXIS1", int(spec.width)),
        ("NAXIS2", int(spec.height)),
        ("PCOUNT", int(0)),
        ("GCOUNT", int(1)),
    ]));
    let mut aperture: Vec<u8> = spec.aperture.iter().flat_map(|v| v.to_be_bytes()).collect();
    pad_block(&mut aperture, 0);
    out.extend(aperture);
    out
}

fn write_tpf(dir: &Path, name: &str, spec: &TpfSpec) -> PathBuf {
    let path = dir.join(name);
    let bytes = tpf_bytes(spec);
    if spec.gzip {
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        encoder.finish().unwrap();
    } else {
        std::fs::write(&path, bytes).unwrap();
    }
    path
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[test]
fn test_read_plain_tpf() {
    let dir = tempdir().unwrap();
    let mut spec = TpfSpec::new(3, 2, 4, 3, &[3051, 3052, 3054]);
    spec.quality = vec![0, 8, 0];
    spec.aperture[0] = 0;
    let path = write_tpf(dir.path(), "ktwo-lpd-targ.fits", &spec);

    let stamp = read_tpf(&path).unwrap();
    assert_eq!(stamp.detector_id, detector());
    assert_eq!(stamp.origin, PixelOrigin { column: 3, row: 2 });
    assert_eq!((stamp.width(), stamp.height()), (4, 3));
    assert_eq!(stamp.time_steps(), &[3051, 3052, 3054]);
    assert_eq!(stamp.quality_flags(), Some(&[0, 8, 0][..]));
    assert!(!stamp.in_aperture(0, 0));
    assert!(stamp.in_aperture(2, 3));
    assert_eq!(stamp.frame(2)[[1, 3]], spec.flux(2, 1, 3));
}

#[test]
fn test_gzip_tpf_matches_plain() {
    let dir = tempdir().unwrap();
    let mut spec = TpfSpec::new(5, 1, 2, 2, &[10, 11]);
    let plain = write_tpf(dir.path(), "a.fits", &spec);
    spec.gzip = true;
    let gzipped = write_tpf(dir.path(), "a.fits.gz", &spec);

    let a = read_tpf(&plain).unwrap();
    let b = read_tpf(&gzipped).unwrap();
    assert_eq!(a.pixel_series(), b.pixel_series());
    assert_eq!(a.time_steps(), b.time_steps());
}

#[test]
fn test_header_only_read() {
    let dir = tempdir().unwrap();
    let mut spec = TpfSpec::new(7, 4, 3, 2, &[1, 2, 3, 4]);
    spec.gzip = true;
    let path = write_tpf(dir.path(), "b.fits.gz", &spec);

    let layout = read_tpf_header(&path).unwrap();
    assert_eq!(layout.detector_id, DetectorId::new(Mission::K2, 4, 15));
    assert_eq!((layout.width, layout.height, layout.rows), (3, 2, 4));

    let header = read_stamp_header(&path).unwrap();
    assert_eq!(header.origin, PixelOrigin { column: 7, row: 4 });
    assert_eq!(header.time_step_count, 4);
    assert!(header.has_quality);
    assert!(header.has_aperture);
}

#[test]
fn test_detect_stamp_format() {
    let dir = tempdir().unwrap();
    let tpf = write_tpf(dir.path(), "c.fits", &TpfSpec::new(0, 0, 1, 1, &[1]));
    let container =
        write_stamp_file(dir.path(), "c.stamp", &uniform_stamp(0, 0, 1, 1, &[1], 1.0));
    let junk = dir.path().join("notes.txt");
    std::fs::write(&junk, "hello").unwrap();

    assert_eq!(detect_stamp_format(&tpf).unwrap(), StampFormat::TargetPixelFile);
    assert_eq!(detect_stamp_format(&container).unwrap(), StampFormat::Container);
    assert!(detect_stamp_format(&junk).is_err());
    assert!(AutoStampReader.read(&container).is_ok());
}

#[test]
fn test_malformed_tpf_is_stamp_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.fits");
    let mut bytes = tpf_bytes(&TpfSpec::new(0, 0, 4, 4, &[1, 2, 3]));
    bytes.truncate(2880 * 2 + 100);
    std::fs::write(&path, bytes).unwrap();

    match TpfReader.read(&path).unwrap_err() {
        MosaicError::StampLoad { locator, reason } => {
            assert_eq!(locator, path.display().to_string());
            assert!(reason.contains("truncated"));
        }
        other => panic!("expected StampLoad, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Mosaicking target pixel files
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_composites_tpfs() {
    let dir = tempdir().unwrap();
    let mut left = TpfSpec::new(1, 1, 3, 2, &[100, 101]);
    left.aperture = vec![1, 1, 0, 1, 1, 1];
    left.gzip = true;
    let right = TpfSpec::new(8, 5, 2, 2, &[101, 102]);
    let sources = vec![
        write_tpf(dir.path(), "left.fits.gz", &left),
        write_tpf(dir.path(), "right.fits", &right),
    ];

    let config = MosaicConfig {
        sources: sources.iter().map(|p| p.display().to_string()).collect(),
        ..small_config()
    };
    let pipeline =
        MosaicPipeline::load(&config, &StampSourceResolver::new(), &AutoStampReader).unwrap();
    assert_eq!(pipeline.time_steps().unwrap(), vec![100, 101, 102]);

    let mosaic = pipeline.mosaic_at(101).unwrap();
    assert_eq!(mosaic.contributors, 2);
    assert_eq!(mosaic.data[[1, 1]], left.flux(1, 0, 0));
    // Outside the left stamp's aperture.
    assert!(mosaic.data[[1, 3]].is_nan());
    assert_eq!(mosaic.data[[6, 9]], right.flux(0, 1, 1));
    assert_eq!(mosaic.observed_pixels(), 5 + 4);
}
