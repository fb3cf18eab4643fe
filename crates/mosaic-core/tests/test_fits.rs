mod common;

use std::io::Cursor;

use tempfile::tempdir;

use mosaic_core::composite::{composite, OverlapPolicy};
use mosaic_core::error::MosaicError;
use mosaic_core::io::fits::{
    raster_file_name, read_fits_header, read_fits_mosaic, write_fits_mosaic, FitsRasterWriter,
    FitsValue,
};
use mosaic_core::io::RasterWriter;
use mosaic_core::render::{assemble, FrameSequence, PngSequenceEncoder, RenderConfig};
use mosaic_core::stamp::{DetectorId, Mission};

use common::{detector, small_grid, uniform_stamp};

fn sample_mosaic() -> mosaic_core::composite::Mosaic {
    let a = uniform_stamp(2, 3, 4, 2, &[3051], 125.5);
    composite(&small_grid(), detector(), 3051, &[(&a, 0)], OverlapPolicy::LastWins).unwrap()
}

/// Raster header with the given image axes and nothing after it but `data_len` zero bytes.
fn raw_raster(naxis1: &str, naxis2: &str, data_len: usize) -> Vec<u8> {
    let cards = [
        ("SIMPLE", "T"),
        ("BITPIX", "-32"),
        ("NAXIS", "2"),
        ("NAXIS1", naxis1),
        ("NAXIS2", naxis2),
        ("MISSION", "'K2      '"),
        ("CAMPAIGN", "4"),
        ("CHANNEL", "15"),
        ("TIMESTEP", "7"),
    ];
    let mut buf = Vec::new();
    for (key, value) in cards {
        buf.extend_from_slice(format!("{key:<8}= {value:>20}{:50}", "").as_bytes());
    }
    buf.extend_from_slice(format!("{:<80}", "END").as_bytes());
    buf.resize(2880, b' ');
    buf.resize(2880 + data_len, 0);
    buf
}

#[test]
fn test_raster_file_name() {
    assert_eq!(
        raster_file_name("mosaic", &detector(), 3051),
        "mosaic-c04-ch15-cad3051.fits"
    );
    let kepler = DetectorId::new(Mission::Kepler, 12, 7);
    assert_eq!(raster_file_name("k", &kepler, 99), "k-q12-ch07-cad99.fits");
}

#[test]
fn test_output_is_block_aligned() {
    let mut buf = Vec::new();
    write_fits_mosaic(&mut buf, &sample_mosaic()).unwrap();
    assert_eq!(buf.len() % 2880, 0);
    assert!(buf.starts_with(b"SIMPLE  =                    T"));
}

#[test]
fn test_header_fields() {
    let mosaic = sample_mosaic();
    let mut buf = Vec::new();
    write_fits_mosaic(&mut buf, &mosaic).unwrap();

    let header = read_fits_header(&mut Cursor::new(&buf)).unwrap();
    assert_eq!(header.get("SIMPLE"), Some(&FitsValue::Logical(true)));
    assert_eq!(header.get_int("BITPIX"), Some(-32));
    assert_eq!(header.get_int("NAXIS"), Some(2));
    assert_eq!(header.get_int("NAXIS1"), Some(16));
    assert_eq!(header.get_int("NAXIS2"), Some(12));
    assert_eq!(header.get_text("MISSION"), Some("K2"));
    assert_eq!(header.get_int("CAMPAIGN"), Some(4));
    assert_eq!(header.get_int("CHANNEL"), Some(15));
    assert_eq!(header.get_int("TIMESTEP"), Some(3051));
    assert_eq!(header.get_int("NSTAMPS"), Some(1));
    assert_eq!(header.detector_id().unwrap(), detector());
}

#[test]
fn test_read_back_preserves_data_and_sentinel() {
    let dir = tempdir().unwrap();
    let writer = FitsRasterWriter::new(dir.path(), "mosaic");
    let mosaic = sample_mosaic();
    let path = writer.write(&mosaic).unwrap();

    assert_eq!(path, dir.path().join("mosaic-c04-ch15-cad3051.fits"));
    assert!(!dir.path().join("mosaic-c04-ch15-cad3051.fits.part").exists());

    let loaded = read_fits_mosaic(&path).unwrap();
    assert_eq!(loaded.detector_id, detector());
    assert_eq!(loaded.time_step, 3051);
    assert_eq!(loaded.data.dim(), (12, 16));
    assert_eq!(loaded.data[[3, 2]], 125.5);
    assert_eq!(loaded.data[[4, 5]], 125.5);
    assert!(loaded.data[[0, 0]].is_nan());
    assert_eq!(loaded.observed_pixels(), 8);
}

#[test]
fn test_rewrite_is_byte_identical() {
    let dir = tempdir().unwrap();
    let writer = FitsRasterWriter::new(dir.path(), "mosaic");
    let path = writer.write(&sample_mosaic()).unwrap();
    let first = std::fs::read(&path).unwrap();
    writer.write(&sample_mosaic()).unwrap();
    let second = std::fs::read(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_garbage_is_invalid_fits() {
    let buf = vec![0xffu8; 2880];
    assert!(read_fits_header(&mut Cursor::new(&buf)).is_err());
}

// ---------------------------------------------------------------------------
// Malformed rasters
// ---------------------------------------------------------------------------

#[test]
fn test_negative_axis_is_invalid_fits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.fits");
    std::fs::write(&path, raw_raster("-1", "12", 2880)).unwrap();

    match read_fits_mosaic(&path).unwrap_err() {
        MosaicError::InvalidFits(reason) => assert!(reason.contains("NAXIS1")),
        other => panic!("expected InvalidFits, got {other:?}"),
    }
}

#[test]
fn test_oversized_axes_are_rejected_before_allocating() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("huge.fits");
    std::fs::write(&path, raw_raster("4000000000", "4000000000", 0)).unwrap();
    assert!(matches!(
        read_fits_mosaic(&path).unwrap_err(),
        MosaicError::InvalidFits(_)
    ));

    let short = dir.path().join("short.fits");
    std::fs::write(&short, raw_raster("16", "12", 100)).unwrap();
    match read_fits_mosaic(&short).unwrap_err() {
        MosaicError::InvalidFits(reason) => assert!(reason.contains("truncated")),
        other => panic!("expected InvalidFits, got {other:?}"),
    }
}

#[test]
fn test_bad_raster_in_movie_is_frame_render_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.fits");
    std::fs::write(&path, raw_raster("-1", "12", 2880)).unwrap();

    // Only the header is read while building the sequence.
    let sequence = FrameSequence::from_raster_paths(&[&path]).unwrap();
    let mut encoder = PngSequenceEncoder::new(dir.path().join("frames"));
    let err = assemble(&sequence, &RenderConfig::default(), &mut encoder).unwrap_err();
    assert!(matches!(err, MosaicError::FrameRender { time_step: 7, .. }));
}
