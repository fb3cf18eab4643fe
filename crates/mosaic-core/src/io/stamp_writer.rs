use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::Result;
use crate::io::stamp_file::{mission_code, StampHeader, STAMP_MAGIC, STAMP_VERSION};
use crate::stamp::Stamp;

/// Header describing `stamp` as it will be written.
pub fn header_for(stamp: &Stamp) -> StampHeader {
    StampHeader {
        detector_id: stamp.detector_id,
        origin: stamp.origin,
        width: stamp.width() as u32,
        height: stamp.height() as u32,
        time_step_count: stamp.time_steps().len() as u32,
        has_quality: stamp.quality_flags().is_some(),
        has_aperture: stamp.aperture().is_some(),
    }
}

/// Serialize a stamp into the binary container format.
pub fn write_stamp(w: &mut impl Write, stamp: &Stamp) -> Result<()> {
    let header = header_for(stamp);
    write_header(w, &header)?;

    for &t in stamp.time_steps() {
        w.write_i64::<LittleEndian>(t)?;
    }
    if let Some(flags) = stamp.quality_flags() {
        for &f in flags {
            w.write_u32::<LittleEndian>(f)?;
        }
    }
    if let Some(mask) = stamp.aperture() {
        for &inside in mask.iter() {
            w.write_u8(inside as u8)?;
        }
    }
    // Logical iteration order is time-major, then row-major.
    for &v in stamp.pixel_series().iter() {
        w.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

/// Write a stamp file to disk.
pub fn save_stamp(stamp: &Stamp, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_stamp(&mut writer, stamp)?;
    writer.flush()?;
    Ok(())
}

fn write_header(w: &mut impl Write, header: &StampHeader) -> Result<()> {
    w.write_all(STAMP_MAGIC)?;
    w.write_u16::<LittleEndian>(STAMP_VERSION)?;
    w.write_u8(mission_code(header.detector_id.mission))?;
    w.write_u8(header.flags())?;
    w.write_u32::<LittleEndian>(header.detector_id.campaign)?;
    w.write_u32::<LittleEndian>(header.detector_id.channel)?;
    w.write_u32::<LittleEndian>(header.origin.column as u32)?;
    w.write_u32::<LittleEndian>(header.origin.row as u32)?;
    w.write_u32::<LittleEndian>(header.width)?;
    w.write_u32::<LittleEndian>(header.height)?;
    w.write_u32::<LittleEndian>(header.time_step_count)?;
    Ok(())
}
