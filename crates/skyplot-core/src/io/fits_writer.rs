use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{BigEndian, WriteBytesExt};
use tracing::debug;

use crate::consts::FITS_BLOCK_SIZE;
use crate::error::{PlotError, Result};
use crate::io::header::{Card, FitsHeader, HeaderValue};
use crate::plane::ImagePlane;

/// Keywords regenerated for every HDU written.
const STRUCTURAL: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3", "EXTEND", "PCOUNT",
    "GCOUNT", "BSCALE", "BZERO", "BLANK", "END",
];

/// Write planes as 32-bit float images: the first as the primary HDU and
/// the rest as IMAGE extensions. Blank pixels are stored as NaN.
///
/// The file is written next to `path` and renamed into place, so readers
/// never see a partial file.
pub fn write_planes(path: &Path, planes: &[Arc<ImagePlane>]) -> Result<()> {
    if planes.is_empty() {
        return Err(PlotError::parse("no planes to write"));
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| PlotError::io_at(dir, e))?;
    }

    let tmp = temp_path(path);
    let result = write_to(&tmp, planes);
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path).map_err(|e| PlotError::io_at(path, e))?;
    debug!(path = %path.display(), planes = planes.len(), "wrote FITS file");
    Ok(())
}

fn write_to(path: &Path, planes: &[Arc<ImagePlane>]) -> Result<()> {
    let file = File::create(path).map_err(|e| PlotError::io_at(path, e))?;
    let mut writer = BufWriter::new(file);
    for (i, plane) in planes.iter().enumerate() {
        let header = hdu_header(plane, i == 0, planes.len() > 1);
        writer.write_all(&header.to_bytes())?;
        write_data(&mut writer, plane)?;
    }
    writer.flush()?;
    Ok(())
}

fn hdu_header(plane: &ImagePlane, primary: bool, has_extensions: bool) -> FitsHeader {
    let mut out = FitsHeader::new();
    if primary {
        out.set("SIMPLE", HeaderValue::Logical(true));
    } else {
        out.set_str("XTENSION", "IMAGE");
    }
    out.set_i64("BITPIX", -32);
    out.set_i64("NAXIS", 2);
    out.set_i64("NAXIS1", plane.width() as i64);
    out.set_i64("NAXIS2", plane.height() as i64);
    if primary {
        if has_extensions {
            out.set("EXTEND", HeaderValue::Logical(true));
        }
    } else {
        out.set_i64("PCOUNT", 0);
        out.set_i64("GCOUNT", 1);
    }

    for card in plane.header().cards() {
        if !STRUCTURAL.contains(&card.keyword.as_str()) {
            out.push(Card::clone(card));
        }
    }
    out
}

fn write_data(w: &mut impl Write, plane: &ImagePlane) -> Result<()> {
    let mut written = 0usize;
    for &v in plane.data().iter() {
        w.write_f32::<BigEndian>(v)?;
        written += 4;
    }
    let pad = written.div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE - written;
    w.write_all(&vec![0u8; pad])?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("derived.fits"));
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fits::FitsReader;
    use ndarray::Array2;

    #[test]
    fn structural_keywords_are_regenerated() {
        let mut header = FitsHeader::new();
        header.set_i64("BITPIX", 16);
        header.set_f64("BZERO", 32768.0);
        header.set_str("OBJECT", "M31");
        let data = Array2::from_shape_fn((3, 5), |(r, c)| (r * 5 + c) as f32);
        let plane = ImagePlane::new(data, header).unwrap();

        let out = hdu_header(&plane, true, false);
        assert_eq!(out.get_i64("BITPIX"), Some(-32));
        assert_eq!(out.get_i64("NAXIS1"), Some(5));
        assert!(!out.contains("BZERO"));
        assert_eq!(out.get_str("OBJECT"), Some("M31"));
        assert_eq!(out.cards()[0].keyword, "SIMPLE");
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.fits");
        let a = ImagePlane::new(Array2::from_elem((4, 6), 1.5), FitsHeader::new()).unwrap();
        let b = ImagePlane::new(Array2::from_elem((2, 2), f32::NAN), FitsHeader::new()).unwrap();
        write_planes(&path, &[Arc::new(a), Arc::new(b)]).unwrap();

        let planes = FitsReader::open(&path).unwrap().read_planes().unwrap();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].width(), 6);
        assert_eq!(planes[0].data()[[3, 5]], 1.5);
        assert_eq!(planes[1].hdu_index(), 1);
        assert!(planes[1].data()[[0, 0]].is_nan());
        assert!(!dir.path().join("out.fits.part").exists());
    }
}
