use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Deref;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use flate2::read::GzDecoder;
use memmap2::Mmap;
use ndarray::Array2;
use num_traits::{AsPrimitive, ToPrimitive};
use rayon::prelude::*;
use tracing::debug;

use crate::consts::{FITS_BLOCK_SIZE, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{PlotError, Result};
use crate::io::header::FitsHeader;
use crate::plane::ImagePlane;

/// Layout of one header-data unit.
#[derive(Clone, Debug)]
pub struct HduInfo {
    pub index: usize,
    pub header: FitsHeader,
    pub bitpix: i32,
    /// NAXISn values in FITS order (NAXIS1 first).
    pub axes: Vec<usize>,
    pub data_offset: usize,
    pub data_len: usize,
    pub is_image: bool,
}

impl HduInfo {
    pub fn width(&self) -> usize {
        self.axes.first().copied().unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.axes.get(1).copied().unwrap_or(0)
    }

    /// Number of 2-D planes stored in this HDU.
    pub fn plane_count(&self) -> usize {
        if !self.is_image || self.axes.len() < 2 {
            return 0;
        }
        self.axes[2..].iter().product::<usize>().max(1)
    }

    fn bytes_per_sample(&self) -> usize {
        (self.bitpix.unsigned_abs() / 8) as usize
    }
}

enum FitsBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for FitsBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(m) => m,
            Self::Owned(v) => v,
        }
    }
}

/// FITS file reader over a memory map, or over the inflated bytes of a
/// gzip-compressed file.
pub struct FitsReader {
    bytes: FitsBytes,
    hdus: Vec<HduInfo>,
}

impl FitsReader {
    /// Open a FITS file. Paths ending in `.gz` are inflated into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PlotError::io_at(path, e))?;
        if is_gzip(path) {
            let mut inflated = Vec::new();
            GzDecoder::new(BufReader::new(file))
                .read_to_end(&mut inflated)
                .map_err(|e| PlotError::parse(format!("{}: bad gzip stream: {e}", path.display())))?;
            debug!(path = %path.display(), bytes = inflated.len(), "inflated gzip FITS");
            return Self::from_bytes_inner(FitsBytes::Owned(inflated));
        }
        let mmap = unsafe { Mmap::map(&file).map_err(|e| PlotError::io_at(path, e))? };
        Self::from_bytes_inner(FitsBytes::Mapped(mmap))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes_inner(FitsBytes::Owned(bytes))
    }

    fn from_bytes_inner(bytes: FitsBytes) -> Result<Self> {
        let hdus = scan_hdus(&bytes)?;
        Ok(Self { bytes, hdus })
    }

    pub fn hdus(&self) -> &[HduInfo] {
        &self.hdus
    }

    /// Decode every image plane in file order: HDUs first, then cube
    /// slices within an HDU.
    pub fn read_planes(&self) -> Result<Vec<ImagePlane>> {
        let mut planes = Vec::new();
        for hdu in &self.hdus {
            if hdu.axes.len() > 3 && hdu.axes[3..].iter().any(|&n| n > 1) {
                return Err(PlotError::parse(format!(
                    "HDU {} has more than three populated axes",
                    hdu.index
                )));
            }
            let count = hdu.plane_count();
            for slice in 0..count {
                let cube_plane = (count > 1).then_some(slice);
                let plane = self.decode_plane(hdu, slice)?;
                let index = planes.len();
                planes.push(plane.with_location(index, hdu.index, cube_plane));
            }
        }
        if planes.is_empty() {
            return Err(PlotError::parse("file contains no image data"));
        }
        Ok(planes)
    }

    fn decode_plane(&self, hdu: &HduInfo, slice: usize) -> Result<ImagePlane> {
        let (w, h) = (hdu.width(), hdu.height());
        let bps = hdu.bytes_per_sample();
        let overflow = || PlotError::parse(format!("HDU {} size overflows", hdu.index));
        let plane_bytes = w
            .checked_mul(h)
            .and_then(|n| n.checked_mul(bps))
            .ok_or_else(overflow)?;
        let start = slice
            .checked_mul(plane_bytes)
            .and_then(|n| n.checked_add(hdu.data_offset))
            .ok_or_else(overflow)?;
        let end = start.checked_add(plane_bytes).ok_or_else(overflow)?;
        let raw = self
            .bytes
            .get(start..end)
            .ok_or_else(|| PlotError::parse(format!("HDU {} data is truncated", hdu.index)))?;

        let bscale = hdu.header.get_f64("BSCALE").unwrap_or(1.0);
        let bzero = hdu.header.get_f64("BZERO").unwrap_or(0.0);
        // BLANK only applies to integer data.
        let blank = hdu.header.get_i64("BLANK").filter(|_| hdu.bitpix > 0);
        let scaling = Scaling { bscale, bzero, blank };

        let values = match hdu.bitpix {
            8 => scaling.decode(raw, 1, |b| b[0]),
            16 => scaling.decode(raw, 2, BigEndian::read_i16),
            32 => scaling.decode(raw, 4, BigEndian::read_i32),
            64 => scaling.decode(raw, 8, BigEndian::read_i64),
            -32 => scaling.decode(raw, 4, BigEndian::read_f32),
            -64 => scaling.decode(raw, 8, BigEndian::read_f64),
            other => return Err(PlotError::parse(format!("unsupported BITPIX {other}"))),
        };

        let data = Array2::from_shape_vec((h, w), values)
            .map_err(|e| PlotError::parse(format!("bad plane shape: {e}")))?;
        let mut header = hdu.header.clone();
        if hdu.plane_count() > 1 {
            header.set_i64("NAXIS", 2);
            header.remove("NAXIS3");
        }
        ImagePlane::new(data, header)
    }
}

struct Scaling {
    bscale: f64,
    bzero: f64,
    blank: Option<i64>,
}

impl Scaling {
    fn decode<T, F>(&self, raw: &[u8], size: usize, read: F) -> Vec<f32>
    where
        T: ToPrimitive + AsPrimitive<f64>,
        F: Fn(&[u8]) -> T + Sync + Send,
    {
        let convert = |chunk: &[u8]| {
            let v = read(chunk);
            if self.blank.is_some() && v.to_i64() == self.blank {
                return f32::NAN;
            }
            let v: f64 = v.as_();
            (v * self.bscale + self.bzero) as f32
        };
        if raw.len() / size < PARALLEL_PIXEL_THRESHOLD {
            raw.chunks_exact(size).map(convert).collect()
        } else {
            raw.par_chunks_exact(size).map(convert).collect()
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

fn scan_hdus(buf: &[u8]) -> Result<Vec<HduInfo>> {
    if buf.len() < FITS_BLOCK_SIZE || !buf.starts_with(b"SIMPLE  =") {
        return Err(PlotError::parse("missing SIMPLE card"));
    }

    let mut hdus = Vec::new();
    let mut offset = 0;
    while offset + FITS_BLOCK_SIZE <= buf.len() {
        let (header, header_len) = FitsHeader::parse(&buf[offset..])?;
        let index = hdus.len();
        if index == 0 && header.get_bool("SIMPLE") != Some(true) {
            return Err(PlotError::parse("SIMPLE is not T"));
        }

        let bitpix = header
            .get_i64("BITPIX")
            .ok_or_else(|| PlotError::parse(format!("HDU {index} has no BITPIX")))?
            as i32;
        let naxis = header.get_i64("NAXIS").unwrap_or(0).max(0) as usize;
        let axes = (1..=naxis)
            .map(|n| {
                header
                    .get_i64(&format!("NAXIS{n}"))
                    .filter(|v| *v >= 0)
                    .map(|v| v as usize)
                    .ok_or_else(|| PlotError::parse(format!("HDU {index} has bad NAXIS{n}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let pcount = header.get_i64("PCOUNT").unwrap_or(0).max(0) as usize;
        let gcount = header.get_i64("GCOUNT").unwrap_or(1).max(1) as usize;
        let (elements, data_len) = data_size(index, bitpix, &axes, pcount, gcount)?;

        let is_image = match header.get_str("XTENSION") {
            None => index == 0,
            Some(x) => x.trim() == "IMAGE",
        } && axes.len() >= 2
            && elements > 0;

        let data_offset = offset + header_len;
        let data_end = data_offset
            .checked_add(data_len)
            .ok_or_else(|| PlotError::parse(format!("HDU {index} size overflows")))?;
        if is_image && data_end > buf.len() {
            return Err(PlotError::parse(format!(
                "HDU {index} data is truncated: need {data_len} bytes"
            )));
        }

        hdus.push(HduInfo {
            index,
            header,
            bitpix,
            axes,
            data_offset,
            data_len,
            is_image,
        });
        match data_len
            .div_ceil(FITS_BLOCK_SIZE)
            .checked_mul(FITS_BLOCK_SIZE)
            .and_then(|padded| padded.checked_add(data_offset))
        {
            Some(next) => offset = next,
            None => break,
        }
    }
    Ok(hdus)
}

/// Element count and unpadded data length of one HDU, from
/// `|BITPIX|/8 * GCOUNT * (PCOUNT + NAXIS1 * .. * NAXISn)`.
fn data_size(
    index: usize,
    bitpix: i32,
    axes: &[usize],
    pcount: usize,
    gcount: usize,
) -> Result<(usize, usize)> {
    let overflow = || PlotError::parse(format!("HDU {index} size overflows"));
    let elements = if axes.is_empty() {
        0
    } else {
        axes.iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(overflow)?
    };
    let data_len = pcount
        .checked_add(elements)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bitpix.unsigned_abs() as usize / 8))
        .ok_or_else(overflow)?;
    Ok((elements, data_len))
}
