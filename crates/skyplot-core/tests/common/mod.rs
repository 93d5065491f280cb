#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use skyplot_core::consts::FITS_BLOCK_SIZE;
use skyplot_core::io::{FitsHeader, HeaderValue};

/// Sample encoding for synthetic HDUs.
#[derive(Clone, Copy, Debug)]
pub enum Bitpix {
    U8,
    I16,
    I32,
    F32,
    F64,
}

impl Bitpix {
    fn code(self) -> i64 {
        match self {
            Self::U8 => 8,
            Self::I16 => 16,
            Self::I32 => 32,
            Self::F32 => -32,
            Self::F64 => -64,
        }
    }

    fn encode(self, v: f64, out: &mut Vec<u8>) {
        match self {
            Self::U8 => out.push(v as u8),
            Self::I16 => out.extend_from_slice(&(v as i16).to_be_bytes()),
            Self::I32 => out.extend_from_slice(&(v as i32).to_be_bytes()),
            Self::F32 => out.extend_from_slice(&(v as f32).to_be_bytes()),
            Self::F64 => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

/// One image HDU: `axes` in FITS order, `values` row-major from the first
/// FITS row.
pub struct Hdu {
    pub bitpix: Bitpix,
    pub axes: Vec<usize>,
    pub values: Vec<f64>,
    pub extra: FitsHeader,
}

impl Hdu {
    pub fn image(width: usize, height: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), width * height);
        Self {
            bitpix: Bitpix::F32,
            axes: vec![width, height],
            values,
            extra: FitsHeader::new(),
        }
    }

    pub fn cube(width: usize, height: usize, depth: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), width * height * depth);
        Self {
            bitpix: Bitpix::F32,
            axes: vec![width, height, depth],
            values,
            extra: FitsHeader::new(),
        }
    }

    pub fn with_bitpix(mut self, bitpix: Bitpix) -> Self {
        self.bitpix = bitpix;
        self
    }

    pub fn with_f64(mut self, key: &str, value: f64) -> Self {
        self.extra.set_f64(key, value);
        self
    }

    pub fn with_i64(mut self, key: &str, value: i64) -> Self {
        self.extra.set_i64(key, value);
        self
    }

    pub fn with_str(mut self, key: &str, value: &str) -> Self {
        self.extra.set_str(key, value);
        self
    }

    /// Gnomonic WCS centred on the image, north up and east left.
    pub fn with_tan_wcs(self, ra: f64, dec: f64, scale_deg: f64) -> Self {
        let (w, h) = (self.axes[0] as f64, self.axes[1] as f64);
        self.with_str("CTYPE1", "RA---TAN")
            .with_str("CTYPE2", "DEC--TAN")
            .with_f64("CRPIX1", w / 2.0 + 0.5)
            .with_f64("CRPIX2", h / 2.0 + 0.5)
            .with_f64("CRVAL1", ra)
            .with_f64("CRVAL2", dec)
            .with_f64("CD1_1", -scale_deg)
            .with_f64("CD1_2", 0.0)
            .with_f64("CD2_1", 0.0)
            .with_f64("CD2_2", scale_deg)
    }
}

/// Serialize HDUs into a FITS file: the first as primary, the rest as
/// IMAGE extensions.
pub fn build_fits(hdus: &[Hdu]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, hdu) in hdus.iter().enumerate() {
        let mut header = FitsHeader::new();
        if i == 0 {
            header.set("SIMPLE", HeaderValue::Logical(true));
        } else {
            header.set_str("XTENSION", "IMAGE");
        }
        header.set_i64("BITPIX", hdu.bitpix.code());
        header.set_i64("NAXIS", hdu.axes.len() as i64);
        for (n, len) in hdu.axes.iter().enumerate() {
            header.set_i64(&format!("NAXIS{}", n + 1), *len as i64);
        }
        if i == 0 && hdus.len() > 1 {
            header.set("EXTEND", HeaderValue::Logical(true));
        }
        if i > 0 {
            header.set_i64("PCOUNT", 0);
            header.set_i64("GCOUNT", 1);
        }
        for card in hdu.extra.cards() {
            header.push(card.clone());
        }
        buf.extend_from_slice(&header.to_bytes());

        let start = buf.len();
        for v in &hdu.values {
            hdu.bitpix.encode(*v, &mut buf);
        }
        let written = buf.len() - start;
        buf.resize(start + written.div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE, 0);
    }
    buf
}

/// Single-HDU float image.
pub fn build_image(width: usize, height: usize, values: Vec<f64>) -> Vec<u8> {
    build_fits(&[Hdu::image(width, height, values)])
}

/// Values increasing left to right, then bottom to top.
pub fn ramp(width: usize, height: usize) -> Vec<f64> {
    (0..width * height).map(|i| i as f64).collect()
}

/// Write bytes to a temporary `.fits` file. The file lives as long as the
/// returned handle.
pub fn write_test_fits(data: &[u8]) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".fits")
        .tempfile()
        .expect("create temp file");
    f.write_all(data).expect("write FITS data");
    f.flush().expect("flush");
    f
}

/// Write bytes to `dir/name`.
pub fn write_fits_in(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write FITS file");
    path
}

/// Gzip-compress bytes.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).expect("compress");
    enc.finish().expect("finish gzip")
}
