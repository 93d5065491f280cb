use ndarray::s;

use crate::error::{PlotError, Result};
use crate::plane::ImagePlane;
use crate::wcs::{ImagePt, SkyPoint};

use super::CropPoint;

/// Pixel rectangle: `x`, `y` is the first column and row kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl CropRect {
    /// Rectangle covering every pixel touched by the two corners, clipped
    /// to the image. Zero-area rectangles and rectangles whose corners both
    /// lie outside the image are rejected.
    pub fn from_corners(a: ImagePt, b: ImagePt, width: usize, height: usize) -> Result<Self> {
        let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
        let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
        if ![x0, x1, y0, y1].iter().all(|v| v.is_finite()) {
            return Err(PlotError::geometry("crop corner is not a finite position"));
        }
        if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
            return Err(PlotError::geometry(format!(
                "crop rectangle ({:.1}, {:.1}) - ({:.1}, {:.1}) has no area",
                a.x, a.y, b.x, b.y
            )));
        }
        let inside = |p: ImagePt| {
            p.x >= 0.0 && p.y >= 0.0 && p.x <= width as f64 && p.y <= height as f64
        };
        if !inside(a) && !inside(b) {
            return Err(PlotError::geometry(format!(
                "both crop corners lie outside the {width}x{height} image"
            )));
        }

        let col0 = x0.floor().max(0.0) as usize;
        let row0 = y0.floor().max(0.0) as usize;
        let col1 = (x1.ceil().max(0.0) as usize).min(width);
        let row1 = (y1.ceil().max(0.0) as usize).min(height);
        if col1 <= col0 || row1 <= row0 {
            return Err(PlotError::geometry("crop rectangle does not overlap the image"));
        }
        Ok(Self {
            x: col0,
            y: row0,
            width: col1 - col0,
            height: row1 - row0,
        })
    }

    pub fn params(&self) -> String {
        format!("{}-{}-{}x{}", self.x, self.y, self.width, self.height)
    }
}

pub fn crop(plane: &ImagePlane, rect: &CropRect) -> Result<ImagePlane> {
    let data = plane
        .data()
        .slice(s![rect.y..rect.y + rect.height, rect.x..rect.x + rect.width])
        .to_owned();
    let mut header = plane.header().clone();
    if let Some(crpix1) = header.get_f64("CRPIX1") {
        header.set_f64("CRPIX1", crpix1 - rect.x as f64);
    }
    if let Some(crpix2) = header.get_f64("CRPIX2") {
        header.set_f64("CRPIX2", crpix2 - rect.y as f64);
    }
    plane.derive(data, header)
}

pub fn resolve_point(plane: &ImagePlane, point: &CropPoint) -> Result<ImagePt> {
    match point {
        CropPoint::Image(pt) => Ok(*pt),
        CropPoint::Sky(sky) => sky_to_image(plane, sky),
    }
}

/// Rectangle `size_deg` on a side centred on `center`.
pub fn centered_rect(plane: &ImagePlane, center: &SkyPoint, size_deg: f64) -> Result<CropRect> {
    if !size_deg.is_finite() || size_deg <= 0.0 {
        return Err(PlotError::geometry(format!("crop size {size_deg} must be positive")));
    }
    let pt = sky_to_image(plane, center)?;
    let wcs = plane
        .wcs()
        .ok_or_else(|| PlotError::geometry("image has no usable projection"))?;
    let half = size_deg / 2.0 * crate::consts::ARCSEC_PER_DEG / wcs.pixel_scale_arcsec();
    CropRect::from_corners(
        ImagePt::new(pt.x - half, pt.y - half),
        ImagePt::new(pt.x + half, pt.y + half),
        plane.width(),
        plane.height(),
    )
}

fn sky_to_image(plane: &ImagePlane, sky: &SkyPoint) -> Result<ImagePt> {
    let wcs = plane
        .wcs()
        .ok_or_else(|| PlotError::geometry("sky position given for an image with no projection"))?;
    wcs.sky_to_pixel(sky).ok_or_else(|| {
        PlotError::geometry(format!(
            "({:.5}, {:.5}) does not project onto the image",
            sky.lon, sky.lat
        ))
    })
}
