use std::sync::{Arc, OnceLock};

use ndarray::Array2;

use crate::error::{PlotError, Result};
use crate::histogram::Histogram;
use crate::io::header::FitsHeader;
use crate::wcs::{ImagePt, ProjectionKind, Wcs};

/// One decoded image plane. Pixel values are physical (BSCALE/BZERO applied,
/// BLANK mapped to NaN), row-major with shape `(height, width)`.
///
/// Planes are never modified after construction; transforms build new ones.
#[derive(Clone, Debug)]
pub struct ImagePlane {
    data: Arc<Array2<f32>>,
    header: FitsHeader,
    projection: ProjectionKind,
    /// Position of this plane in the file's plane list.
    index: usize,
    hdu_index: usize,
    cube_plane: Option<usize>,
    histogram: OnceLock<Arc<Histogram>>,
}

impl ImagePlane {
    pub fn new(data: Array2<f32>, header: FitsHeader) -> Result<Self> {
        let (height, width) = data.dim();
        if width == 0 || height == 0 {
            return Err(PlotError::InvalidDimensions { width, height });
        }
        let projection = ProjectionKind::from_header(&header);
        Ok(Self {
            data: Arc::new(data),
            header,
            projection,
            index: 0,
            hdu_index: 0,
            cube_plane: None,
            histogram: OnceLock::new(),
        })
    }

    pub fn with_location(mut self, index: usize, hdu_index: usize, cube_plane: Option<usize>) -> Self {
        self.index = index;
        self.hdu_index = hdu_index;
        self.cube_plane = cube_plane;
        self
    }

    /// New plane with different pixels and header but the same location in
    /// its source file.
    pub fn derive(&self, data: Array2<f32>, header: FitsHeader) -> Result<Self> {
        Ok(Self::new(data, header)?.with_location(self.index, self.hdu_index, self.cube_plane))
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn shared_data(&self) -> Arc<Array2<f32>> {
        Arc::clone(&self.data)
    }

    pub fn header(&self) -> &FitsHeader {
        &self.header
    }

    pub fn projection(&self) -> ProjectionKind {
        self.projection
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn hdu_index(&self) -> usize {
        self.hdu_index
    }

    pub fn cube_plane(&self) -> Option<usize> {
        self.cube_plane
    }

    /// Histogram, computed on first use.
    pub fn histogram(&self) -> Arc<Histogram> {
        Arc::clone(
            self.histogram
                .get_or_init(|| Arc::new(Histogram::from_array(&self.data))),
        )
    }

    pub fn wcs(&self) -> Option<Wcs> {
        Wcs::from_header(&self.header).ok()
    }

    pub fn pixel_scale_arcsec(&self) -> Option<f64> {
        self.wcs().map(|w| w.pixel_scale_arcsec())
    }

    /// EXTTYPE of the HDU, used to spot mask and variance planes.
    pub fn ext_type(&self) -> Option<&str> {
        self.header.get_str("EXTTYPE")
    }

    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Value of the pixel containing `pt`. Blank pixels give NaN.
    pub fn flux(&self, pt: ImagePt) -> Result<f64> {
        let col = (pt.x - 0.5).round();
        let row = (pt.y - 0.5).round();
        if col < 0.0 || row < 0.0 || col >= self.width() as f64 || row >= self.height() as f64 {
            return Err(PlotError::geometry(format!(
                "point ({:.1}, {:.1}) is outside the {}x{} image",
                pt.x,
                pt.y,
                self.width(),
                self.height()
            )));
        }
        Ok(self.data[[row as usize, col as usize]] as f64)
    }
}
