use std::path::Path;

use tracing::info;

use crate::error::{PlotError, Result};
use crate::io::fits::FitsReader;
use crate::plane::ImagePlane;

/// Turns a file into decoded planes. The cache calls this on a miss.
pub trait PlaneSource: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Vec<ImagePlane>>;
}

/// Reads FITS files from disk, refusing files over a size limit.
#[derive(Clone, Debug)]
pub struct FitsSource {
    max_file_size: u64,
}

impl FitsSource {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

impl PlaneSource for FitsSource {
    fn parse(&self, path: &Path) -> Result<Vec<ImagePlane>> {
        let meta = std::fs::metadata(path).map_err(|e| PlotError::io_at(path, e))?;
        if meta.len() > self.max_file_size {
            return Err(PlotError::Resource(format!(
                "{} is {} bytes, limit is {}",
                path.display(),
                meta.len(),
                self.max_file_size
            )));
        }
        let planes = FitsReader::open(path)?.read_planes()?;
        info!(path = %path.display(), planes = planes.len(), "parsed FITS file");
        Ok(planes)
    }
}
