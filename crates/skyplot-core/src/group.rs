use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PlotError, Result};
use crate::plane::ImagePlane;
use crate::state::Band;

/// Planes resolved for one render, keyed by band. Built fresh for each
/// operation and never stored.
#[derive(Clone, Debug, Default)]
pub struct ActiveImageGroup {
    planes: BTreeMap<Band, Arc<ImagePlane>>,
}

impl ActiveImageGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(plane: Arc<ImagePlane>) -> Self {
        let mut group = Self::new();
        group.insert(Band::NoBand, plane);
        group
    }

    pub fn insert(&mut self, band: Band, plane: Arc<ImagePlane>) {
        self.planes.insert(band, plane);
    }

    pub fn get(&self, band: Band) -> Option<&Arc<ImagePlane>> {
        self.planes.get(&band)
    }

    pub fn require(&self, band: Band) -> Result<&Arc<ImagePlane>> {
        self.get(band)
            .ok_or_else(|| PlotError::MissingBand(band.to_string()))
    }

    /// First plane in band order.
    pub fn primary(&self) -> Option<(Band, &Arc<ImagePlane>)> {
        self.planes.iter().next().map(|(b, p)| (*b, p))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, &Arc<ImagePlane>)> {
        self.planes.iter().map(|(b, p)| (*b, p))
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Common size of all planes.
    pub fn dimensions(&self) -> Result<(usize, usize)> {
        let mut dims = None;
        for (band, plane) in self.iter() {
            let d = (plane.width(), plane.height());
            match dims {
                None => dims = Some(d),
                Some(first) if first != d => {
                    return Err(PlotError::geometry(format!(
                        "{band} band is {}x{}, expected {}x{}",
                        d.0, d.1, first.0, first.1
                    )))
                }
                _ => {}
            }
        }
        dims.ok_or(PlotError::InvalidDimensions { width: 0, height: 0 })
    }
}
