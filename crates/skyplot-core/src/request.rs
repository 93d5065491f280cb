use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::stretch::RangeSpec;
use crate::transform::TransformOp;
use crate::zoom::ZoomPolicy;

/// Everything needed to build one band of a plot from its source file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotRequest {
    pub source: PathBuf,
    /// Plane index within `source`.
    pub plane_index: usize,
    pub range: RangeSpec,
    pub zoom: ZoomPolicy,
    /// Geometric operations, applied in this order.
    pub ops: Vec<TransformOp>,
    pub color_table: u32,
    pub mask_bits: Option<u64>,
}

impl PlotRequest {
    pub fn new(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            plane_index: 0,
            range: RangeSpec::default(),
            zoom: ZoomPolicy::default(),
            ops: Vec::new(),
            color_table: 0,
            mask_bits: None,
        }
    }

    pub fn with_plane(mut self, index: usize) -> Self {
        self.plane_index = index;
        self
    }

    pub fn with_range(mut self, range: RangeSpec) -> Self {
        self.range = range;
        self
    }

    pub fn with_zoom(mut self, zoom: ZoomPolicy) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_op(mut self, op: TransformOp) -> Self {
        self.push_op(op);
        self
    }

    pub fn with_color_table(mut self, id: u32) -> Self {
        self.color_table = id;
        self
    }

    pub fn with_mask_bits(mut self, bits: u64) -> Self {
        self.mask_bits = Some(bits);
        self
    }

    /// Record an operation applied after the existing ones. Two vertical
    /// flips in a row cancel out.
    pub fn push_op(&mut self, op: TransformOp) {
        if op == TransformOp::FlipY && self.ops.last() == Some(&TransformOp::FlipY) {
            self.ops.pop();
        } else {
            self.ops.push(op);
        }
    }

    /// Whether building this request touches the pixels.
    pub fn has_post_processing(&self) -> bool {
        !self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_flip_is_dropped() {
        let mut req = PlotRequest::new("a.fits").with_op(TransformOp::FlipY);
        req.push_op(TransformOp::FlipY);
        assert!(req.ops.is_empty());
        assert!(!req.has_post_processing());
    }
}
