//! Ordered geometric operations on image planes. Every operation builds a
//! new plane; the input is never touched.

pub mod crop;
pub mod flip;
pub mod rotate;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::plane::ImagePlane;
use crate::wcs::{CoordSystem, ImagePt, SkyPoint};

pub use crop::CropRect;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RotateSpec {
    /// Counter-clockwise, in degrees.
    Angle(f64),
    /// Bring north of the given system to the top.
    North(CoordSystem),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CropPoint {
    Image(ImagePt),
    Sky(SkyPoint),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransformOp {
    FlipY,
    FlipX,
    Rotate(RotateSpec),
    PostCrop {
        corner1: CropPoint,
        corner2: CropPoint,
    },
    PostCropAndCenter {
        center: SkyPoint,
        size_deg: f64,
    },
}

impl TransformOp {
    /// File name suffix for planes produced by this operation.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::FlipY => "flip",
            Self::FlipX => "flipx",
            Self::Rotate(_) => "rot",
            Self::PostCrop { .. } | Self::PostCropAndCenter { .. } => "crop",
        }
    }
}

impl std::fmt::Display for TransformOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FlipY => write!(f, "Flip Y"),
            Self::FlipX => write!(f, "Flip X"),
            Self::Rotate(RotateSpec::Angle(a)) => write!(f, "Rotate {a:.2}°"),
            Self::Rotate(RotateSpec::North(sys)) => write!(f, "Rotate north up ({sys})"),
            Self::PostCrop { .. } => write!(f, "Crop"),
            Self::PostCropAndCenter { size_deg, .. } => write!(f, "Crop {size_deg:.4}° around centre"),
        }
    }
}

/// One operation that produced new pixels.
#[derive(Clone, Debug)]
pub struct AppliedOp {
    pub op: TransformOp,
    pub plane: Arc<ImagePlane>,
    pub suffix: &'static str,
    pub params: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TransformOutcome {
    /// Result of the last operation, or the input if nothing applied.
    pub plane: Arc<ImagePlane>,
    pub steps: Vec<AppliedOp>,
}

/// Apply `ops` in the order given. Operations that would leave the pixels
/// unchanged are skipped and produce no step.
pub fn apply(plane: &Arc<ImagePlane>, ops: &[TransformOp]) -> Result<TransformOutcome> {
    let mut current = Arc::clone(plane);
    let mut steps = Vec::new();
    for op in ops {
        if let Some((next, params)) = apply_one(&current, op)? {
            debug!(op = %op, width = next.width(), height = next.height(), "applied transform");
            let next = Arc::new(next);
            steps.push(AppliedOp {
                op: op.clone(),
                plane: Arc::clone(&next),
                suffix: op.suffix(),
                params,
            });
            current = next;
        }
    }
    Ok(TransformOutcome {
        plane: current,
        steps,
    })
}

fn apply_one(plane: &ImagePlane, op: &TransformOp) -> Result<Option<(ImagePlane, Option<String>)>> {
    let out = match op {
        TransformOp::FlipY => Some((flip::flip_y(plane)?, None)),
        TransformOp::FlipX => Some((flip::flip_x(plane)?, None)),
        TransformOp::Rotate(RotateSpec::Angle(angle)) => {
            if angle.rem_euclid(360.0) == 0.0 {
                None
            } else {
                Some((rotate::rotate(plane, *angle)?, Some(format!("{angle:.2}"))))
            }
        }
        TransformOp::Rotate(RotateSpec::North(system)) => {
            let angle = rotate::north_up_angle(plane, *system)?;
            let tag = match system {
                CoordSystem::EquatorialJ2000 => "north",
                CoordSystem::Galactic => "north-gal",
            };
            Some((rotate::rotate(plane, angle)?, Some(tag.to_string())))
        }
        TransformOp::PostCrop { corner1, corner2 } => {
            let a = crop::resolve_point(plane, corner1)?;
            let b = crop::resolve_point(plane, corner2)?;
            let rect = CropRect::from_corners(a, b, plane.width(), plane.height())?;
            Some((crop::crop(plane, &rect)?, Some(rect.params())))
        }
        TransformOp::PostCropAndCenter { center, size_deg } => {
            let rect = crop::centered_rect(plane, center, *size_deg)?;
            Some((crop::crop(plane, &rect)?, Some(rect.params())))
        }
    };
    Ok(out)
}
