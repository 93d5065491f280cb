use serde::{Deserialize, Serialize};

use crate::error::{PlotError, Result};
use crate::plane::ImagePlane;

/// How the display zoom level is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ZoomPolicy {
    /// Use this level as given.
    Explicit(f32),
    /// Scale the image to this many screen pixels across.
    ToWidth(u32),
    /// Largest level at which the whole image fits in the given box.
    FullFit(u32, u32),
    /// Show this many arcseconds per screen pixel.
    ArcSecPerPixel(f64),
}

impl Default for ZoomPolicy {
    fn default() -> Self {
        Self::Explicit(1.0)
    }
}

impl std::fmt::Display for ZoomPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit(level) => write!(f, "{level}x"),
            Self::ToWidth(w) => write!(f, "fit width {w}"),
            Self::FullFit(w, h) => write!(f, "fit {w}x{h}"),
            Self::ArcSecPerPixel(v) => write!(f, "{v}\"/px"),
        }
    }
}

/// Zoom level for an image of the given size. `ArcSecPerPixel` needs the
/// image's pixel scale; use [`resolve_for_plane`] for it.
pub fn resolve(policy: ZoomPolicy, width: usize, height: usize, max_level: f32) -> Result<f32> {
    resolve_with_scale(policy, width, height, max_level, None)
}

pub fn resolve_for_plane(policy: ZoomPolicy, plane: &ImagePlane, max_level: f32) -> Result<f32> {
    resolve_with_scale(
        policy,
        plane.width(),
        plane.height(),
        max_level,
        plane.pixel_scale_arcsec(),
    )
}

fn resolve_with_scale(
    policy: ZoomPolicy,
    width: usize,
    height: usize,
    max_level: f32,
    pixel_scale: Option<f64>,
) -> Result<f32> {
    if width == 0 || height == 0 {
        return Err(PlotError::InvalidZoom(format!(
            "image size {width}x{height} is empty"
        )));
    }
    let level = match policy {
        ZoomPolicy::Explicit(level) => {
            if !level.is_finite() || level <= 0.0 {
                return Err(PlotError::InvalidZoom(format!("level {level} is not positive")));
            }
            return Ok(level);
        }
        ZoomPolicy::ToWidth(target) => {
            positive(target as f64, "target width")?;
            (target as f64 / width as f64) as f32
        }
        ZoomPolicy::FullFit(tw, th) => {
            positive(tw as f64, "target width")?;
            positive(th as f64, "target height")?;
            let zx = tw as f64 / width as f64;
            let zy = th as f64 / height as f64;
            zx.min(zy) as f32
        }
        ZoomPolicy::ArcSecPerPixel(value) => {
            positive(value, "arcsec per pixel")?;
            let scale = pixel_scale
                .ok_or_else(|| PlotError::InvalidZoom("image has no pixel scale".into()))?;
            return Ok((scale / value) as f32);
        }
    };
    Ok(if max_level > 0.0 { level.min(max_level) } else { level })
}

fn positive(v: f64, what: &str) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(PlotError::InvalidZoom(format!("{what} {v} is not positive")))
    }
}
