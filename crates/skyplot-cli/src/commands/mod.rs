pub mod config;
pub mod info;
pub mod render;
pub mod rgb;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use image::imageops::FilterType;
use image::{ImageFormat, Rgb, RgbImage};
use skyplot_core::color_table::color_table;
use skyplot_core::stretch::{Bound, RangeSpec, StretchAlgorithm, StretchOutput};
use skyplot_core::transform::{CropPoint, RotateSpec, TransformOp};
use skyplot_core::wcs::{CoordSystem, ImagePt};
use skyplot_core::EngineConfig;

/// Engine config from `--config`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StretchArg {
    Linear,
    Log,
    Loglog,
    Equalization,
    Squared,
    Sqrt,
    Asinh,
    Gamma,
}

impl From<StretchArg> for StretchAlgorithm {
    fn from(arg: StretchArg) -> Self {
        match arg {
            StretchArg::Linear => StretchAlgorithm::Linear,
            StretchArg::Log => StretchAlgorithm::Log,
            StretchArg::Loglog => StretchAlgorithm::LogLog,
            StretchArg::Equalization => StretchAlgorithm::Equalization,
            StretchArg::Squared => StretchAlgorithm::Squared,
            StretchArg::Sqrt => StretchAlgorithm::Sqrt,
            StretchArg::Asinh => StretchAlgorithm::Asinh,
            StretchArg::Gamma => StretchAlgorithm::PowerLawGamma,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BoundArg {
    Percentage,
    Sigma,
    Absolute,
    Zscale,
}

/// Stretch options shared by the render commands.
#[derive(Args)]
pub struct RangeArgs {
    /// Stretch algorithm
    #[arg(long, value_enum)]
    pub stretch: Option<StretchArg>,

    /// How --lower and --upper are read
    #[arg(long, value_enum, default_value = "percentage")]
    pub bounds: BoundArg,

    /// Lower bound
    #[arg(long)]
    pub lower: Option<f64>,

    /// Upper bound
    #[arg(long)]
    pub upper: Option<f64>,
}

impl RangeArgs {
    /// Apply the given options on top of `base`.
    pub fn to_range(&self, base: &RangeSpec) -> RangeSpec {
        let mut range = base.clone();
        if let Some(s) = self.stretch {
            range.algorithm = s.into();
        }
        let bound = |value: f64| match self.bounds {
            BoundArg::Percentage => Bound::percentage(value),
            BoundArg::Sigma => Bound::sigma(value),
            BoundArg::Absolute => Bound::absolute(value),
            BoundArg::Zscale => Bound::zscale(),
        };
        if matches!(self.bounds, BoundArg::Zscale) {
            range.lower = Bound::zscale();
            range.upper = Bound::zscale();
        } else {
            if let Some(v) = self.lower {
                range.lower = bound(v);
            }
            if let Some(v) = self.upper {
                range.upper = bound(v);
            }
        }
        range
    }
}

/// Geometric options shared by the render commands, applied in the order
/// flip, rotate, crop.
#[derive(Args)]
pub struct GeometryArgs {
    /// Flip top to bottom
    #[arg(long)]
    pub flip: bool,

    /// Rotate counter-clockwise by this many degrees
    #[arg(long, conflicts_with = "north")]
    pub rotate: Option<f64>,

    /// Rotate so equatorial north is up
    #[arg(long)]
    pub north: bool,

    /// Crop to x1,y1,x2,y2 (image pixels)
    #[arg(long, value_delimiter = ',', num_args = 4)]
    pub crop: Option<Vec<f64>>,
}

impl GeometryArgs {
    pub fn ops(&self) -> Vec<TransformOp> {
        let mut ops = Vec::new();
        if self.flip {
            ops.push(TransformOp::FlipY);
        }
        if let Some(angle) = self.rotate {
            ops.push(TransformOp::Rotate(RotateSpec::Angle(angle)));
        } else if self.north {
            ops.push(TransformOp::Rotate(RotateSpec::North(CoordSystem::EquatorialJ2000)));
        }
        if let Some([x1, y1, x2, y2]) = self.crop.as_deref().and_then(|c| <[f64; 4]>::try_from(c).ok()) {
            ops.push(TransformOp::PostCrop {
                corner1: CropPoint::Image(ImagePt::new(x1, y1)),
                corner2: CropPoint::Image(ImagePt::new(x2, y2)),
            });
        }
        ops
    }
}

/// Save stretch output as an 8-bit RGB PNG, scaled by `zoom`. Single-band
/// output is colored through the given color table.
pub fn save_png(output: &StretchOutput, color_table_id: u32, zoom: f32, path: &Path) -> Result<()> {
    let (w, h) = (output.width as u32, output.height as u32);
    let img = if output.channels == 3 {
        RgbImage::from_raw(w, h, output.bytes.clone())
            .context("stretch output does not match its dimensions")?
    } else {
        let table = color_table(color_table_id);
        let mut img = RgbImage::new(w, h);
        for (i, byte) in output.bytes.iter().enumerate() {
            let (x, y) = ((i % output.width) as u32, (i / output.width) as u32);
            img.put_pixel(x, y, Rgb(table[*byte as usize]));
        }
        img
    };

    let img = if (zoom - 1.0).abs() > f32::EPSILON {
        let zw = ((w as f32 * zoom).round() as u32).max(1);
        let zh = ((h as f32 * zoom).round() as u32).max(1);
        image::imageops::resize(&img, zw, zh, FilterType::Triangle)
    } else {
        img
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
