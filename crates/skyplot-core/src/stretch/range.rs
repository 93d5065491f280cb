use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_ASINH_Q, DEFAULT_GAMMA};
use crate::plane::ImagePlane;
use crate::zscale::{zscale, ZscaleParams};

/// Curve applied between the resolved lower and upper bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StretchAlgorithm {
    #[default]
    Linear,
    Log,
    LogLog,
    Equalization,
    Squared,
    Sqrt,
    Asinh,
    PowerLawGamma,
}

impl std::fmt::Display for StretchAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "Linear"),
            Self::Log => write!(f, "Log"),
            Self::LogLog => write!(f, "Log-Log"),
            Self::Equalization => write!(f, "Histogram Equalization"),
            Self::Squared => write!(f, "Squared"),
            Self::Sqrt => write!(f, "Square Root"),
            Self::Asinh => write!(f, "Asinh"),
            Self::PowerLawGamma => write!(f, "Power Law Gamma"),
        }
    }
}

/// How a bound's value is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundKind {
    /// A data value.
    Absolute,
    /// A percentile of the plane's histogram, 0 to 100.
    Percentage,
    /// Median plus this many sigma.
    Sigma,
    /// The zscale limit; the value is ignored.
    Zscale,
}

impl std::fmt::Display for BoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "Absolute"),
            Self::Percentage => write!(f, "Percentage"),
            Self::Sigma => write!(f, "Sigma"),
            Self::Zscale => write!(f, "Zscale"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub kind: BoundKind,
    pub value: f64,
}

impl Bound {
    pub fn absolute(value: f64) -> Self {
        Self {
            kind: BoundKind::Absolute,
            value,
        }
    }

    pub fn percentage(value: f64) -> Self {
        Self {
            kind: BoundKind::Percentage,
            value,
        }
    }

    pub fn sigma(value: f64) -> Self {
        Self {
            kind: BoundKind::Sigma,
            value,
        }
    }

    pub fn zscale() -> Self {
        Self {
            kind: BoundKind::Zscale,
            value: 0.0,
        }
    }
}

/// Stretch parameters for one band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeSpec {
    pub algorithm: StretchAlgorithm,
    pub lower: Bound,
    pub upper: Bound,
    pub zscale: ZscaleParams,
    /// Softening parameter of the asinh curve.
    pub asinh_q: f64,
    pub gamma: f64,
    /// Centre of the output curve, 0.5 leaves it unchanged.
    pub bias: f64,
    /// Slope of the output curve about `bias`, 1.0 leaves it unchanged.
    pub contrast: f64,
    /// Three-color only: scale all bands by a shared intensity.
    pub preserve_hue: bool,
}

impl Default for RangeSpec {
    fn default() -> Self {
        Self {
            algorithm: StretchAlgorithm::Linear,
            lower: Bound::percentage(1.0),
            upper: Bound::percentage(99.0),
            zscale: ZscaleParams::default(),
            asinh_q: DEFAULT_ASINH_Q,
            gamma: DEFAULT_GAMMA,
            bias: 0.5,
            contrast: 1.0,
            preserve_hue: false,
        }
    }
}

impl RangeSpec {
    pub fn new(algorithm: StretchAlgorithm, lower: Bound, upper: Bound) -> Self {
        Self {
            algorithm,
            lower,
            upper,
            ..Self::default()
        }
    }

    /// Data values of the lower and upper bounds for `plane`.
    pub fn resolve(&self, plane: &ImagePlane) -> ResolvedRange {
        let zrange = (self.lower.kind == BoundKind::Zscale || self.upper.kind == BoundKind::Zscale)
            .then(|| zscale(plane.data(), &self.zscale));
        let value_of = |bound: &Bound, upper: bool| match bound.kind {
            BoundKind::Absolute => bound.value,
            BoundKind::Percentage => plane.histogram().percentile(bound.value, upper),
            BoundKind::Sigma => plane.histogram().sigma(bound.value, upper),
            BoundKind::Zscale => match zrange {
                Some(z) if upper => z.z2,
                Some(z) => z.z1,
                None => 0.0,
            },
        };
        let lo = value_of(&self.lower, false);
        let hi = value_of(&self.upper, true);
        ResolvedRange { lo, hi }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} {:.2} .. {} {:.2}",
            self.algorithm, self.lower.kind, self.lower.value, self.upper.kind, self.upper.value
        )
    }
}

/// Bounds of a stretch as data values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedRange {
    pub lo: f64,
    pub hi: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::header::FitsHeader;
    use ndarray::Array2;

    #[test]
    fn full_percentage_range_is_data_extent() {
        let data = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f32);
        let plane = ImagePlane::new(data, FitsHeader::new()).unwrap();
        let spec = RangeSpec::new(
            StretchAlgorithm::Linear,
            Bound::percentage(0.0),
            Bound::percentage(100.0),
        );
        assert_eq!(spec.resolve(&plane), ResolvedRange { lo: 0.0, hi: 99.0 });
    }

    #[test]
    fn absolute_bounds_pass_through() {
        let plane = ImagePlane::new(Array2::zeros((2, 2)), FitsHeader::new()).unwrap();
        let spec = RangeSpec::new(StretchAlgorithm::Log, Bound::absolute(-3.0), Bound::absolute(7.5));
        assert_eq!(spec.resolve(&plane), ResolvedRange { lo: -3.0, hi: 7.5 });
    }
}
