use crate::consts::LOG_STRETCH_EXPONENT;
use crate::plane::ImagePlane;

use super::range::{RangeSpec, ResolvedRange, StretchAlgorithm};

/// Maps raw pixel values of one band to display bytes.
#[derive(Clone, Debug)]
pub struct PixelMapper {
    algorithm: StretchAlgorithm,
    range: ResolvedRange,
    asinh_q: f64,
    gamma: f64,
    bias: f64,
    contrast: f64,
    equalization: Option<Vec<f64>>,
    blank: u8,
}

impl PixelMapper {
    pub fn new(spec: &RangeSpec, plane: &ImagePlane, blank: u8) -> Self {
        let equalization = (spec.algorithm == StretchAlgorithm::Equalization)
            .then(|| plane.histogram().equalization_table());
        Self::with_range(spec, spec.resolve(plane), equalization, blank)
    }

    pub fn with_range(
        spec: &RangeSpec,
        range: ResolvedRange,
        equalization: Option<Vec<f64>>,
        blank: u8,
    ) -> Self {
        Self {
            algorithm: spec.algorithm,
            range,
            asinh_q: spec.asinh_q,
            gamma: spec.gamma,
            bias: spec.bias,
            contrast: spec.contrast,
            equalization,
            blank,
        }
    }

    pub fn range(&self) -> ResolvedRange {
        self.range
    }

    /// Position of `v` between the bounds, clamped to `[0, 1]`.
    pub fn normalize(&self, v: f64) -> f64 {
        let ResolvedRange { lo, hi } = self.range;
        if hi <= lo {
            return 0.0;
        }
        ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    pub fn byte(&self, v: f32) -> u8 {
        if !v.is_finite() {
            return self.blank;
        }
        let v = v as f64;
        if let Some(table) = &self.equalization {
            let level = table.partition_point(|&t| t <= v);
            return level.saturating_sub(1).min(255) as u8;
        }
        let t = self.shape(self.curve(self.normalize(v)));
        (t * 255.0).round() as u8
    }

    fn curve(&self, t: f64) -> f64 {
        match self.algorithm {
            StretchAlgorithm::Linear | StretchAlgorithm::Equalization => t,
            StretchAlgorithm::Log => log_curve(t),
            StretchAlgorithm::LogLog => log_curve(log_curve(t)),
            StretchAlgorithm::Squared => t * t,
            StretchAlgorithm::Sqrt => t.sqrt(),
            StretchAlgorithm::Asinh => {
                let q = self.asinh_q.max(f64::EPSILON);
                (q * t).asinh() / q.asinh()
            }
            StretchAlgorithm::PowerLawGamma => {
                if self.gamma > 0.0 {
                    t.powf(1.0 / self.gamma)
                } else {
                    t
                }
            }
        }
    }

    fn shape(&self, t: f64) -> f64 {
        if self.bias == 0.5 && self.contrast == 1.0 {
            return t;
        }
        ((t - self.bias) * self.contrast + 0.5).clamp(0.0, 1.0)
    }
}

fn log_curve(t: f64) -> f64 {
    (LOG_STRETCH_EXPONENT * t).ln_1p() / LOG_STRETCH_EXPONENT.ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stretch::range::Bound;

    fn mapper(algorithm: StretchAlgorithm) -> PixelMapper {
        let spec = RangeSpec::new(algorithm, Bound::absolute(0.0), Bound::absolute(100.0));
        PixelMapper::with_range(&spec, ResolvedRange { lo: 0.0, hi: 100.0 }, None, 0)
    }

    #[test]
    fn every_curve_spans_the_byte_range() {
        for algorithm in [
            StretchAlgorithm::Linear,
            StretchAlgorithm::Log,
            StretchAlgorithm::LogLog,
            StretchAlgorithm::Squared,
            StretchAlgorithm::Sqrt,
            StretchAlgorithm::Asinh,
            StretchAlgorithm::PowerLawGamma,
        ] {
            let m = mapper(algorithm);
            assert_eq!(m.byte(0.0), 0, "{algorithm}");
            assert_eq!(m.byte(100.0), 255, "{algorithm}");
            assert_eq!(m.byte(-50.0), 0, "{algorithm}");
            assert_eq!(m.byte(1e9), 255, "{algorithm}");
        }
    }

    #[test]
    fn log_lifts_faint_values() {
        assert!(mapper(StretchAlgorithm::Log).byte(10.0) > mapper(StretchAlgorithm::Linear).byte(10.0));
        assert!(mapper(StretchAlgorithm::Squared).byte(10.0) < mapper(StretchAlgorithm::Linear).byte(10.0));
    }

    #[test]
    fn blank_pixels_use_the_blank_byte() {
        let spec = RangeSpec::default();
        let m = PixelMapper::with_range(&spec, ResolvedRange { lo: 0.0, hi: 1.0 }, None, 7);
        assert_eq!(m.byte(f32::NAN), 7);
    }

    #[test]
    fn collapsed_range_maps_to_zero() {
        let spec = RangeSpec::default();
        let m = PixelMapper::with_range(&spec, ResolvedRange { lo: 5.0, hi: 5.0 }, None, 0);
        assert_eq!(m.byte(5.0), 0);
        assert_eq!(m.byte(50.0), 0);
    }
}
