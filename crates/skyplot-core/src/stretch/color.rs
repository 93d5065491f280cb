use super::pixels::PixelMapper;

/// Per-pixel mapping of up to three bands into interleaved RGB bytes.
#[derive(Clone, Debug)]
pub enum ColorMapper {
    /// Each channel stretched on its own.
    Independent([Option<PixelMapper>; 3]),
    /// Channels share one asinh-compressed intensity so their ratios, and
    /// therefore the hue, survive the stretch.
    HuePreserving {
        bands: [Option<PixelMapper>; 3],
        q: f64,
    },
}

impl ColorMapper {
    pub fn rgb(&self, values: [f32; 3]) -> [u8; 3] {
        match self {
            Self::Independent(mappers) => {
                let mut out = [0u8; 3];
                for ((o, m), v) in out.iter_mut().zip(mappers).zip(values) {
                    if let Some(m) = m {
                        *o = m.byte(v);
                    }
                }
                out
            }
            Self::HuePreserving { bands, q } => hue_preserving(bands, values, *q),
        }
    }
}

fn hue_preserving(bands: &[Option<PixelMapper>; 3], values: [f32; 3], q: f64) -> [u8; 3] {
    let mut x = [0.0f64; 3];
    let mut active = 0usize;
    for ((xi, m), v) in x.iter_mut().zip(bands).zip(values) {
        let Some(m) = m else { continue };
        active += 1;
        if v.is_finite() {
            let r = m.range();
            if r.hi > r.lo {
                *xi = ((v as f64 - r.lo) / (r.hi - r.lo)).max(0.0);
            }
        }
    }
    if active == 0 {
        return [0; 3];
    }
    let intensity = x.iter().sum::<f64>() / active as f64;
    if intensity <= 0.0 {
        return [0; 3];
    }
    let q = q.max(f64::EPSILON);
    let scale = (q * intensity).asinh() / (q.asinh() * intensity);
    let mut c = x.map(|v| v * scale);
    let peak = c.iter().copied().fold(0.0, f64::max);
    if peak > 1.0 {
        c = c.map(|v| v / peak);
    }
    c.map(|v| (v * 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stretch::range::{Bound, RangeSpec, ResolvedRange, StretchAlgorithm};

    fn linear() -> PixelMapper {
        let spec = RangeSpec::new(StretchAlgorithm::Linear, Bound::absolute(0.0), Bound::absolute(10.0));
        PixelMapper::with_range(&spec, ResolvedRange { lo: 0.0, hi: 10.0 }, None, 0)
    }

    #[test]
    fn hue_preserving_keeps_channel_ratios() {
        let mapper = ColorMapper::HuePreserving {
            bands: [Some(linear()), Some(linear()), Some(linear())],
            q: 8.0,
        };
        let [r, g, b] = mapper.rgb([4.0, 2.0, 1.0]);
        assert!(r > g && g > b);
        let ratio = r as f64 / g as f64;
        assert!((ratio - 2.0).abs() < 0.05, "ratio = {ratio}");
    }

    #[test]
    fn missing_band_leaves_channel_dark() {
        let mapper = ColorMapper::Independent([Some(linear()), None, Some(linear())]);
        assert_eq!(mapper.rgb([10.0, 10.0, 0.0]), [255, 0, 0]);
    }
}
