//! IRAF-style zscale: sample the image, fit a line to the sorted sample with
//! iterative k-sigma rejection, and derive display limits from its slope.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    ZSCALE_DEFAULT_CONTRAST, ZSCALE_DEFAULT_SAMPLES, ZSCALE_DEFAULT_SAMPLES_PER_LINE, ZSCALE_KREJ,
    ZSCALE_MAX_ITERATIONS, ZSCALE_MAX_REJECT, ZSCALE_MIN_NPIXELS,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZscaleParams {
    /// Divides the fitted slope; smaller values widen the range.
    pub contrast: f64,
    /// Desired number of pixels in the sample.
    pub samples: usize,
    /// Desired number of pixels taken from one sampled line.
    pub samples_per_line: usize,
}

impl Default for ZscaleParams {
    fn default() -> Self {
        Self {
            contrast: ZSCALE_DEFAULT_CONTRAST,
            samples: ZSCALE_DEFAULT_SAMPLES,
            samples_per_line: ZSCALE_DEFAULT_SAMPLES_PER_LINE,
        }
    }
}

/// Lower and upper display limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZscaleRange {
    pub z1: f64,
    pub z2: f64,
}

pub fn zscale(data: &Array2<f32>, params: &ZscaleParams) -> ZscaleRange {
    let mut sample = sample_image(data, params);
    sample.retain(|v| v.is_finite());
    if sample.is_empty() {
        return ZscaleRange { z1: 0.0, z2: 0.0 };
    }
    sample.sort_by(f32::total_cmp);

    let npix = sample.len();
    let zmin = sample[0] as f64;
    let zmax = sample[npix - 1] as f64;

    let center = ((npix + 1) / 2).max(1);
    let left = center - 1;
    let median = if npix % 2 == 1 || center >= npix {
        sample[left] as f64
    } else {
        (sample[left] as f64 + sample[left + 1] as f64) / 2.0
    };

    let minpix = ZSCALE_MIN_NPIXELS.max((npix as f64 * ZSCALE_MAX_REJECT) as usize);
    let ngrow = ((npix as f64 * 0.01).round() as usize).max(1);
    let fit = fit_line(&sample, ZSCALE_KREJ, ngrow, ZSCALE_MAX_ITERATIONS);

    let range = if fit.ngoodpix < minpix {
        ZscaleRange { z1: zmin, z2: zmax }
    } else {
        let slope = if params.contrast > 0.0 {
            fit.slope / params.contrast
        } else {
            fit.slope
        };
        ZscaleRange {
            z1: zmin.max(median - (center as f64 - 1.0) * slope),
            z2: zmax.min(median + (npix - center) as f64 * slope),
        }
    };
    debug!(npix, median, slope = fit.slope, z1 = range.z1, z2 = range.z2, "zscale");
    range
}

fn sample_image(data: &Array2<f32>, params: &ZscaleParams) -> Vec<f32> {
    let (ny, nx) = data.dim();
    if nx == 0 || ny == 0 {
        return Vec::new();
    }
    let per_line = params.samples_per_line.max(1);

    let opt_per_line = per_line.min(nx).max(1);
    let col_step = nx.div_ceil(opt_per_line).max(2);
    let npix_per_line = nx.div_ceil(col_step).max(1);

    let min_lines = (params.samples / per_line).max(1);
    let opt_lines = min_lines.max(ny.min(params.samples.div_ceil(npix_per_line)));
    let line_step = (ny / opt_lines.max(1)).max(2);

    let mut sample = Vec::with_capacity(npix_per_line * ny.div_ceil(line_step));
    let mut line = line_step.div_ceil(2).max(1);
    while line <= ny {
        let row = data.row(line - 1);
        sample.extend(row.iter().step_by(col_step).take(npix_per_line).copied());
        line += line_step;
    }
    sample
}

struct LineFit {
    ngoodpix: usize,
    slope: f64,
}

fn fit_line(data: &[f32], krej: f64, ngrow: usize, max_iter: usize) -> LineFit {
    let npix = data.len();
    if npix < 2 {
        return LineFit {
            ngoodpix: npix,
            slope: 0.0,
        };
    }
    let xscale = 2.0 / (npix - 1) as f64;
    let normx: Vec<f64> = (0..npix).map(|i| i as f64 * xscale - 1.0).collect();
    let mut bad = vec![false; npix];

    let mut sumxx = 0.0;
    let mut sumxz = 0.0;
    let mut sumx = 0.0;
    let mut sumz = 0.0;
    for (&x, &z) in normx.iter().zip(data) {
        let z = z as f64;
        sumxx += x * x;
        sumxz += x * z;
        sumx += x;
        sumz += z;
    }
    let mut z0 = sumz / npix as f64;
    let mut dz = sumxz / sumxx;
    let first_dz = dz;

    let mut ngoodpix = npix;
    let minpix = ZSCALE_MIN_NPIXELS.max((npix as f64 * ZSCALE_MAX_REJECT) as usize);

    for _ in 0..max_iter {
        let last_good = ngoodpix;
        let flat: Vec<f64> = normx
            .iter()
            .zip(data)
            .map(|(&x, &z)| z as f64 - (x * dz + z0))
            .collect();

        let threshold = match sigma_of(&flat, &bad) {
            Some(sigma) => sigma * krej,
            None => break,
        };

        // Reject pixels and their neighbours, taking them out of the sums.
        for i in 0..npix {
            if bad[i] || flat[i].abs() <= threshold {
                continue;
            }
            let lo = i.saturating_sub(ngrow);
            let hi = (i + ngrow).min(npix - 1);
            for j in lo..=hi {
                if !bad[j] {
                    let x = normx[j];
                    let z = data[j] as f64;
                    sumxx -= x * x;
                    sumxz -= z * x;
                    sumx -= x;
                    sumz -= z;
                    bad[j] = true;
                }
            }
        }
        ngoodpix = bad.iter().filter(|b| !**b).count();

        if ngoodpix > 0 {
            let rowrat = sumx / sumxx;
            z0 = (sumz - rowrat * sumxz) / (ngoodpix as f64 - rowrat * sumx);
            dz = (sumxz - z0 * sumx) / sumxx;
        }
        if ngoodpix >= last_good || ngoodpix < minpix {
            break;
        }
    }

    let mut slope = dz * xscale;
    if slope.abs() < 0.001 {
        slope = first_dz * xscale;
    }
    LineFit { ngoodpix, slope }
}

fn sigma_of(flat: &[f64], bad: &[bool]) -> Option<f64> {
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sumsq = 0.0;
    for (&v, &b) in flat.iter().zip(bad) {
        if !b {
            n += 1;
            sum += v;
            sumsq += v * v;
        }
    }
    if n < 2 {
        return None;
    }
    let n = n as f64;
    let var = sumsq / (n - 1.0) - sum * sum / (n * (n - 1.0));
    Some(if var < 0.0 { 0.0 } else { var.sqrt() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_ramp_spans_most_of_the_data() {
        let data = Array2::from_shape_fn((200, 200), |(r, c)| (r * 200 + c) as f32);
        let range = zscale(&data, &ZscaleParams::default());
        assert!(range.z1 >= 0.0);
        assert!(range.z2 <= 39_999.0);
        assert!(range.z1 < range.z2);
    }

    #[test]
    fn outliers_do_not_stretch_the_limits() {
        let mut data = Array2::from_shape_fn((100, 100), |(r, c)| ((r + c) % 7) as f32 + 100.0);
        data[[50, 50]] = 1.0e6;
        data[[10, 10]] = -1.0e6;
        let range = zscale(&data, &ZscaleParams::default());
        assert!(range.z1 > -1000.0, "z1 = {}", range.z1);
        assert!(range.z2 < 1000.0, "z2 = {}", range.z2);
    }
}
