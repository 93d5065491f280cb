use rayon::prelude::*;
use tracing::debug;

use crate::consts::{
    EQUALIZATION_TABLE_SIZE, HISTOGRAM_BINS, HISTOGRAM_REDO_FRACTION, HISTOGRAM_SPREAD_TRIM,
    PARALLEL_PIXEL_THRESHOLD,
};

/// Fixed-bin histogram of a plane's finite pixel values, used to turn
/// percentage and sigma bounds into data values.
///
/// Built over the full data range first; if the populated part of that range
/// is narrow, the histogram is rebuilt once over the central 99.9% so the
/// bins resolve the bulk of the data.
#[derive(Clone, Debug)]
pub struct Histogram {
    counts: Vec<u64>,
    hist_min: f64,
    bin_size: f64,
    data_min: f64,
    data_max: f64,
}

#[derive(Clone, Debug)]
struct Pass {
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
    min: f64,
    max: f64,
}

impl Pass {
    fn empty() -> Self {
        Self {
            counts: vec![0; HISTOGRAM_BINS + 1],
            underflow: 0,
            overflow: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn merge(mut self, other: Pass) -> Pass {
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self
    }
}

impl Histogram {
    pub fn from_data(data: &[f32]) -> Self {
        let (mut lo, mut hi) = min_max(data);
        if !lo.is_finite() {
            // No finite pixels at all.
            return Self {
                counts: vec![0; HISTOGRAM_BINS + 1],
                hist_min: 0.0,
                bin_size: 1.0,
                data_min: 0.0,
                data_max: 0.0,
            };
        }

        let total = data.len() as f64;
        let mut redoing = false;
        loop {
            let bin_size = bin_size(lo, hi);
            let pass = accumulate(data, lo, bin_size);
            let hist = Self {
                counts: pass.counts,
                hist_min: lo,
                bin_size,
                data_min: pass.min,
                data_max: pass.max,
            };

            let mut redo = pass.underflow as f64 > total * HISTOGRAM_REDO_FRACTION
                || pass.overflow as f64 > total * HISTOGRAM_REDO_FRACTION;

            if !redo && !redoing {
                let trim = (hist.good_pixels() as f64 * HISTOGRAM_SPREAD_TRIM) as u64;
                match (hist.low_sum_index(trim), hist.high_sum_index(trim)) {
                    (Some(low), Some(high)) => {
                        let high = high + 1;
                        if high.saturating_sub(low) < HISTOGRAM_BINS / 2 {
                            hi = high as f64 * bin_size + hist.hist_min;
                            lo = low as f64 * bin_size + hist.hist_min;
                            redo = true;
                        }
                    }
                    _ => return hist,
                }
            } else if !redoing {
                lo = hist.data_min;
                hi = hist.data_max;
            }

            if redo && !redoing {
                debug!(lo, hi, "rebuilding histogram over narrower range");
                redoing = true;
                continue;
            }
            return hist;
        }
    }

    pub fn from_array(data: &ndarray::Array2<f32>) -> Self {
        match data.as_slice() {
            Some(slice) => Self::from_data(slice),
            None => Self::from_data(&data.iter().copied().collect::<Vec<_>>()),
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn data_min(&self) -> f64 {
        self.data_min
    }

    pub fn data_max(&self) -> f64 {
        self.data_max
    }

    pub fn bin_size(&self) -> f64 {
        self.bin_size
    }

    pub fn good_pixels(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Data value at the given percentile. 0 and 100 return the exact data
    /// minimum and maximum.
    pub fn percentile(&self, pct: f64, round_up: bool) -> f64 {
        if pct <= 0.0 {
            return self.data_min;
        }
        if pct >= 100.0 {
            return self.data_max;
        }
        let goal = (self.good_pixels() as f64 * pct / 100.0) as u64;
        let mut sum = 0u64;
        let mut i = 0usize;
        loop {
            sum += self.counts[i];
            if sum >= goal || i + 1 >= self.counts.len() {
                break;
            }
            i += 1;
        }
        let bin = if round_up { i as f64 + 1.0 } else { i as f64 };
        bin * self.bin_size + self.hist_min
    }

    /// Median plus `sigma` times the half width of the 16th to 84th
    /// percentile range.
    pub fn sigma(&self, sigma: f64, round_up: bool) -> f64 {
        let lev16 = self.percentile(16.0, round_up);
        let lev50 = self.percentile(50.0, round_up);
        let lev84 = self.percentile(84.0, round_up);
        lev50 + sigma * (lev84 - lev16) / 2.0
    }

    pub fn bin_of(&self, value: f64) -> usize {
        let bin = ((value - self.hist_min) / self.bin_size).floor();
        bin.clamp(0.0, (HISTOGRAM_BINS - 1) as f64) as usize
    }

    pub fn value_of_bin(&self, bin: usize) -> f64 {
        bin as f64 * self.bin_size + self.hist_min
    }

    /// Thresholds splitting the pixels into equally populated output levels.
    /// Entry `i` is the lowest value that maps to byte `i`.
    pub fn equalization_table(&self) -> Vec<f64> {
        let mut tbl = vec![0.0; EQUALIZATION_TABLE_SIZE];
        let per_level = self.good_pixels() as f64 / 255.0;

        let mut idx = 0;
        tbl[idx] = self.hist_min;
        idx += 1;
        let mut next_goal = per_level;
        let mut bin = 0;
        let mut accum = 0u64;
        while bin < HISTOGRAM_BINS && idx < 255 {
            if accum as f64 >= next_goal {
                tbl[idx] = self.value_of_bin(bin);
                idx += 1;
                next_goal += per_level;
            } else {
                accum += self.counts[bin];
                bin += 1;
            }
        }
        while idx < 255 {
            tbl[idx] = self.value_of_bin(bin);
            idx += 1;
        }
        tbl[255] = f64::MAX;
        tbl
    }

    fn low_sum_index(&self, limit: u64) -> Option<usize> {
        let mut sum = 0;
        for (i, c) in self.counts.iter().take(HISTOGRAM_BINS).enumerate() {
            sum += c;
            if sum > limit {
                return Some(i);
            }
        }
        None
    }

    fn high_sum_index(&self, limit: u64) -> Option<usize> {
        let mut sum = 0;
        for (i, c) in self.counts.iter().enumerate().rev() {
            sum += c;
            if sum > limit {
                return Some(i);
            }
        }
        None
    }
}

fn bin_size(lo: f64, hi: f64) -> f64 {
    let size = (hi - lo) / HISTOGRAM_BINS as f64;
    if size == 0.0 {
        1.0
    } else {
        size
    }
}

fn min_max(data: &[f32]) -> (f64, f64) {
    let fold = |(lo, hi): (f64, f64), &v: &f32| {
        if v.is_finite() {
            (lo.min(v as f64), hi.max(v as f64))
        } else {
            (lo, hi)
        }
    };
    let init = (f64::INFINITY, f64::NEG_INFINITY);
    if data.len() < PARALLEL_PIXEL_THRESHOLD {
        data.iter().fold(init, fold)
    } else {
        data.par_iter()
            .fold(|| init, fold)
            .reduce(|| init, |a, b| (a.0.min(b.0), a.1.max(b.1)))
    }
}

fn accumulate(data: &[f32], hist_min: f64, bin_size: f64) -> Pass {
    let add = |mut pass: Pass, &v: &f32| {
        if v.is_finite() {
            let v = v as f64;
            let bin = ((v - hist_min) / bin_size).floor();
            if bin < 0.0 {
                pass.underflow += 1;
            } else if bin > HISTOGRAM_BINS as f64 {
                pass.overflow += 1;
            } else {
                pass.counts[bin as usize] += 1;
            }
            pass.min = pass.min.min(v);
            pass.max = pass.max.max(v);
        }
        pass
    };
    if data.len() < PARALLEL_PIXEL_THRESHOLD {
        data.iter().fold(Pass::empty(), add)
    } else {
        data.par_iter()
            .fold(Pass::empty, add)
            .reduce(Pass::empty, Pass::merge)
    }
}
