//! Tiled, parallel conversion of float planes into display bytes.
//!
//! The display-oriented image (rows flipped so the last FITS row is on
//! top) is cut into square tiles. Each tile is stretched as its own task on
//! a fixed-size pool and sent back tagged with its index. The caller waits
//! for every tile or until the timeout, then copies each tile to its own
//! offset, so the result does not depend on the order tasks finish in.

mod color;
mod mask;
mod pixels;
mod range;
mod tiles;

pub use color::ColorMapper;
pub use mask::MaskMapper;
pub use pixels::PixelMapper;
pub use range::{Bound, BoundKind, RangeSpec, ResolvedRange, StretchAlgorithm};
pub use tiles::{decimate, tile_grid, TileDef};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::{BLANK_PIXEL_BYTE, DEFAULT_TILE_SIZE};
use crate::error::{PlotError, Result};
use crate::group::ActiveImageGroup;
use crate::state::Band;

/// Range spec per band.
pub type BandRanges = BTreeMap<Band, RangeSpec>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StretchMode {
    /// One color-table index per pixel.
    #[default]
    Standard,
    /// Interleaved R, G, B bytes per pixel.
    ThreeColor,
    /// Overlay index per pixel from the selected mask bits.
    Mask { bits: u64 },
}

/// Extra reduced-size copies of the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressType {
    #[default]
    Full,
    Half,
    Quarter,
    HalfAndQuarter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StretchParams {
    pub tile_size: usize,
    pub mode: StretchMode,
    pub compress: CompressType,
}

impl Default for StretchParams {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            mode: StretchMode::Standard,
            compress: CompressType::Full,
        }
    }
}

/// Reduced copy of a stretch output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decimated {
    pub width: usize,
    pub height: usize,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct StretchOutput {
    pub width: usize,
    pub height: usize,
    /// Bytes per pixel: 3 for three-color, 1 otherwise.
    pub channels: usize,
    pub bytes: Vec<u8>,
    pub half: Option<Decimated>,
    pub quarter: Option<Decimated>,
    /// Range specs the bytes were produced with.
    pub ranges: BandRanges,
    pub tile_count: usize,
}

enum Kernel {
    Single(PixelMapper),
    Color(ColorMapper),
    Mask(MaskMapper),
}

impl Kernel {
    fn channels(&self) -> usize {
        match self {
            Self::Color(_) => 3,
            _ => 1,
        }
    }
}

/// Planes feeding the kernel, in channel order.
type Sources = Vec<Option<Arc<Array2<f32>>>>;

pub struct StretchEngine {
    pool: rayon::ThreadPool,
    timeout: Duration,
    blank: u8,
}

impl StretchEngine {
    pub fn new(parallel_cores: usize, timeout: Duration) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallel_cores.max(1))
            .thread_name(|i| format!("skyplot-stretch-{i}"))
            .build()
            .map_err(|e| PlotError::Resource(format!("failed to start stretch pool: {e}")))?;
        Ok(Self {
            pool,
            timeout,
            blank: BLANK_PIXEL_BYTE,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Stretch `group` into display bytes. Either every tile completes
    /// within the timeout or the call fails and no bytes are returned.
    pub fn stretch(
        &self,
        group: &ActiveImageGroup,
        ranges: &BandRanges,
        params: &StretchParams,
    ) -> Result<StretchOutput> {
        let (width, height) = group.dimensions()?;
        let (kernel, sources) = self.build_kernel(group, ranges, params.mode)?;
        let channels = kernel.channels();
        let tiles = tile_grid(width, height, params.tile_size);
        debug!(width, height, tiles = tiles.len(), mode = ?params.mode, "stretching");

        let kernel = Arc::new(kernel);
        let sources = Arc::new(sources);
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<(usize, Vec<u8>)>();

        for tile in &tiles {
            let tile = *tile;
            let tx = tx.clone();
            let kernel = Arc::clone(&kernel);
            let sources = Arc::clone(&sources);
            let cancel = Arc::clone(&cancel);
            self.pool.spawn(move || {
                if let Some(bytes) = render_tile(&tile, &kernel, &sources, height, &cancel) {
                    // The receiver is gone once the caller timed out.
                    let _ = tx.send((tile.index, bytes));
                }
            });
        }
        drop(tx);

        let deadline = Instant::now() + self.timeout;
        let mut done: Vec<Option<Vec<u8>>> = vec![None; tiles.len()];
        let mut received = 0;
        while received < tiles.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.abort(&cancel, received, tiles.len()));
            }
            match rx.recv_timeout(remaining) {
                Ok((index, bytes)) => {
                    if done[index].replace(bytes).is_none() {
                        received += 1;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(self.abort(&cancel, received, tiles.len()));
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(PlotError::Resource(format!(
                        "stretch workers stopped after {received} of {} tiles",
                        tiles.len()
                    )));
                }
            }
        }

        let mut bytes = vec![0u8; width * height * channels];
        for (tile, tile_bytes) in tiles.iter().zip(done.into_iter().flatten()) {
            tiles::place_tile(&mut bytes, width, channels, tile, &tile_bytes);
        }

        let reduce = |factor: usize| {
            let (bytes, width, height) = decimate(&bytes, width, height, channels, factor);
            Decimated { width, height, bytes }
        };
        let half = matches!(params.compress, CompressType::Half | CompressType::HalfAndQuarter)
            .then(|| reduce(2));
        let quarter = matches!(params.compress, CompressType::Quarter | CompressType::HalfAndQuarter)
            .then(|| reduce(4));

        Ok(StretchOutput {
            width,
            height,
            channels,
            bytes,
            half,
            quarter,
            ranges: ranges.clone(),
            tile_count: tiles.len(),
        })
    }

    fn abort(&self, cancel: &AtomicBool, received: usize, total: usize) -> PlotError {
        cancel.store(true, Ordering::SeqCst);
        warn!(received, total, timeout = ?self.timeout, "stretch timed out, cancelling tiles");
        PlotError::Timeout(self.timeout)
    }

    fn build_kernel(
        &self,
        group: &ActiveImageGroup,
        ranges: &BandRanges,
        mode: StretchMode,
    ) -> Result<(Kernel, Sources)> {
        let range_for = |band: Band| ranges.get(&band).cloned().unwrap_or_default();
        match mode {
            StretchMode::Standard => {
                let (band, plane) = group
                    .primary()
                    .ok_or_else(|| PlotError::MissingBand(Band::NoBand.to_string()))?;
                let mapper = PixelMapper::new(&range_for(band), plane, self.blank);
                Ok((Kernel::Single(mapper), vec![Some(plane.shared_data())]))
            }
            StretchMode::Mask { bits } => {
                let (_, plane) = group
                    .primary()
                    .ok_or_else(|| PlotError::MissingBand(Band::NoBand.to_string()))?;
                Ok((Kernel::Mask(MaskMapper::new(bits)), vec![Some(plane.shared_data())]))
            }
            StretchMode::ThreeColor => {
                let mut mappers: [Option<PixelMapper>; 3] = [None, None, None];
                let mut sources: Sources = vec![None, None, None];
                let mut preserve_hue = false;
                let mut q = None;
                for band in Band::COLORS {
                    let Some(plane) = group.get(band) else { continue };
                    let Some(ch) = band.channel() else { continue };
                    let spec = range_for(band);
                    preserve_hue |= spec.preserve_hue;
                    q.get_or_insert(spec.asinh_q);
                    mappers[ch] = Some(PixelMapper::new(&spec, plane, self.blank));
                    sources[ch] = Some(plane.shared_data());
                }
                if sources.iter().all(Option::is_none) {
                    return Err(PlotError::MissingBand("Red, Green or Blue".into()));
                }
                // Hue preservation needs all three bands.
                let mapper = if preserve_hue && sources.iter().all(Option::is_some) {
                    ColorMapper::HuePreserving {
                        bands: mappers,
                        q: q.unwrap_or(crate::consts::DEFAULT_ASINH_Q),
                    }
                } else {
                    ColorMapper::Independent(mappers)
                };
                Ok((Kernel::Color(mapper), sources))
            }
        }
    }
}

/// Stretch one tile. Display row `r` is data row `height - 1 - r`.
/// Returns `None` if the stretch was cancelled.
fn render_tile(
    tile: &TileDef,
    kernel: &Kernel,
    sources: &Sources,
    height: usize,
    cancel: &AtomicBool,
) -> Option<Vec<u8>> {
    let channels = kernel.channels();
    let mut out = Vec::with_capacity(tile.width * tile.height * channels);
    for r in tile.y..tile.y + tile.height {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        let data_row = height - 1 - r;
        for c in tile.x..tile.x + tile.width {
            let value = |ch: usize| {
                sources
                    .get(ch)
                    .and_then(Option::as_ref)
                    .map_or(f32::NAN, |d| d[[data_row, c]])
            };
            match kernel {
                Kernel::Single(m) => out.push(m.byte(value(0))),
                Kernel::Mask(m) => out.push(m.byte(value(0))),
                Kernel::Color(m) => out.extend_from_slice(&m.rgb([value(0), value(1), value(2)])),
            }
        }
    }
    Some(out)
}
