/// FITS logical record length in bytes.
pub const FITS_BLOCK_SIZE: usize = 2880;

/// FITS header card length in bytes.
pub const FITS_CARD_SIZE: usize = 80;

/// Number of bins in a plane histogram.
pub const HISTOGRAM_BINS: usize = 4096;

/// Histogram is rebuilt once if more than this fraction of pixels fell
/// outside its range.
pub const HISTOGRAM_REDO_FRACTION: f64 = 0.01;

/// Fraction trimmed from each end of the histogram when checking whether
/// the populated range can be spread out.
pub const HISTOGRAM_SPREAD_TRIM: f64 = 0.0005;

/// Number of entries in an equalization lookup table (one per output byte).
pub const EQUALIZATION_TABLE_SIZE: usize = 256;

/// Pixel count above which histogram accumulation is split across Rayon tasks.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 10_000;

/// Default square tile edge for the stretch engine.
pub const DEFAULT_TILE_SIZE: usize = 512;

/// Default wall-clock bound on a single stretch (ten minutes).
pub const DEFAULT_STRETCH_TIMEOUT_SECS: u64 = 600;

/// Default upper zoom level for fit-style zoom policies.
pub const DEFAULT_MAX_ZOOM: f32 = 32.0;

/// Default maximum accepted FITS file size: 2 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Delay before a derived file is written, so the request that scheduled it
/// can return first.
pub const DEFAULT_WRITE_DELAY_MS: u64 = 50;

/// Default byte budget of the in-process plane store: 1 GiB.
pub const DEFAULT_CACHE_CAPACITY_BYTES: usize = 1_073_741_824;

/// Default lifetime of a cached plane set.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Sessions idle longer than this are evicted.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

/// Byte written for NaN pixels in 8-bit output.
pub const BLANK_PIXEL_BYTE: u8 = 0;

/// Zscale: default contrast applied to the fitted slope.
pub const ZSCALE_DEFAULT_CONTRAST: f64 = 0.25;

/// Zscale: default number of sampled pixels.
pub const ZSCALE_DEFAULT_SAMPLES: usize = 600;

/// Zscale: default number of samples taken from one image line.
pub const ZSCALE_DEFAULT_SAMPLES_PER_LINE: usize = 120;

/// Zscale: k-sigma rejection factor for the line fit.
pub const ZSCALE_KREJ: f64 = 2.5;

/// Zscale: maximum line fit iterations.
pub const ZSCALE_MAX_ITERATIONS: usize = 5;

/// Zscale: smallest sample still considered a usable fit.
pub const ZSCALE_MIN_NPIXELS: usize = 5;

/// Zscale: maximum fraction of the sample that may be rejected.
pub const ZSCALE_MAX_REJECT: f64 = 0.5;

/// Default softening parameter for the asinh stretch.
pub const DEFAULT_ASINH_Q: f64 = 10.0;

/// Default gamma for the power-law stretch.
pub const DEFAULT_GAMMA: f64 = 2.0;

/// Scale of the logarithmic stretch curve.
pub const LOG_STRETCH_EXPONENT: f64 = 1000.0;

/// Degrees per radian.
pub const DEG_PER_RAD: f64 = 180.0 / std::f64::consts::PI;

/// Arcseconds per degree.
pub const ARCSEC_PER_DEG: f64 = 3600.0;
