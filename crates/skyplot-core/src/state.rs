//! Serializable per-session plot state. Callers receive a copy after every
//! operation and hand it back with the next one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::request::PlotRequest;
use crate::stretch::RangeSpec;
use crate::wcs::CoordSystem;

/// One channel of a plot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Band {
    #[default]
    NoBand,
    Red,
    Green,
    Blue,
}

impl Band {
    pub const COLORS: [Band; 3] = [Band::Red, Band::Green, Band::Blue];

    /// Channel offset in interleaved RGB output.
    pub fn channel(&self) -> Option<usize> {
        match self {
            Self::NoBand => None,
            Self::Red => Some(0),
            Self::Green => Some(1),
            Self::Blue => Some(2),
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoBand => write!(f, "No Band"),
            Self::Red => write!(f, "Red"),
            Self::Green => write!(f, "Green"),
            Self::Blue => write!(f, "Blue"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandState {
    /// File the band currently displays. May be a derived file that is
    /// still being written.
    pub working_file: PathBuf,
    pub original_file: PathBuf,
    /// Plane index within `working_file`.
    pub image_index: usize,
    /// Plane index within `original_file`.
    pub original_image_index: usize,
    pub range: RangeSpec,
    pub visible: bool,
    pub cube_plane: Option<usize>,
    /// Request the band was built from; replayed to recreate it.
    pub request: PlotRequest,
    /// The original file holds more than one plane.
    pub multi_image: bool,
}

/// Operations applied since the plot was created, oldest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Crop,
    Rotate,
    FlipX,
    FlipY,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crop => write!(f, "Crop"),
            Self::Rotate => write!(f, "Rotate"),
            Self::FlipX => write!(f, "Flip X"),
            Self::FlipY => write!(f, "Flip Y"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationKind {
    #[default]
    None,
    Angle,
    North,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RotationInfo {
    pub kind: RotationKind,
    /// Total counter-clockwise rotation in degrees, when `kind` is `Angle`.
    pub angle: f64,
    pub north_system: Option<CoordSystem>,
}

/// Opaque session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(String);

impl ContextKey {
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self(format!("ctx-{t:x}-{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContextKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotState {
    pub context_key: ContextKey,
    pub bands: BTreeMap<Band, BandState>,
    pub three_color: bool,
    pub zoom_level: f32,
    pub color_table: u32,
    pub rotation: RotationInfo,
    pub flipped_y: bool,
    pub operations: Vec<Operation>,
}

impl PlotState {
    pub fn new(context_key: ContextKey) -> Self {
        Self {
            context_key,
            bands: BTreeMap::new(),
            three_color: false,
            zoom_level: 1.0,
            color_table: 0,
            rotation: RotationInfo::default(),
            flipped_y: false,
            operations: Vec::new(),
        }
    }

    pub fn band(&self, band: Band) -> Option<&BandState> {
        self.bands.get(&band)
    }

    /// The band single-band operations act on: `NoBand` if present,
    /// otherwise the first colour band.
    pub fn primary_band(&self) -> Option<Band> {
        self.bands.keys().next().copied()
    }

    pub fn ranges(&self) -> BTreeMap<Band, RangeSpec> {
        self.bands
            .iter()
            .map(|(band, bs)| (*band, bs.range.clone()))
            .collect()
    }
}
