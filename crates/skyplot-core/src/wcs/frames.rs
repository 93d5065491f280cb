use serde::{Deserialize, Serialize};

use super::projection::{angles, unit_vector};
use super::{mat_vec, transpose};

/// Celestial reference frames the engine can align and convert between.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordSystem {
    #[default]
    EquatorialJ2000,
    Galactic,
}

impl CoordSystem {
    /// Frame named by a longitude CTYPE such as `RA---TAN` or `GLON-CAR`.
    pub fn from_ctype(ctype: &str) -> Option<Self> {
        let prefix = ctype.get(..4)?;
        match prefix {
            "RA--" | "DEC-" => Some(Self::EquatorialJ2000),
            "GLON" | "GLAT" => Some(Self::Galactic),
            _ => None,
        }
    }

    pub(super) fn ctype_prefixes(&self) -> (&'static str, &'static str) {
        match self {
            Self::EquatorialJ2000 => ("RA---", "DEC--"),
            Self::Galactic => ("GLON-", "GLAT-"),
        }
    }
}

impl std::fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EquatorialJ2000 => write!(f, "Equatorial J2000"),
            Self::Galactic => write!(f, "Galactic"),
        }
    }
}

/// ICRS/J2000 equatorial to galactic rotation.
const EQ_TO_GAL: [[f64; 3]; 3] = [
    [-0.054_875_560_416_215_4, -0.873_437_090_234_885_0, -0.483_835_015_548_713_2],
    [0.494_109_427_875_583_7, -0.444_829_629_960_011_2, 0.746_982_244_497_218_9],
    [-0.867_666_149_019_004_7, -0.198_076_373_431_201_5, 0.455_983_776_175_066_9],
];

/// Convert `(lon, lat)` degrees between frames.
pub fn convert(from: CoordSystem, to: CoordSystem, lon: f64, lat: f64) -> (f64, f64) {
    if from == to {
        return (lon, lat);
    }
    let v = unit_vector(lon, lat);
    let out = match (from, to) {
        (CoordSystem::EquatorialJ2000, CoordSystem::Galactic) => mat_vec(&EQ_TO_GAL, v),
        _ => mat_vec(&transpose(&EQ_TO_GAL), v),
    };
    let (l, b) = angles(out);
    (l.rem_euclid(360.0), b)
}
