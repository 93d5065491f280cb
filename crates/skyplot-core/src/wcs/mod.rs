//! World coordinate system support for the projections the engine can crop
//! and rotate with.

pub mod frames;
mod projection;

use serde::{Deserialize, Serialize};

use crate::consts::{ARCSEC_PER_DEG, DEG_PER_RAD};
use crate::error::{PlotError, Result};
use crate::io::header::FitsHeader;

pub use frames::CoordSystem;

/// Projection family named by the CTYPE keywords.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionKind {
    Tan,
    Sin,
    Arc,
    Zea,
    Car,
    Aitoff,
    Unrecognized,
    Unspecified,
}

impl ProjectionKind {
    pub fn from_header(header: &FitsHeader) -> Self {
        match header.get_str("CTYPE1") {
            None => Self::Unspecified,
            Some(ctype) => Self::from_ctype(ctype),
        }
    }

    pub fn from_ctype(ctype: &str) -> Self {
        let ctype = ctype.trim();
        if ctype.len() < 8 || ctype.as_bytes()[4] != b'-' {
            return Self::Unrecognized;
        }
        match ctype.get(5..8) {
            Some("TAN") => Self::Tan,
            Some("SIN") => Self::Sin,
            Some("ARC") => Self::Arc,
            Some("ZEA") => Self::Zea,
            Some("CAR") => Self::Car,
            Some("AIT") => Self::Aitoff,
            _ => Self::Unrecognized,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Tan => "TAN",
            Self::Sin => "SIN",
            Self::Arc => "ARC",
            Self::Zea => "ZEA",
            Self::Car => "CAR",
            Self::Aitoff => "AIT",
            Self::Unrecognized => "???",
            Self::Unspecified => "",
        }
    }

    /// All-sky and unknown projections cannot be rotated.
    pub fn can_rotate(&self) -> bool {
        matches!(self, Self::Tan | Self::Sin | Self::Arc | Self::Zea | Self::Car)
    }

    fn is_zenithal(&self) -> bool {
        matches!(self, Self::Tan | Self::Sin | Self::Arc | Self::Zea)
    }
}

impl std::fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tan => write!(f, "Gnomonic (TAN)"),
            Self::Sin => write!(f, "Orthographic (SIN)"),
            Self::Arc => write!(f, "Zenithal Equidistant (ARC)"),
            Self::Zea => write!(f, "Zenithal Equal Area (ZEA)"),
            Self::Car => write!(f, "Plate Carree (CAR)"),
            Self::Aitoff => write!(f, "Aitoff (AIT)"),
            Self::Unrecognized => write!(f, "Unrecognized"),
            Self::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// Continuous image coordinate. Pixel `i` spans `[i, i + 1)`, so its centre
/// is at `i + 0.5`; row 0 is the first row stored in the file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagePt {
    pub x: f64,
    pub y: f64,
}

impl ImagePt {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Sky position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkyPoint {
    pub lon: f64,
    pub lat: f64,
    pub system: CoordSystem,
}

impl SkyPoint {
    pub fn new(lon: f64, lat: f64, system: CoordSystem) -> Self {
        Self { lon, lat, system }
    }

    pub fn to_system(&self, system: CoordSystem) -> SkyPoint {
        let (lon, lat) = frames::convert(self.system, system, self.lon, self.lat);
        SkyPoint { lon, lat, system }
    }
}

/// Linear pixel-to-intermediate mapping followed by a spherical projection.
#[derive(Clone, Debug, PartialEq)]
pub struct Wcs {
    pub projection: ProjectionKind,
    pub system: CoordSystem,
    /// Reference pixel, FITS 1-based convention.
    pub crpix: [f64; 2],
    /// Reference sky position in degrees.
    pub crval: [f64; 2],
    /// Degrees per pixel.
    pub cd: [[f64; 2]; 2],
    pub lonpole: Option<f64>,
}

impl Wcs {
    pub fn from_header(header: &FitsHeader) -> Result<Self> {
        let projection = ProjectionKind::from_header(header);
        if matches!(projection, ProjectionKind::Unrecognized | ProjectionKind::Unspecified) {
            return Err(PlotError::geometry(format!(
                "no usable projection ({projection})"
            )));
        }
        let system = header
            .get_str("CTYPE1")
            .and_then(CoordSystem::from_ctype)
            .ok_or_else(|| PlotError::geometry("unsupported celestial coordinate axes"))?;

        let crpix = [
            header.get_f64("CRPIX1").unwrap_or(0.0),
            header.get_f64("CRPIX2").unwrap_or(0.0),
        ];
        let crval = [
            header.get_f64("CRVAL1").unwrap_or(0.0),
            header.get_f64("CRVAL2").unwrap_or(0.0),
        ];
        let cd = read_linear_matrix(header)?;
        let det = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
        if det == 0.0 || !det.is_finite() {
            return Err(PlotError::geometry("singular pixel-to-sky matrix"));
        }

        Ok(Self {
            projection,
            system,
            crpix,
            crval,
            cd,
            lonpole: header.get_f64("LONPOLE"),
        })
    }

    /// Write this solution into `header` as CD-matrix keywords, dropping
    /// the alternative CDELT/CROTA/PC forms.
    pub fn write_to(&self, header: &mut FitsHeader) {
        for key in ["CDELT1", "CDELT2", "CROTA1", "CROTA2", "PC1_1", "PC1_2", "PC2_1", "PC2_2"] {
            header.remove(key);
        }
        let (lon_prefix, lat_prefix) = self.system.ctype_prefixes();
        header.set_str("CTYPE1", format!("{lon_prefix}{}", self.projection.code()));
        header.set_str("CTYPE2", format!("{lat_prefix}{}", self.projection.code()));
        header.set_f64("CRPIX1", self.crpix[0]);
        header.set_f64("CRPIX2", self.crpix[1]);
        header.set_f64("CRVAL1", self.crval[0]);
        header.set_f64("CRVAL2", self.crval[1]);
        header.set_f64("CD1_1", self.cd[0][0]);
        header.set_f64("CD1_2", self.cd[0][1]);
        header.set_f64("CD2_1", self.cd[1][0]);
        header.set_f64("CD2_2", self.cd[1][1]);
    }

    pub fn pixel_to_sky(&self, pt: ImagePt) -> Option<SkyPoint> {
        let dx = pt.x + 0.5 - self.crpix[0];
        let dy = pt.y + 0.5 - self.crpix[1];
        let x = self.cd[0][0] * dx + self.cd[0][1] * dy;
        let y = self.cd[1][0] * dx + self.cd[1][1] * dy;
        let (phi, theta) = projection::deproject(self.projection, x, y)?;
        let native = projection::unit_vector(phi, theta);
        let sky = mat_vec(&self.native_to_sky(), native);
        let (lon, lat) = projection::angles(sky);
        Some(SkyPoint::new(lon.rem_euclid(360.0), lat, self.system))
    }

    pub fn sky_to_pixel(&self, sky: &SkyPoint) -> Option<ImagePt> {
        let sky = sky.to_system(self.system);
        let celestial = projection::unit_vector(sky.lon, sky.lat);
        let native = mat_vec(&transpose(&self.native_to_sky()), celestial);
        let (phi, theta) = projection::angles(native);
        let (x, y) = projection::project(self.projection, phi, theta)?;
        let inv = self.inverse_cd();
        let dx = inv[0][0] * x + inv[0][1] * y;
        let dy = inv[1][0] * x + inv[1][1] * y;
        Some(ImagePt::new(dx + self.crpix[0] - 0.5, dy + self.crpix[1] - 0.5))
    }

    /// Mean pixel size in arcseconds.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        det.abs().sqrt() * ARCSEC_PER_DEG
    }

    /// Direction of `system` north at `pt`, in degrees counter-clockwise
    /// from the image +y axis.
    pub fn north_angle(&self, pt: ImagePt, system: CoordSystem) -> Option<f64> {
        let here = self.pixel_to_sky(pt)?.to_system(system);
        let step = (self.pixel_scale_arcsec() / ARCSEC_PER_DEG).max(1e-6);
        let lat = if here.lat + step > 90.0 {
            here.lat - step
        } else {
            here.lat + step
        };
        let north = SkyPoint::new(here.lon, lat, system);
        let p2 = self.sky_to_pixel(&north)?;
        let (mut vx, mut vy) = (p2.x - pt.x, p2.y - pt.y);
        if lat < here.lat {
            vx = -vx;
            vy = -vy;
        }
        Some((-vx).atan2(vy) * DEG_PER_RAD)
    }

    fn inverse_cd(&self) -> [[f64; 2]; 2] {
        let [[a, b], [c, d]] = self.cd;
        let det = a * d - b * c;
        [[d / det, -b / det], [-c / det, a / det]]
    }

    /// Rotation taking native spherical unit vectors to the celestial frame.
    fn native_to_sky(&self) -> [[f64; 3]; 3] {
        let alpha0 = self.crval[0] / DEG_PER_RAD;
        let delta0 = self.crval[1] / DEG_PER_RAD;
        if self.projection.is_zenithal() {
            let phi_p = self.lonpole.unwrap_or(180.0) / DEG_PER_RAD;
            mat_mul(
                &mat_mul(&rot_z(alpha0), &rot_y(std::f64::consts::FRAC_PI_2 - delta0)),
                &rot_z(std::f64::consts::PI - phi_p),
            )
        } else {
            mat_mul(&rot_z(alpha0), &rot_y(-delta0))
        }
    }
}

fn read_linear_matrix(header: &FitsHeader) -> Result<[[f64; 2]; 2]> {
    if header.contains("CD1_1") || header.contains("CD2_2") {
        return Ok([
            [
                header.get_f64("CD1_1").unwrap_or(0.0),
                header.get_f64("CD1_2").unwrap_or(0.0),
            ],
            [
                header.get_f64("CD2_1").unwrap_or(0.0),
                header.get_f64("CD2_2").unwrap_or(0.0),
            ],
        ]);
    }

    let cdelt1 = header
        .get_f64("CDELT1")
        .ok_or_else(|| PlotError::geometry("missing CDELT1 and CD matrix"))?;
    let cdelt2 = header
        .get_f64("CDELT2")
        .ok_or_else(|| PlotError::geometry("missing CDELT2 and CD matrix"))?;

    if header.contains("PC1_1") || header.contains("PC2_2") {
        let pc = [
            [
                header.get_f64("PC1_1").unwrap_or(1.0),
                header.get_f64("PC1_2").unwrap_or(0.0),
            ],
            [
                header.get_f64("PC2_1").unwrap_or(0.0),
                header.get_f64("PC2_2").unwrap_or(1.0),
            ],
        ];
        return Ok([
            [cdelt1 * pc[0][0], cdelt1 * pc[0][1]],
            [cdelt2 * pc[1][0], cdelt2 * pc[1][1]],
        ]);
    }

    let crota = header.get_f64("CROTA2").unwrap_or(0.0) / DEG_PER_RAD;
    let (s, c) = crota.sin_cos();
    Ok([[cdelt1 * c, -cdelt2 * s], [cdelt1 * s, cdelt2 * c]])
}

type Mat3 = [[f64; 3]; 3];

fn rot_z(a: f64) -> Mat3 {
    let (s, c) = a.sin_cos();
    [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]
}

fn rot_y(b: f64) -> Mat3 {
    let (s, c) = b.sin_cos();
    [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
}

pub(crate) fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

pub(crate) fn mat_vec(m: &Mat3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

pub(crate) fn transpose(m: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            out[j][i] = *v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tan_header(crota: f64) -> FitsHeader {
        let mut h = FitsHeader::new();
        h.set_str("CTYPE1", "RA---TAN");
        h.set_str("CTYPE2", "DEC--TAN");
        h.set_f64("CRPIX1", 50.5);
        h.set_f64("CRPIX2", 50.5);
        h.set_f64("CRVAL1", 150.0);
        h.set_f64("CRVAL2", 30.0);
        h.set_f64("CDELT1", -0.001);
        h.set_f64("CDELT2", 0.001);
        h.set_f64("CROTA2", crota);
        h
    }

    #[test]
    fn reference_pixel_maps_to_reference_value() {
        let wcs = Wcs::from_header(&tan_header(0.0)).unwrap();
        let sky = wcs.pixel_to_sky(ImagePt::new(50.0, 50.0)).unwrap();
        assert_abs_diff_eq!(sky.lon, 150.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sky.lat, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn pixel_sky_round_trip_for_each_projection() {
        for code in ["TAN", "SIN", "ARC", "ZEA", "CAR", "AIT"] {
            let mut h = tan_header(15.0);
            h.set_str("CTYPE1", format!("RA---{code}"));
            h.set_str("CTYPE2", format!("DEC--{code}"));
            let wcs = Wcs::from_header(&h).unwrap();
            let pt = ImagePt::new(12.25, 80.75);
            let sky = wcs.pixel_to_sky(pt).unwrap();
            let back = wcs.sky_to_pixel(&sky).unwrap();
            assert_abs_diff_eq!(back.x, pt.x, epsilon = 1e-6);
            assert_abs_diff_eq!(back.y, pt.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn north_angle_follows_crota() {
        let wcs = Wcs::from_header(&tan_header(0.0)).unwrap();
        let a = wcs
            .north_angle(ImagePt::new(50.0, 50.0), CoordSystem::EquatorialJ2000)
            .unwrap();
        assert_abs_diff_eq!(a, 0.0, epsilon = 1e-3);

        let rotated = Wcs::from_header(&tan_header(30.0)).unwrap();
        let a = rotated
            .north_angle(ImagePt::new(50.0, 50.0), CoordSystem::EquatorialJ2000)
            .unwrap();
        assert_abs_diff_eq!(a.abs(), 30.0, epsilon = 1e-2);
    }

    #[test]
    fn aitoff_is_not_rotatable() {
        assert!(!ProjectionKind::from_ctype("GLON-AIT").can_rotate());
        assert!(!ProjectionKind::from_ctype("LINEAR").can_rotate());
        assert!(ProjectionKind::from_ctype("RA---TAN").can_rotate());
    }
}
