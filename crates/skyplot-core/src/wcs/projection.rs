//! Spherical projection formulas. Angles in degrees throughout.

use crate::consts::DEG_PER_RAD;

use super::ProjectionKind;

/// Intermediate world coordinates to native spherical `(phi, theta)`.
pub(super) fn deproject(kind: ProjectionKind, x: f64, y: f64) -> Option<(f64, f64)> {
    match kind {
        ProjectionKind::Tan
        | ProjectionKind::Sin
        | ProjectionKind::Arc
        | ProjectionKind::Zea => {
            let r = x.hypot(y);
            let phi = if r == 0.0 {
                0.0
            } else {
                x.atan2(-y) * DEG_PER_RAD
            };
            let theta = match kind {
                ProjectionKind::Tan => DEG_PER_RAD.atan2(r) * DEG_PER_RAD,
                ProjectionKind::Sin => {
                    let s = r / DEG_PER_RAD;
                    if s > 1.0 {
                        return None;
                    }
                    s.acos() * DEG_PER_RAD
                }
                ProjectionKind::Arc => {
                    if r > 180.0 {
                        return None;
                    }
                    90.0 - r
                }
                _ => {
                    let s = r / (2.0 * DEG_PER_RAD);
                    if s > 1.0 {
                        return None;
                    }
                    90.0 - 2.0 * s.asin() * DEG_PER_RAD
                }
            };
            Some((phi, theta))
        }
        ProjectionKind::Car => (y.abs() <= 90.0).then_some((x, y)),
        ProjectionKind::Aitoff => {
            let u = x / (4.0 * DEG_PER_RAD);
            let v = y / (2.0 * DEG_PER_RAD);
            let z2 = 1.0 - u * u - v * v;
            if z2 < 0.5 {
                return None;
            }
            let z = z2.sqrt();
            let phi = 2.0 * (z * x / (2.0 * DEG_PER_RAD)).atan2(2.0 * z2 - 1.0) * DEG_PER_RAD;
            let theta = (y * z / DEG_PER_RAD).clamp(-1.0, 1.0).asin() * DEG_PER_RAD;
            Some((phi, theta))
        }
        ProjectionKind::Unrecognized | ProjectionKind::Unspecified => None,
    }
}

/// Native spherical `(phi, theta)` to intermediate world coordinates.
pub(super) fn project(kind: ProjectionKind, phi: f64, theta: f64) -> Option<(f64, f64)> {
    let zenithal_r = match kind {
        ProjectionKind::Tan => {
            if theta <= 0.0 {
                return None;
            }
            let t = theta / DEG_PER_RAD;
            Some(DEG_PER_RAD * t.cos() / t.sin())
        }
        ProjectionKind::Sin => {
            if theta < 0.0 {
                return None;
            }
            Some(DEG_PER_RAD * (theta / DEG_PER_RAD).cos())
        }
        ProjectionKind::Arc => Some(90.0 - theta),
        ProjectionKind::Zea => Some(2.0 * DEG_PER_RAD * ((90.0 - theta) / (2.0 * DEG_PER_RAD)).sin()),
        _ => None,
    };
    if let Some(r) = zenithal_r {
        let p = phi / DEG_PER_RAD;
        return Some((r * p.sin(), -r * p.cos()));
    }

    match kind {
        ProjectionKind::Car => Some((wrap_180(phi), theta)),
        ProjectionKind::Aitoff => {
            let half_phi = wrap_180(phi) / (2.0 * DEG_PER_RAD);
            let t = theta / DEG_PER_RAD;
            let gamma = DEG_PER_RAD * (2.0 / (1.0 + t.cos() * half_phi.cos())).sqrt();
            Some((2.0 * gamma * t.cos() * half_phi.sin(), gamma * t.sin()))
        }
        _ => None,
    }
}

pub(super) fn unit_vector(lon: f64, lat: f64) -> [f64; 3] {
    let (sl, cl) = (lon / DEG_PER_RAD).sin_cos();
    let (sb, cb) = (lat / DEG_PER_RAD).sin_cos();
    [cb * cl, cb * sl, sb]
}

pub(super) fn angles(v: [f64; 3]) -> (f64, f64) {
    let lon = v[1].atan2(v[0]) * DEG_PER_RAD;
    let lat = v[2].clamp(-1.0, 1.0).asin() * DEG_PER_RAD;
    (lon, lat)
}

fn wrap_180(a: f64) -> f64 {
    let w = (a + 180.0).rem_euclid(360.0) - 180.0;
    if w == -180.0 {
        180.0
    } else {
        w
    }
}
