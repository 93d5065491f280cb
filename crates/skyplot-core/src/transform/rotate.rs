use ndarray::{Array2, Zip};

use crate::consts::DEG_PER_RAD;
use crate::error::{PlotError, Result};
use crate::plane::ImagePlane;
use crate::wcs::{CoordSystem, ImagePt, Wcs};

/// Rotate the image content `angle` degrees counter-clockwise about its
/// centre. The output canvas is large enough to hold every input pixel;
/// uncovered output pixels are NaN.
pub fn rotate(plane: &ImagePlane, angle: f64) -> Result<ImagePlane> {
    let wcs = rotatable_wcs(plane)?;
    let (w, h) = (plane.width() as f64, plane.height() as f64);
    let theta = angle / DEG_PER_RAD;
    let (sin, cos) = theta.sin_cos();

    let out_w = canvas_edge(w * cos.abs() + h * sin.abs());
    let out_h = canvas_edge(w * sin.abs() + h * cos.abs());
    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ox, oy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    let src = plane.data();
    let mut data = Array2::<f32>::from_elem((out_h, out_w), f32::NAN);
    Zip::indexed(&mut data).par_for_each(|(row, col), v| {
        let dx = col as f64 + 0.5 - ox;
        let dy = row as f64 + 0.5 - oy;
        // Inverse rotation back into the source frame.
        let sx = cos * dx + sin * dy + cx;
        let sy = -sin * dx + cos * dy + cy;
        *v = bilinear_sample(src, sy - 0.5, sx - 0.5);
    });

    let mut header = plane.header().clone();
    rotated_wcs(&wcs, theta, [cx + 0.5, cy + 0.5], [ox + 0.5, oy + 0.5]).write_to(&mut header);
    plane.derive(data, header)
}

/// Angle, in degrees, that brings `system` north to the top of the image.
pub fn north_up_angle(plane: &ImagePlane, system: CoordSystem) -> Result<f64> {
    let wcs = rotatable_wcs(plane)?;
    let center = ImagePt::new(plane.width() as f64 / 2.0, plane.height() as f64 / 2.0);
    let north = wcs
        .north_angle(center, system)
        .ok_or_else(|| PlotError::geometry("image centre does not map onto the sky"))?;
    Ok(-north)
}

fn rotatable_wcs(plane: &ImagePlane) -> Result<Wcs> {
    let projection = plane.projection();
    if !projection.can_rotate() {
        return Err(PlotError::geometry(format!(
            "cannot rotate an image with projection {projection}"
        )));
    }
    plane
        .wcs()
        .ok_or_else(|| PlotError::geometry("image projection keywords are incomplete"))
}

fn canvas_edge(extent: f64) -> usize {
    ((extent - 1e-6).ceil() as usize).max(1)
}

/// Input pixel `p` lands on `R(theta) (p - c_in) + c_out`, so the new
/// solution is `CD R(-theta)` about the moved reference pixel.
fn rotated_wcs(wcs: &Wcs, theta: f64, c_in: [f64; 2], c_out: [f64; 2]) -> Wcs {
    let (sin, cos) = theta.sin_cos();
    let [[a, b], [c, d]] = wcs.cd;
    let cd = [
        [a * cos - b * sin, a * sin + b * cos],
        [c * cos - d * sin, c * sin + d * cos],
    ];
    let rx = wcs.crpix[0] - c_in[0];
    let ry = wcs.crpix[1] - c_in[1];
    let crpix = [
        cos * rx - sin * ry + c_out[0],
        sin * rx + cos * ry + c_out[1],
    ];
    Wcs {
        cd,
        crpix,
        ..wcs.clone()
    }
}

/// Bilinear sample at fractional (row, col). Pixels off the image or
/// blank contribute nothing; a sample with no contributors is NaN.
fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();
    if y < -0.5 || x < -0.5 || y > h as f64 - 0.5 || x > w as f64 - 0.5 {
        return f32::NAN;
    }

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (r, c, wgt) in [
        (y0, x0, (1.0 - fx) * (1.0 - fy)),
        (y0, x0 + 1, fx * (1.0 - fy)),
        (y0 + 1, x0, (1.0 - fx) * fy),
        (y0 + 1, x0 + 1, fx * fy),
    ] {
        if wgt <= 0.0 || r < 0 || c < 0 || r >= h as i64 || c >= w as i64 {
            continue;
        }
        let v = data[[r as usize, c as usize]];
        if v.is_finite() {
            sum += v as f64 * wgt;
            weight += wgt;
        }
    }
    if weight > 0.0 {
        (sum / weight) as f32
    } else {
        f32::NAN
    }
}
