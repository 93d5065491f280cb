use ndarray::s;

use crate::error::Result;
use crate::plane::ImagePlane;
use crate::wcs::Wcs;

/// Mirror the row order.
pub fn flip_y(plane: &ImagePlane) -> Result<ImagePlane> {
    let data = plane.data().slice(s![..;-1, ..]).to_owned();
    let mut header = plane.header().clone();
    if let Some(mut wcs) = plane.wcs() {
        wcs.crpix[1] = plane.height() as f64 + 1.0 - wcs.crpix[1];
        wcs.cd[0][1] = -wcs.cd[0][1];
        wcs.cd[1][1] = -wcs.cd[1][1];
        wcs.write_to(&mut header);
    }
    plane.derive(data, header)
}

/// Mirror the column order.
pub fn flip_x(plane: &ImagePlane) -> Result<ImagePlane> {
    let data = plane.data().slice(s![.., ..;-1]).to_owned();
    let mut header = plane.header().clone();
    if let Some(mut wcs) = plane.wcs() {
        mirror_x(&mut wcs, plane.width());
        wcs.write_to(&mut header);
    }
    plane.derive(data, header)
}

fn mirror_x(wcs: &mut Wcs, width: usize) {
    wcs.crpix[0] = width as f64 + 1.0 - wcs.crpix[0];
    wcs.cd[0][0] = -wcs.cd[0][0];
    wcs.cd[1][0] = -wcs.cd[1][0];
}
