mod common;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use skyplot_core::io::FitsReader;
use skyplot_core::plane::ImagePlane;
use skyplot_core::transform::crop::{crop, CropRect};
use skyplot_core::transform::flip::{flip_x, flip_y};
use skyplot_core::transform::rotate::{north_up_angle, rotate};
use skyplot_core::transform::{apply, CropPoint, RotateSpec, TransformOp};
use skyplot_core::wcs::{CoordSystem, ImagePt, SkyPoint};
use skyplot_core::PlotError;

use common::{build_fits, ramp, Hdu};

fn plane_from(hdu: Hdu) -> ImagePlane {
    FitsReader::from_bytes(build_fits(&[hdu]))
        .unwrap()
        .read_planes()
        .unwrap()
        .remove(0)
}

fn sky_plane(w: usize, h: usize) -> ImagePlane {
    plane_from(Hdu::image(w, h, ramp(w, h)).with_tan_wcs(83.8, -5.4, 0.0005))
}

fn assert_same_sky(a: &ImagePlane, pa: ImagePt, b: &ImagePlane, pb: ImagePt) {
    let sa = a.wcs().unwrap().pixel_to_sky(pa).unwrap();
    let sb = b.wcs().unwrap().pixel_to_sky(pb).unwrap();
    assert_abs_diff_eq!(sa.lon, sb.lon, epsilon = 1e-9);
    assert_abs_diff_eq!(sa.lat, sb.lat, epsilon = 1e-9);
}

// ---------------------------------------------------------------------------
// Flip
// ---------------------------------------------------------------------------

#[test]
fn test_flip_y_twice_restores_pixels() {
    let plane = sky_plane(5, 4);
    let twice = flip_y(&flip_y(&plane).unwrap()).unwrap();
    assert_eq!(twice.data(), plane.data());
    assert_same_sky(&plane, ImagePt::new(1.5, 2.5), &twice, ImagePt::new(1.5, 2.5));
}

#[test]
fn test_flip_y_keeps_sky_under_mirrored_pixel() {
    let plane = sky_plane(6, 4);
    let flipped = flip_y(&plane).unwrap();
    assert_eq!(flipped.data()[[0, 2]], plane.data()[[3, 2]]);
    assert_same_sky(&plane, ImagePt::new(2.5, 0.5), &flipped, ImagePt::new(2.5, 3.5));
}

#[test]
fn test_flip_x_keeps_sky_under_mirrored_pixel() {
    let plane = sky_plane(6, 4);
    let flipped = flip_x(&plane).unwrap();
    assert_eq!(flipped.data()[[1, 0]], plane.data()[[1, 5]]);
    assert_same_sky(&plane, ImagePt::new(0.5, 1.5), &flipped, ImagePt::new(5.5, 1.5));
}

#[test]
fn test_flip_without_wcs_only_moves_pixels() {
    let plane = plane_from(Hdu::image(2, 2, ramp(2, 2)));
    let flipped = flip_y(&plane).unwrap();
    assert_eq!(flipped.data()[[0, 0]], 2.0);
    assert!(flipped.wcs().is_none());
}

// ---------------------------------------------------------------------------
// Crop
// ---------------------------------------------------------------------------

#[test]
fn test_crop_shifts_reference_pixel() {
    let plane = sky_plane(10, 8);
    let rect = CropRect { x: 2, y: 3, width: 4, height: 2 };
    let cropped = crop(&plane, &rect).unwrap();

    assert_eq!((cropped.width(), cropped.height()), (4, 2));
    assert_eq!(cropped.data()[[0, 0]], plane.data()[[3, 2]]);
    assert_same_sky(&plane, ImagePt::new(2.5, 3.5), &cropped, ImagePt::new(0.5, 0.5));
}

#[test]
fn test_crop_with_no_area_fails() {
    let err = CropRect::from_corners(ImagePt::new(3.0, 1.0), ImagePt::new(3.0, 6.0), 10, 10).err();
    assert!(matches!(err, Some(PlotError::Geometry(_))));
}

#[test]
fn test_crop_with_both_corners_outside_fails() {
    let err =
        CropRect::from_corners(ImagePt::new(-5.0, -5.0), ImagePt::new(20.0, 20.0), 10, 10).err();
    assert!(matches!(err, Some(PlotError::Geometry(_))));
}

#[test]
fn test_crop_by_sky_corners() {
    let plane = Arc::new(sky_plane(20, 20));
    let wcs = plane.wcs().unwrap();
    let a = wcs.pixel_to_sky(ImagePt::new(5.5, 5.5)).unwrap();
    let b = wcs.pixel_to_sky(ImagePt::new(15.5, 12.5)).unwrap();
    let op = TransformOp::PostCrop {
        corner1: CropPoint::Sky(a),
        corner2: CropPoint::Sky(b),
    };
    let out = apply(&plane, &[op]).unwrap();
    assert_eq!((out.plane.width(), out.plane.height()), (11, 8));
    assert_eq!(out.steps[0].params.as_deref(), Some("5-5-11x8"));
}

#[test]
fn test_crop_and_center_uses_degrees() {
    let plane = Arc::new(sky_plane(100, 100));
    let center = plane.wcs().unwrap().pixel_to_sky(ImagePt::new(50.5, 50.5)).unwrap();
    // 0.01 deg at 0.0005 deg/pixel spans 40.5..60.5, touching 21 pixels.
    let op = TransformOp::PostCropAndCenter { center, size_deg: 0.01 };
    let out = apply(&plane, &[op]).unwrap();
    assert_eq!((out.plane.width(), out.plane.height()), (21, 21));
}

// ---------------------------------------------------------------------------
// Rotate
// ---------------------------------------------------------------------------

#[test]
fn test_rotate_quarter_turn_swaps_canvas() {
    let plane = sky_plane(4, 2);
    let rotated = rotate(&plane, 90.0).unwrap();
    assert_eq!((rotated.width(), rotated.height()), (2, 4));
    assert_abs_diff_eq!(rotated.data()[[0, 0]], plane.data()[[1, 0]], epsilon = 1e-4);
    assert_same_sky(&plane, ImagePt::new(2.0, 1.0), &rotated, ImagePt::new(1.0, 2.0));
}

#[test]
fn test_rotate_corners_become_blank() {
    let rotated = rotate(&sky_plane(40, 40), 45.0).unwrap();
    assert!(rotated.width() > 40);
    assert!(rotated.data()[[0, 0]].is_nan());
    let mid = rotated.width() / 2;
    assert!(rotated.data()[[mid, mid]].is_finite());
}

#[test]
fn test_north_up_angle_of_north_up_image_is_zero() {
    let angle = north_up_angle(&sky_plane(50, 50), CoordSystem::EquatorialJ2000).unwrap();
    assert_abs_diff_eq!(angle, 0.0, epsilon = 1e-3);
}

#[test]
fn test_north_up_undoes_rotation() {
    let rotated = rotate(&sky_plane(100, 100), 30.0).unwrap();
    let angle = north_up_angle(&rotated, CoordSystem::EquatorialJ2000).unwrap();
    assert_abs_diff_eq!(angle, -30.0, epsilon = 1e-3);

    let back = rotate(&rotated, angle).unwrap();
    let residual = north_up_angle(&back, CoordSystem::EquatorialJ2000).unwrap();
    assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-3);
}

#[test]
fn test_rotate_without_wcs_fails() {
    let plane = plane_from(Hdu::image(4, 4, ramp(4, 4)));
    assert!(matches!(rotate(&plane, 10.0), Err(PlotError::Geometry(_))));
}

#[test]
fn test_rotate_all_sky_projection_fails() {
    let plane = plane_from(
        Hdu::image(8, 4, ramp(8, 4))
            .with_tan_wcs(0.0, 0.0, 1.0)
            .with_str("CTYPE1", "RA---AIT")
            .with_str("CTYPE2", "DEC--AIT"),
    );
    assert!(matches!(rotate(&plane, 10.0), Err(PlotError::Geometry(_))));
}

// ---------------------------------------------------------------------------
// Operation pipeline
// ---------------------------------------------------------------------------

#[test]
fn test_apply_skips_whole_turns() {
    let plane = Arc::new(sky_plane(8, 8));
    let ops = [
        TransformOp::Rotate(RotateSpec::Angle(360.0)),
        TransformOp::FlipY,
        TransformOp::Rotate(RotateSpec::Angle(0.0)),
    ];
    let out = apply(&plane, &ops).unwrap();
    assert_eq!(out.steps.len(), 1);
    assert_eq!(out.steps[0].suffix, "flip");
    assert!(out.steps[0].params.is_none());
}

#[test]
fn test_apply_keeps_input_untouched() {
    let plane = Arc::new(sky_plane(8, 6));
    let before = plane.data().clone();
    let out = apply(
        &plane,
        &[
            TransformOp::Rotate(RotateSpec::Angle(12.5)),
            TransformOp::Rotate(RotateSpec::North(CoordSystem::EquatorialJ2000)),
        ],
    )
    .unwrap();
    assert_eq!(plane.data(), &before);
    assert_eq!(out.steps.len(), 2);
    assert_eq!(out.steps[0].params.as_deref(), Some("12.50"));
    assert_eq!(out.steps[1].params.as_deref(), Some("north"));
    assert!(Arc::ptr_eq(&out.plane, &out.steps[1].plane));
}

#[test]
fn test_sky_point_outside_projection_fails() {
    let plane = Arc::new(sky_plane(8, 8));
    let far = SkyPoint::new(263.8, 5.4, CoordSystem::EquatorialJ2000);
    let op = TransformOp::PostCrop {
        corner1: CropPoint::Sky(far),
        corner2: CropPoint::Image(ImagePt::new(4.0, 4.0)),
    };
    assert!(apply(&plane, &[op]).is_err());
}
