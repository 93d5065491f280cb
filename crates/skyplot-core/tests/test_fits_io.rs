mod common;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use skyplot_core::io::{write_planes, FitsHeader, FitsReader};
use skyplot_core::PlotError;

use common::{build_fits, build_image, gzip, ramp, write_fits_in, write_test_fits, Bitpix, Hdu};

// ---------------------------------------------------------------------------
// Sample decoding
// ---------------------------------------------------------------------------

#[test]
fn test_float_image_rows_in_file_order() {
    let file = write_test_fits(&build_image(3, 2, ramp(3, 2)));
    let planes = FitsReader::open(file.path()).unwrap().read_planes().unwrap();

    assert_eq!(planes.len(), 1);
    let p = &planes[0];
    assert_eq!((p.width(), p.height()), (3, 2));
    assert_eq!(p.data()[[0, 0]], 0.0);
    assert_eq!(p.data()[[0, 2]], 2.0);
    assert_eq!(p.data()[[1, 0]], 3.0);
}

#[test]
fn test_int16_scaling_and_blank() {
    let hdu = Hdu::image(2, 2, vec![0.0, 1.0, -1.0, 3.0])
        .with_bitpix(Bitpix::I16)
        .with_f64("BSCALE", 2.0)
        .with_f64("BZERO", 10.0)
        .with_i64("BLANK", -1);
    let reader = FitsReader::from_bytes(build_fits(&[hdu])).unwrap();
    let plane = &reader.read_planes().unwrap()[0];
    let d = plane.data();

    assert_abs_diff_eq!(d[[0, 0]], 10.0);
    assert_abs_diff_eq!(d[[0, 1]], 12.0);
    assert!(d[[1, 0]].is_nan());
    assert_abs_diff_eq!(d[[1, 1]], 16.0);
}

#[test]
fn test_blank_is_ignored_for_float_data() {
    let hdu = Hdu::image(2, 1, vec![5.0, 6.0]).with_i64("BLANK", 5);
    let reader = FitsReader::from_bytes(build_fits(&[hdu])).unwrap();
    let plane = &reader.read_planes().unwrap()[0];
    assert_abs_diff_eq!(plane.data()[[0, 0]], 5.0);
    assert_abs_diff_eq!(plane.data()[[0, 1]], 6.0);
}

#[test]
fn test_all_bitpix_variants_decode() {
    for bitpix in [Bitpix::U8, Bitpix::I16, Bitpix::I32, Bitpix::F32, Bitpix::F64] {
        let hdu = Hdu::image(4, 2, ramp(4, 2)).with_bitpix(bitpix);
        let reader = FitsReader::from_bytes(build_fits(&[hdu])).unwrap();
        let plane = &reader.read_planes().unwrap()[0];
        assert_eq!(plane.data()[[1, 3]], 7.0, "{bitpix:?}");
    }
}

#[test]
fn test_large_plane_decodes_in_parallel_path() {
    let (w, h) = (200, 100);
    let reader = FitsReader::from_bytes(build_image(w, h, ramp(w, h))).unwrap();
    let plane = &reader.read_planes().unwrap()[0];
    assert_eq!(plane.data()[[99, 199]], (w * h - 1) as f32);
}

// ---------------------------------------------------------------------------
// HDU layout
// ---------------------------------------------------------------------------

#[test]
fn test_cube_slices_become_planes() {
    let values = ramp(2, 2 * 3);
    let reader = FitsReader::from_bytes(build_fits(&[Hdu::cube(2, 2, 3, values)])).unwrap();
    let planes = reader.read_planes().unwrap();

    assert_eq!(planes.len(), 3);
    for (i, p) in planes.iter().enumerate() {
        assert_eq!(p.index(), i);
        assert_eq!(p.cube_plane(), Some(i));
        assert_eq!(p.data()[[0, 0]], (i * 4) as f32);
        assert_eq!(p.header().get_i64("NAXIS"), Some(2));
    }
}

#[test]
fn test_image_extension_after_empty_primary() {
    let primary = Hdu {
        bitpix: Bitpix::I16,
        axes: vec![],
        values: vec![],
        extra: FitsHeader::new(),
    };
    let ext = Hdu::image(2, 2, vec![1.0, 2.0, 3.0, 4.0]).with_str("EXTTYPE", "MASK");
    let reader = FitsReader::from_bytes(build_fits(&[primary, ext])).unwrap();

    assert_eq!(reader.hdus().len(), 2);
    assert!(!reader.hdus()[0].is_image);
    let planes = reader.read_planes().unwrap();
    assert_eq!(planes.len(), 1);
    assert_eq!(planes[0].hdu_index(), 1);
    assert_eq!(planes[0].ext_type(), Some("MASK"));
}

#[test]
fn test_gzip_file_is_inflated() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fits_in(dir.path(), "sky.fits.gz", &gzip(&build_image(3, 3, ramp(3, 3))));
    let planes = FitsReader::open(&path).unwrap().read_planes().unwrap();
    assert_eq!(planes[0].data()[[2, 2]], 8.0);
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

#[test]
fn test_missing_simple_is_rejected() {
    let mut bytes = build_image(2, 2, ramp(2, 2));
    bytes[..6].copy_from_slice(b"SIMPLX");
    assert!(matches!(FitsReader::from_bytes(bytes), Err(PlotError::Parse(_))));
}

#[test]
fn test_truncated_data_is_rejected() {
    let mut bytes = build_image(100, 100, ramp(100, 100));
    bytes.truncate(bytes.len() - 2880 * 3);
    assert!(matches!(FitsReader::from_bytes(bytes), Err(PlotError::Parse(_))));
}

#[test]
fn test_four_populated_axes_are_rejected() {
    let hdu = Hdu {
        bitpix: Bitpix::F32,
        axes: vec![2, 2, 2, 2],
        values: ramp(2, 8),
        extra: FitsHeader::new(),
    };
    let reader = FitsReader::from_bytes(build_fits(&[hdu])).unwrap();
    assert!(matches!(reader.read_planes(), Err(PlotError::Parse(_))));
}

#[test]
fn test_oversized_axes_are_parse_errors() {
    for axes in [vec![1 << 32, 1 << 32], vec![1 << 40, 1 << 40, 4]] {
        let hdu = Hdu {
            bitpix: Bitpix::F64,
            axes: axes.clone(),
            values: Vec::new(),
            extra: FitsHeader::new(),
        };
        let result = FitsReader::from_bytes(build_fits(&[hdu]));
        assert!(matches!(result, Err(PlotError::Parse(_))), "{axes:?}");
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = FitsReader::open(std::path::Path::new("/no/such/file.fits")).err().unwrap();
    assert!(matches!(err, PlotError::Io(_)));
    assert!(err.is_stale_source());
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

#[test]
fn test_written_planes_read_back_with_wcs() {
    let hdu = Hdu::image(4, 3, ramp(4, 3))
        .with_bitpix(Bitpix::I16)
        .with_f64("BSCALE", 0.5)
        .with_tan_wcs(150.0, 2.0, 0.001);
    let source = FitsReader::from_bytes(build_fits(&[hdu])).unwrap();
    let plane = Arc::new(source.read_planes().unwrap().remove(0));

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("copy.fits");
    write_planes(&out, &[Arc::clone(&plane), Arc::clone(&plane)]).unwrap();

    let back = FitsReader::open(&out).unwrap();
    assert_eq!(back.hdus()[0].bitpix, -32);
    let planes = back.read_planes().unwrap();
    assert_eq!(planes.len(), 2);
    assert_eq!(planes[1].data(), plane.data());
    assert_eq!(planes[1].header().get_f64("BSCALE"), None);

    let wcs = planes[0].wcs().unwrap();
    assert_abs_diff_eq!(wcs.crval[0], 150.0, epsilon = 1e-9);
    assert_abs_diff_eq!(wcs.cd[1][1], 0.001, epsilon = 1e-12);
    assert!(!dir.path().join("nested").join("copy.fits.part").exists());
}
