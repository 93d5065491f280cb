use std::path::PathBuf;

use skyplot_core::stretch::{BoundKind, RangeSpec, StretchAlgorithm};
use skyplot_core::transform::{RotateSpec, TransformOp};
use skyplot_core::wcs::{CoordSystem, ProjectionKind};
use skyplot_core::{Band, EngineConfig, PlotError, PlotPhase};

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_stretch_algorithm_display() {
    assert_eq!(format!("{}", StretchAlgorithm::Linear), "Linear");
    assert_eq!(format!("{}", StretchAlgorithm::LogLog), "Log-Log");
    assert_eq!(format!("{}", StretchAlgorithm::Equalization), "Histogram Equalization");
    assert_eq!(format!("{}", StretchAlgorithm::PowerLawGamma), "Power Law Gamma");
}

#[test]
fn test_bound_kind_display() {
    assert_eq!(format!("{}", BoundKind::Percentage), "Percentage");
    assert_eq!(format!("{}", BoundKind::Zscale), "Zscale");
}

#[test]
fn test_band_and_phase_display() {
    assert_eq!(format!("{}", Band::NoBand), "No Band");
    assert_eq!(format!("{}", Band::Blue), "Blue");
    assert_eq!(format!("{}", PlotPhase::Recreating), "Recreating");
}

#[test]
fn test_projection_and_system_display() {
    assert_eq!(format!("{}", ProjectionKind::Tan), "Gnomonic (TAN)");
    assert_eq!(format!("{}", CoordSystem::Galactic), "Galactic");
}

#[test]
fn test_transform_op_display() {
    assert_eq!(format!("{}", TransformOp::FlipY), "Flip Y");
    assert_eq!(
        format!("{}", TransformOp::Rotate(RotateSpec::Angle(12.5))),
        "Rotate 12.50°"
    );
    assert_eq!(
        format!("{}", TransformOp::Rotate(RotateSpec::North(CoordSystem::EquatorialJ2000))),
        "Rotate north up (Equatorial J2000)"
    );
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_default_range_is_linear_percentile() {
    let r = RangeSpec::default();
    assert_eq!(r.algorithm, StretchAlgorithm::Linear);
    assert_eq!(r.lower.kind, BoundKind::Percentage);
    assert_eq!(r.lower.value, 1.0);
    assert_eq!(r.upper.value, 99.0);
    assert!(!r.preserve_hue);
}

#[test]
fn test_default_engine_config() {
    let c = EngineConfig::default();
    assert_eq!(c.stretch.tile_size, 512);
    assert_eq!(c.max_zoom, 32.0);
    assert!(c.source_roots.is_empty());
    assert!(c.stretch.parallel_cores >= 1);
    assert!(c.validate().is_ok());
}

// ---------------------------------------------------------------------------
// TOML
// ---------------------------------------------------------------------------

#[test]
fn test_config_toml_roundtrip() {
    let mut config = EngineConfig::default();
    config.work_dir = PathBuf::from("/var/tmp/skyplot");
    config.source_roots = vec![PathBuf::from("/data/archive")];
    config.default_range.algorithm = StretchAlgorithm::Asinh;
    config.cache.ttl_secs = 60;

    let text = config.to_toml().unwrap();
    let back = EngineConfig::from_toml(&text).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = EngineConfig::from_toml(
        r#"
        max_zoom = 8.0

        [stretch]
        tile_size = 256
        "#,
    )
    .unwrap();
    assert_eq!(config.max_zoom, 8.0);
    assert_eq!(config.stretch.tile_size, 256);
    assert_eq!(config.stretch.timeout_secs, EngineConfig::default().stretch.timeout_secs);
    assert_eq!(config.default_range, RangeSpec::default());
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = EngineConfig::from_toml("[stretch]\ntile_size = 0\n").err();
    assert!(matches!(err, Some(PlotError::Config(_))));
    let err = EngineConfig::from_toml("max_zoom = \"big\"").err();
    assert!(matches!(err, Some(PlotError::Config(_))));
}

#[test]
fn test_failure_reason_is_brief_and_detailed() {
    let reason = PlotError::UnknownContext("ctx-1".into()).reason();
    assert_eq!(reason.brief, "Plot no longer exists");
    assert!(reason.detail.contains("ctx-1"));
}
