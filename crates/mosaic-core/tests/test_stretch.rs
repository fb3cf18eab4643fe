use approx::assert_relative_eq;
use ndarray::array;

use mosaic_core::render::config::{Scale, StretchConfig};
use mosaic_core::render::stretch::{
    cut_levels, percentile, stretch_levels, stretch_value, NO_DATA_LEVEL,
};

fn linear() -> StretchConfig {
    StretchConfig {
        scale: Scale::Linear,
        ..Default::default()
    }
}

#[test]
fn test_percentile_interpolates() {
    let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
    assert_relative_eq!(percentile(&sorted, 0.0).unwrap(), 0.0);
    assert_relative_eq!(percentile(&sorted, 50.0).unwrap(), 20.0);
    assert_relative_eq!(percentile(&sorted, 100.0).unwrap(), 40.0);
    assert_relative_eq!(percentile(&sorted, 10.0).unwrap(), 4.0, epsilon = 1e-5);
    assert!(percentile(&[], 50.0).is_none());
}

#[test]
fn test_auto_cuts_ignore_sentinel() {
    let data = array![[f32::NAN, 0.0], [100.0, f32::NAN]];
    let config = StretchConfig {
        low_percentile: 0.0,
        high_percentile: 100.0,
        ..Default::default()
    };
    let (lo, hi) = cut_levels(data.view(), &config).unwrap();
    assert_relative_eq!(lo, 0.0);
    assert_relative_eq!(hi, 100.0);
}

#[test]
fn test_fixed_cuts_win() {
    let data = array![[1.0f32, 2.0]];
    let config = StretchConfig {
        min_cut: Some(-5.0),
        max_cut: Some(5.0),
        ..Default::default()
    };
    assert_eq!(cut_levels(data.view(), &config), Some((-5.0, 5.0)));
}

#[test]
fn test_all_sentinel_has_no_cuts() {
    let data = array![[f32::NAN, f32::NAN]];
    assert!(cut_levels(data.view(), &StretchConfig::default()).is_none());
}

#[test]
fn test_linear_stretch_endpoints() {
    let config = linear();
    assert_eq!(stretch_value(0.0, 0.0, 100.0, &config), 1);
    assert_eq!(stretch_value(100.0, 0.0, 100.0, &config), 255);
    assert_eq!(stretch_value(-50.0, 0.0, 100.0, &config), 1);
    assert_eq!(stretch_value(500.0, 0.0, 100.0, &config), 255);
    assert_eq!(stretch_value(50.0, 0.0, 100.0, &config), 128);
}

#[test]
fn test_log_stretch_brightens_midtones() {
    let log = StretchConfig::default();
    assert_eq!(log.scale, Scale::Log);
    let mid_log = stretch_value(10.0, 0.0, 100.0, &log);
    let mid_lin = stretch_value(10.0, 0.0, 100.0, &linear());
    assert!(mid_log > mid_lin);
    assert_eq!(stretch_value(100.0, 0.0, 100.0, &log), 255);
    assert_eq!(stretch_value(0.0, 0.0, 100.0, &log), 1);
}

#[test]
fn test_sentinel_distinct_from_faintest_flux() {
    let data = array![[f32::NAN, 0.0, 50.0]];
    let levels = stretch_levels(data.view(), 0.0, 50.0, &linear());
    assert_eq!(levels[[0, 0]], NO_DATA_LEVEL);
    assert!(levels[[0, 1]] >= 1);
    assert_eq!(levels[[0, 2]], 255);
}

#[test]
fn test_flat_range_does_not_divide_by_zero() {
    let level = stretch_value(7.0, 7.0, 7.0, &linear());
    assert_eq!(level, 1);
}
