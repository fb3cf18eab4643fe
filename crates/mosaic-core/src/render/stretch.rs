use ndarray::{Array2, ArrayView2};

use crate::consts::{EPSILON, LOWEST_OBSERVED_LEVEL};

use super::config::{Scale, StretchConfig};

/// Gray level reserved for cells with no observed value.
pub const NO_DATA_LEVEL: u8 = 0;

/// Percentile `p` (0..=100) of an ascending slice, interpolating linearly
/// between neighbouring samples.
pub fn percentile(sorted: &[f32], p: f32) -> Option<f32> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Cut levels for `data`: the configured ones, or percentiles of its
/// observed pixels. `None` when there is nothing observed to measure.
pub fn cut_levels(data: ArrayView2<'_, f32>, config: &StretchConfig) -> Option<(f32, f32)> {
    if let Some(cuts) = config.fixed_cuts() {
        return Some(cuts);
    }
    let mut observed: Vec<f32> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    observed.sort_by(f32::total_cmp);
    Some((
        percentile(&observed, config.low_percentile)?,
        percentile(&observed, config.high_percentile)?,
    ))
}

/// Map one observed value to a gray level in `LOWEST_OBSERVED_LEVEL..=255`.
pub fn stretch_value(value: f32, min_cut: f32, max_cut: f32, config: &StretchConfig) -> u8 {
    let range = max_cut - min_cut;
    let range = if range.abs() < EPSILON { 1.0 } else { range };
    let x = ((value - min_cut) / range).clamp(0.0, 1.0);

    let scaled = match config.scale {
        Scale::Linear => x,
        Scale::Log => {
            let a = config.log_exponent;
            (a * x + 1.0).ln() / (a + 1.0).ln()
        }
    };

    let span = (u8::MAX - LOWEST_OBSERVED_LEVEL) as f32;
    LOWEST_OBSERVED_LEVEL + (scaled.clamp(0.0, 1.0) * span).round() as u8
}

/// Stretch a raster to 8-bit gray levels. `NaN` becomes `NO_DATA_LEVEL`,
/// every observed value lands at `LOWEST_OBSERVED_LEVEL` or above.
pub fn stretch_levels(
    data: ArrayView2<'_, f32>,
    min_cut: f32,
    max_cut: f32,
    config: &StretchConfig,
) -> Array2<u8> {
    data.mapv(|v| {
        if v.is_nan() {
            NO_DATA_LEVEL
        } else {
            stretch_value(v, min_cut, max_cut, config)
        }
    })
}
