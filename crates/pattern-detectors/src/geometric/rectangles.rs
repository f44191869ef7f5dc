use pattern_core::{PatternKind, SensitivityConfig, Series, TurningPointKind, VolumeTrend};
use pattern_primitives::{
    aggregate, build_volume_profile, cluster_levels, fit_trendline, find_turning_points,
    length_score, line_fit_quality, sensitivity_adjust, touch_count, WeightedFactor,
};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_PATTERN_LENGTH: usize = 10;
const MIN_DISTANCE: usize = 3;

/// Rectangles (horizontal consolidation) and trending channels (spec §4.5).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = rectangles(series, sensitivity);
    let (channel_patterns, mut warnings) = channels(series, sensitivity);
    patterns.extend(channel_patterns);
    warnings.sort();
    (patterns, warnings)
}

fn rectangles(series: &Series, sensitivity: &SensitivityConfig) -> Vec<pattern_core::DetectedPattern> {
    let highs = series.highs();
    let lows = series.lows();
    let closes = series.closes();
    let volumes = series.volumes();
    let sens = sensitivity.geometric_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let resistances = cluster_levels(&highs, 0.02, 2);
    let supports = cluster_levels(&lows, 0.02, 2);
    let mut patterns = Vec::new();

    for support in &supports {
        for resistance in &resistances {
            if resistance.price <= support.price {
                continue;
            }
            let range = resistance.price - support.price;
            let band_tolerance = range * 0.05;

            let in_band: Vec<usize> = (0..series.len())
                .filter(|&i| {
                    lows[i] >= support.price - band_tolerance
                        && highs[i] <= resistance.price + band_tolerance
                })
                .collect();
            if in_band.len() < MIN_PATTERN_LENGTH {
                continue;
            }

            let Some((start_index, end_index)) = longest_run(&in_band) else {
                continue;
            };
            if end_index - start_index < MIN_PATTERN_LENGTH {
                continue;
            }

            let respect_tolerance = range * 0.03;
            let total = end_index - start_index + 1;
            let violations = (start_index..=end_index)
                .filter(|&i| {
                    lows[i] < support.price - respect_tolerance
                        || highs[i] > resistance.price + respect_tolerance
                })
                .count();
            let level_respect = (1.0 - violations as f64 / total as f64).max(0.0);

            let support_line = pattern_core::Trendline {
                start_index,
                end_index,
                slope: 0.0,
                intercept: support.price,
                r_squared: 1.0,
            };
            let resistance_line = pattern_core::Trendline {
                start_index,
                end_index,
                slope: 0.0,
                intercept: resistance.price,
                r_squared: 1.0,
            };
            let touches = touch_count(&lows, start_index, end_index, &support_line, 0.02)
                + touch_count(&highs, start_index, end_index, &resistance_line, 0.02);
            let touch_score = ((touches as f64 - 4.0) / 6.0).clamp(0.0, 1.0);

            let len_score = length_score(end_index - start_index, 10, 60);

            let slice = &volumes[start_index..=end_index];
            let volume_score = volume_stability(slice);

            let factors = [
                WeightedFactor::new(0.4, level_respect),
                WeightedFactor::new(0.3, touch_score),
                WeightedFactor::new(0.2, len_score),
                WeightedFactor::new(0.1, volume_score),
            ];
            let confidence = sensitivity_adjust(aggregate(&factors), sens);
            if confidence < accept_threshold {
                continue;
            }

            let kind = classify_trend_context(&closes, start_index);
            let profile = build_volume_profile(slice, VolumeTrend::Stable, None);
            let levels = key_levels(&[
                ("support_level", support.price),
                ("resistance_level", resistance.price),
                ("range_size", range),
                ("range_percent", range / support.price * 100.0),
            ]);

            patterns.push(make_pattern(
                kind,
                confidence,
                series,
                start_index,
                end_index,
                levels,
                profile,
                format!("{kind:?} between {:.4} and {:.4}", support.price, resistance.price),
                None,
            ));
        }
    }

    patterns
}

fn classify_trend_context(closes: &[f64], start_index: usize) -> PatternKind {
    let pre_trend_length = start_index.min(10);
    if pre_trend_length < 3 {
        return PatternKind::RectangleNeutral;
    }
    let window = &closes[start_index - pre_trend_length..start_index];
    let first = window[0];
    let last = window[window.len() - 1];
    if first.abs() < f64::EPSILON {
        return PatternKind::RectangleNeutral;
    }
    let change = (last - first) / first;
    if change > 0.02 {
        PatternKind::RectangleBullish
    } else if change < -0.02 {
        PatternKind::RectangleBearish
    } else {
        PatternKind::RectangleNeutral
    }
}

fn volume_stability(volumes: &[f64]) -> f64 {
    let valid: Vec<f64> = volumes.iter().copied().filter(|&v| v > 0.0).collect();
    if valid.len() < 3 {
        return 0.5;
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    if mean.abs() < f64::EPSILON {
        return 0.5;
    }
    let variance = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (valid.len() - 1) as f64;
    let cv = variance.sqrt() / mean;
    (1.0 - cv).clamp(0.0, 1.0)
}

fn longest_run(indices: &[usize]) -> Option<(usize, usize)> {
    if indices.is_empty() {
        return None;
    }
    let mut best: Option<(usize, usize)> = None;
    let mut start = indices[0];
    let mut prev = indices[0];
    for &i in &indices[1..] {
        if i - prev > 2 {
            if best.is_none_or(|(s, e)| prev - s > e - s) {
                best = Some((start, prev));
            }
            start = i;
        }
        prev = i;
    }
    if best.is_none_or(|(s, e)| prev - s > e - s) {
        best = Some((start, prev));
    }
    best
}

fn channels(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let highs = series.highs();
    let lows = series.lows();
    let volumes = series.volumes();
    let n = series.len();
    let sens = sensitivity.geometric_patterns;
    let accept_threshold = 0.4 + sens * 0.3;

    let peaks: Vec<usize> = find_turning_points(&highs, MIN_DISTANCE)
        .into_iter()
        .filter(|tp| tp.kind == TurningPointKind::Peak)
        .map(|tp| tp.index)
        .collect();
    let troughs: Vec<usize> = find_turning_points(&lows, MIN_DISTANCE)
        .into_iter()
        .filter(|tp| tp.kind == TurningPointKind::Trough)
        .map(|tp| tp.index)
        .collect();

    let mut patterns = Vec::new();
    let warnings = Vec::new();

    for i in 0..peaks.len() {
        for j in (i + 1)..peaks.len() {
            let (p1, p2) = (peaks[i], peaks[j]);
            for k in 0..troughs.len() {
                for l in (k + 1)..troughs.len() {
                    let (t1, t2) = (troughs[k], troughs[l]);
                    let start_index = p1.min(t1);
                    let end_index = p2.max(t2);
                    if end_index >= n || end_index <= start_index {
                        continue;
                    }

                    let Some(upper) = fit_trendline(&[(p1, highs[p1]), (p2, highs[p2])]) else {
                        continue;
                    };
                    let Some(lower) = fit_trendline(&[(t1, lows[t1]), (t2, lows[t2])]) else {
                        continue;
                    };

                    let kind = if upper.slope > 0.001 && lower.slope > 0.001 {
                        PatternKind::RisingChannel
                    } else if upper.slope < -0.001 && lower.slope < -0.001 {
                        PatternKind::FallingChannel
                    } else {
                        continue;
                    };

                    let touches = touch_count(&highs, start_index, end_index, &upper, 0.02)
                        + touch_count(&lows, start_index, end_index, &lower, 0.02);
                    if touches < 3 {
                        continue;
                    }

                    let upper_fit = line_fit_quality(&highs, start_index, &upper, true);
                    let lower_fit = line_fit_quality(&lows, start_index, &lower, false);
                    let touch_score = (touches as f64 / 10.0).min(1.0);
                    let len_score = length_score(end_index - start_index, 15, 80);

                    let factors = [
                        WeightedFactor::new(0.35, upper_fit),
                        WeightedFactor::new(0.35, lower_fit),
                        WeightedFactor::new(0.2, touch_score),
                        WeightedFactor::new(0.1, len_score),
                    ];
                    let confidence = sensitivity_adjust(aggregate(&factors), sens);
                    if confidence < accept_threshold {
                        continue;
                    }

                    let end = end_index.min(volumes.len().saturating_sub(1));
                    let profile = build_volume_profile(&volumes[start_index..=end], VolumeTrend::Stable, None);
                    let levels = key_levels(&[
                        ("upper_slope", upper.slope),
                        ("lower_slope", lower.slope),
                        ("channel_width", (upper.intercept - lower.intercept).abs()),
                    ]);

                    patterns.push(make_pattern(
                        kind,
                        confidence,
                        series,
                        start_index,
                        end_index,
                        levels,
                        profile,
                        format!("{kind:?} across bars {start_index}-{end_index}"),
                        None,
                    ));
                }
            }
        }
    }

    (patterns, warnings)
}
