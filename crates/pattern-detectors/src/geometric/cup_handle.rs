use pattern_core::{PatternKind, SensitivityConfig, Series, VolumeTrend};
use pattern_primitives::{aggregate, build_volume_profile, fit_trendline, sensitivity_adjust, WeightedFactor};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_CUP_LEN: usize = 15;
const MAX_CUP_LEN: usize = 80;
const MIN_HANDLE_LEN: usize = 3;
const MAX_HANDLE_LEN: usize = 20;
const MIN_RIM_SIMILARITY: f64 = 0.05;
const MIN_DEPTH: f64 = 0.12;
const MAX_DEPTH: f64 = 0.50;

/// Cup-and-handle and its inverted mirror (spec §4.5).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = detect_variant(series, sensitivity, false);
    patterns.extend(detect_variant(series, sensitivity, true));
    (patterns, Vec::new())
}

fn detect_variant(series: &Series, sensitivity: &SensitivityConfig, inverted: bool) -> Vec<pattern_core::DetectedPattern> {
    let highs = series.highs();
    let lows = series.lows();
    let closes = series.closes();
    let volumes = series.volumes();
    let n = series.len();
    let sens = sensitivity.geometric_patterns;
    let accept_threshold = 0.3 + sens * 0.3;
    let sign: f64 = if inverted { -1.0 } else { 1.0 };

    let rims = if inverted { &lows } else { &highs };
    let extreme_source = if inverted { &highs } else { &lows };

    let mut patterns = Vec::new();

    for start in 0..n {
        for cup_len in MIN_CUP_LEN..=MAX_CUP_LEN {
            if start + cup_len > n {
                break;
            }
            let end = start + cup_len - 1;

            let left_rim = rims[start];
            let right_rim = rims[end];
            let rim_avg = (left_rim + right_rim) / 2.0;
            if rim_avg.abs() < f64::EPSILON {
                continue;
            }
            if (left_rim - right_rim).abs() / rim_avg > MIN_RIM_SIMILARITY {
                continue;
            }

            let extreme_idx = if inverted {
                (start..=end).max_by(|&a, &b| extreme_source[a].total_cmp(&extreme_source[b])).unwrap()
            } else {
                (start..=end).min_by(|&a, &b| extreme_source[a].total_cmp(&extreme_source[b])).unwrap()
            };
            if extreme_idx == start || extreme_idx == end {
                continue;
            }
            let extreme_value = extreme_source[extreme_idx];
            let depth = sign * (rim_avg - extreme_value) / rim_avg;
            if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
                continue;
            }

            let left_score = direction_score(&closes[start..=extreme_idx], !inverted);
            let right_score = direction_score(&closes[extreme_idx..=end], inverted);
            let smoothness = curve_smoothness(&closes[start..=end]);
            let u_shape = 0.35 * left_score + 0.35 * right_score + 0.3 * smoothness;
            if u_shape <= 0.6 {
                continue;
            }

            let time_ratio = (extreme_idx - start) as f64 / (end - start) as f64;
            let time_symmetry = (1.0 - (time_ratio - 0.5).abs() * 2.0).clamp(0.0, 1.0);
            let price_symmetry = (1.0 - ((left_rim - right_rim).abs() / rim_avg) / MIN_RIM_SIMILARITY).clamp(0.0, 1.0);
            let symmetry = (time_symmetry + price_symmetry) / 2.0;
            if symmetry <= 0.5 {
                continue;
            }

            let depth_abs = rim_avg * depth;
            let max_handle_len = MAX_HANDLE_LEN.min(cup_len);

            for handle_len in MIN_HANDLE_LEN..=max_handle_len {
                let handle_start = end + 1;
                if handle_start + handle_len > n {
                    break;
                }
                let handle_end = handle_start + handle_len - 1;

                let handle_cap = rims[handle_start];
                let handle_extreme = if inverted {
                    highs[handle_start..=handle_end].iter().cloned().fold(f64::MIN, f64::max)
                } else {
                    lows[handle_start..=handle_end].iter().cloned().fold(f64::MAX, f64::min)
                };

                if depth_abs.abs() < f64::EPSILON {
                    continue;
                }
                let retracement = (sign * (handle_cap - handle_extreme) / depth_abs).abs();
                if !(0.05..=0.50).contains(&retracement) {
                    continue;
                }

                let handle_points: Vec<(usize, f64)> = (handle_start..=handle_end).map(|i| (i, closes[i])).collect();
                let Some(handle_line) = fit_trendline(&handle_points) else {
                    continue;
                };
                let slope_rel = handle_line.slope / rim_avg;
                if sign * slope_rel > 0.01 {
                    continue;
                }

                let retracement_score = 1.0 - ((retracement - 0.25).abs() / 0.20).clamp(0.0, 1.0);
                let slope_score = 1.0 - (slope_rel.abs() / 0.01).clamp(0.0, 1.0) * 0.5;
                let handle_score = 0.5 * retracement_score + 0.5 * slope_score;

                let volume_slice = &volumes[start..=handle_end];
                let profile = build_volume_profile(volume_slice, VolumeTrend::Decreasing, None);
                let volume_score = if profile.confirms_pattern { 1.0 } else { 0.4 };

                let factors = [
                    WeightedFactor::new(0.4, u_shape),
                    WeightedFactor::new(0.2, symmetry),
                    WeightedFactor::new(0.3, handle_score),
                    WeightedFactor::new(0.1, volume_score),
                ];
                let confidence = sensitivity_adjust(aggregate(&factors), sens);
                if confidence < accept_threshold {
                    continue;
                }

                let kind = if inverted { PatternKind::InvertedCupHandle } else { PatternKind::CupAndHandle };
                let levels = key_levels(&[
                    ("rim_level", rim_avg),
                    ("cup_depth_pct", depth * 100.0),
                    ("handle_retracement_pct", retracement * 100.0),
                ]);

                patterns.push(make_pattern(
                    kind,
                    confidence,
                    series,
                    start,
                    handle_end,
                    levels,
                    profile,
                    format!("{kind:?} cup {}-{} handle {}-{}", start, end, handle_start, handle_end),
                    None,
                ));
            }
        }
    }

    patterns
}

/// 1.0 if the slice trends in the expected direction with a good fit, scaled
/// by R². `want_negative` selects decline vs. rise.
fn direction_score(values: &[f64], want_negative: bool) -> f64 {
    let points: Vec<(usize, f64)> = values.iter().enumerate().map(|(i, &v)| (i, v)).collect();
    let Some(line) = fit_trendline(&points) else {
        return 0.0;
    };
    let sign_ok = if want_negative { line.slope < 0.0 } else { line.slope > 0.0 };
    if sign_ok {
        line.r_squared.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Second-derivative roughness of `values`, converted to a `[0,1]` smoothness
/// score (spec §4.5 "curve smoothness").
fn curve_smoothness(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let range = values.iter().cloned().fold(f64::MIN, f64::max) - values.iter().cloned().fold(f64::MAX, f64::min);
    if range.abs() < f64::EPSILON {
        return 1.0;
    }
    let second_derivs: Vec<f64> = values
        .windows(3)
        .map(|w| w[2] - 2.0 * w[1] + w[0])
        .collect();
    let roughness = second_derivs.iter().map(|d| d.abs()).sum::<f64>() / second_derivs.len() as f64 / range;
    (1.0 - roughness).clamp(0.0, 1.0)
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
                volume: 1000.0 - (i as f64 * 1.5),
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn direction_score_rewards_a_clean_trend() {
        let declining: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        assert!(direction_score(&declining, true) > 0.9);
        assert_eq!(direction_score(&declining, false), 0.0);
    }

    #[test]
    fn curve_smoothness_penalizes_jagged_series() {
        let smooth: Vec<f64> = (0..20).map(|i| (i as f64 - 10.0).powi(2)).collect();
        let jagged: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.0 } else { 50.0 }).collect();
        assert!(curve_smoothness(&smooth) > curve_smoothness(&jagged));
    }

    #[test]
    fn runs_without_panicking_on_a_u_shaped_series() {
        let mut closes = Vec::new();
        for i in 0..20 {
            closes.push(100.0 - i as f64 * 1.5);
        }
        for i in 0..20 {
            closes.push(closes[19] + i as f64 * 1.5);
        }
        for i in 0..8 {
            closes.push(closes.last().unwrap() - i as f64 * 0.3);
        }
        let series = series_from(&closes);
        let sensitivity = pattern_core::SensitivityLevel::High.expand();
        let (patterns, _warnings) = detect(&series, &sensitivity);
        for p in &patterns {
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.start_index < p.end_index);
            assert!(p.end_index < closes.len());
        }
    }
}
