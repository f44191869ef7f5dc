use pattern_core::{PatternKind, SensitivityConfig, Series, TurningPointKind, VolumeTrend};
use pattern_primitives::{
    aggregate, build_volume_profile, find_turning_points, length_score, sensitivity_adjust,
    WeightedFactor,
};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_DISTANCE: usize = 5;
const SIMILARITY_TOLERANCE: f64 = 0.03;
const MIN_RETRACEMENT: f64 = 0.10;

/// Double/triple tops and bottoms (spec §4.6).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = detect_one(series, sensitivity, true);
    patterns.extend(detect_one(series, sensitivity, false));
    (patterns, Vec::new())
}

fn detect_one(series: &Series, sensitivity: &SensitivityConfig, tops: bool) -> Vec<pattern_core::DetectedPattern> {
    let highs = series.highs();
    let lows = series.lows();
    let volumes = series.volumes();
    let sens = sensitivity.reversal_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let extrema_values = if tops { &highs } else { &lows };
    let intervening_values = if tops { &lows } else { &highs };

    let extrema: Vec<usize> = find_turning_points(extrema_values, MIN_DISTANCE)
        .into_iter()
        .filter(|tp| tp.kind == (if tops { TurningPointKind::Peak } else { TurningPointKind::Trough }))
        .map(|tp| tp.index)
        .collect();

    let mut patterns = Vec::new();

    for group_size in [2usize, 3usize] {
        if extrema.len() < group_size {
            continue;
        }
        for window in extrema.windows(group_size) {
            let values: Vec<f64> = window.iter().map(|&i| extrema_values[i]).collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            if mean.abs() < f64::EPSILON {
                continue;
            }
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            if (max - min) / mean > SIMILARITY_TOLERANCE {
                continue;
            }

            let span_start = window[0];
            let span_end = *window.last().unwrap();
            if span_end <= span_start {
                continue;
            }

            let mut intervening_indices = Vec::new();
            let mut depths = Vec::new();
            let mut ok = true;
            for pair in window.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if b <= a + 1 {
                    ok = false;
                    break;
                }
                let inner = &intervening_values[(a + 1)..b];
                let extreme_in_window = if tops {
                    inner.iter().cloned().fold(f64::MAX, f64::min)
                } else {
                    inner.iter().cloned().fold(f64::MIN, f64::max)
                };
                let offset = inner
                    .iter()
                    .position(|&v| (v - extreme_in_window).abs() < f64::EPSILON)
                    .unwrap_or(0);
                let intervening_index = a + 1 + offset;

                let relative_pos = (intervening_index - span_start) as f64 / (span_end - span_start) as f64;
                if !(0.2..=0.8).contains(&relative_pos) {
                    ok = false;
                    break;
                }

                let depth = if tops {
                    (mean - extreme_in_window) / mean
                } else {
                    (extreme_in_window - mean) / mean
                };
                if depth < MIN_RETRACEMENT {
                    ok = false;
                    break;
                }
                depths.push(depth);
                intervening_indices.push(intervening_index);
            }
            if !ok {
                continue;
            }

            let similarity_score = (1.0 - ((max - min) / mean).powi(2) / (SIMILARITY_TOLERANCE * SIMILARITY_TOLERANCE)).clamp(0.0, 1.0);
            let avg_depth = depths.iter().sum::<f64>() / depths.len() as f64;
            let depth_score = (avg_depth / 0.20).min(1.0);

            let volume_score = if volumes[span_end] > volumes[span_start] { 1.0 } else { 0.4 };
            let len_score = length_score(span_end - span_start, 10, 60);

            let factors = [
                WeightedFactor::new(0.3, similarity_score),
                WeightedFactor::new(0.3, depth_score),
                WeightedFactor::new(0.2, volume_score),
                WeightedFactor::new(0.2, len_score),
            ];
            let confidence = sensitivity_adjust(aggregate(&factors), sens);
            if confidence < accept_threshold {
                continue;
            }

            let intervening_avg = intervening_indices
                .iter()
                .map(|&i| intervening_values[i])
                .sum::<f64>()
                / intervening_indices.len() as f64;
            let target_price = if tops {
                intervening_avg - (mean - intervening_avg)
            } else {
                intervening_avg + (intervening_avg - mean)
            };

            let kind = match (tops, group_size) {
                (true, 2) => PatternKind::DoubleTop,
                (true, _) => PatternKind::TripleTop,
                (false, 2) => PatternKind::DoubleBottom,
                (false, _) => PatternKind::TripleBottom,
            };

            let levels = key_levels(&[
                ("extrema_level", mean),
                ("intervening_level", intervening_avg),
                ("target_price", target_price),
                ("retracement_pct", avg_depth * 100.0),
            ]);
            let volume_slice = &volumes[span_start..=span_end];
            let confirming = VolumeTrend::Increasing;
            let profile = build_volume_profile(volume_slice, confirming, None);

            patterns.push(make_pattern(
                kind,
                confidence,
                series,
                span_start,
                span_end,
                levels,
                profile,
                format!("{kind:?} across bars {span_start}-{span_end}"),
                None,
            ));
        }
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pattern_core::Bar;

    fn series_from(highs: &[f64], lows: &[f64]) -> Series {
        let t0 = Utc::now();
        let bars: Vec<Bar> = (0..highs.len())
            .map(|i| Bar {
                timestamp: t0 + Duration::hours(i as i64),
                open: (highs[i] + lows[i]) / 2.0,
                high: highs[i],
                low: lows[i],
                close: (highs[i] + lows[i]) / 2.0,
                volume: 1000.0 + i as f64 * 5.0,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn detects_a_double_bottom() {
        let n = 45;
        let mut lows = vec![100.0; n];
        let mut highs = vec![110.0; n];
        // troughs at 12 and 32, peak between at ~22
        for i in 0..n {
            let base = 100.0;
            lows[i] = base + ((i as f64 - 12.0).abs().min((i as f64 - 32.0).abs())) * 0.4;
        }
        lows[12] = 95.0;
        lows[32] = 95.3;
        for i in 17..27 {
            highs[i] = 108.0;
            lows[i] = lows[i].max(102.0);
        }
        highs[22] = 108.0;
        let series = series_from(&highs, &lows);
        let sensitivity = pattern_core::SensitivityLevel::High.expand();
        let (patterns, _warnings) = detect(&series, &sensitivity);
        assert!(patterns.iter().any(|p| p.kind == PatternKind::DoubleBottom));
        for p in &patterns {
            assert!((0.0..=1.0).contains(&p.confidence));
        }
    }
}
