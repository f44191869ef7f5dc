use pattern_core::{DetectedPattern, PatternKind, SensitivityConfig, Series, TurningPointKind, VolumeTrend};
use pattern_primitives::{aggregate, build_volume_profile, sensitivity_adjust, WeightedFactor};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_DISTANCE: usize = 5;
const MIN_HEAD_PROMINENCE: f64 = 0.03;
const SHOULDER_TOLERANCE: f64 = 0.05;

/// Head-and-shoulders and its inverse (spec §4.6).
///
/// Neckline proximity is scored against the series' latest close: a close
/// through the neckline (confirming the break) scores 1.0, otherwise the
/// score decays linearly out to a 5% miss.
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = detect_one(series, sensitivity, true);
    patterns.extend(detect_one(series, sensitivity, false));
    (patterns, Vec::new())
}

fn detect_one(series: &Series, sensitivity: &SensitivityConfig, top: bool) -> Vec<DetectedPattern> {
    let highs = series.highs();
    let lows = series.lows();
    let volumes = series.volumes();
    let closes = series.closes();
    let latest_close = *closes.last().unwrap();
    let sens = sensitivity.reversal_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let extrema_source = if top { &highs } else { &lows };
    let neckline_source = if top { &lows } else { &highs };
    let want = if top { TurningPointKind::Peak } else { TurningPointKind::Trough };

    let extrema: Vec<usize> = pattern_primitives::find_turning_points(extrema_source, MIN_DISTANCE)
        .into_iter()
        .filter(|tp| tp.kind == want)
        .map(|tp| tp.index)
        .collect();

    let mut patterns = Vec::new();

    for window in extrema.windows(3) {
        let (l, h, r) = (window[0], window[1], window[2]);
        let (v_l, v_h, v_r) = (extrema_source[l], extrema_source[h], extrema_source[r]);

        let head_beats_left = if top { v_h > v_l * (1.0 + MIN_HEAD_PROMINENCE) } else { v_h < v_l * (1.0 - MIN_HEAD_PROMINENCE) };
        let head_beats_right = if top { v_h > v_r * (1.0 + MIN_HEAD_PROMINENCE) } else { v_h < v_r * (1.0 - MIN_HEAD_PROMINENCE) };
        if !head_beats_left || !head_beats_right {
            continue;
        }

        let shoulder_avg = (v_l + v_r) / 2.0;
        if shoulder_avg.abs() < f64::EPSILON {
            continue;
        }
        let shoulder_diff_rel = (v_l - v_r).abs() / shoulder_avg;
        if shoulder_diff_rel > SHOULDER_TOLERANCE {
            continue;
        }

        if r <= l {
            continue;
        }
        let relative_pos = (h - l) as f64 / (r - l) as f64;
        if !(0.2..=0.8).contains(&relative_pos) {
            continue;
        }

        if h <= l + 1 || r <= h + 1 {
            continue;
        }
        let left_trough_idx = neckline_index(&neckline_source[(l + 1)..h], top) + l + 1;
        let right_trough_idx = neckline_index(&neckline_source[(h + 1)..r], top) + h + 1;
        let neckline = (neckline_source[left_trough_idx] + neckline_source[right_trough_idx]) / 2.0;
        if neckline.abs() < f64::EPSILON {
            continue;
        }

        let target_price = if top { neckline - (v_h - neckline) } else { neckline + (neckline - v_h) };

        let shoulder_symmetry = (1.0 - (shoulder_diff_rel / SHOULDER_TOLERANCE).clamp(0.0, 1.0)).clamp(0.0, 1.0);

        let prominence_left = ((v_h - v_l) / v_l).abs();
        let prominence_right = ((v_h - v_r) / v_r).abs();
        let head_prominence = ((prominence_left + prominence_right) / 2.0 / 0.10).min(1.0);

        let neckline_diff = (latest_close - neckline) / neckline;
        let breached = if top { neckline_diff <= 0.0 } else { neckline_diff >= 0.0 };
        let neckline_score = if breached {
            1.0
        } else {
            (1.0 - (neckline_diff.abs() / 0.05)).clamp(0.0, 1.0)
        };

        let classic_volume = if top { volumes[l] > volumes[r] } else { volumes[r] > volumes[l] };
        let volume_score = if classic_volume { 1.0 } else { 0.4 };

        let left_span = (h - l) as f64;
        let right_span = (r - h) as f64;
        let total_span = (r - l) as f64;
        let time_symmetry = (1.0 - ((left_span - right_span).abs() / total_span)).clamp(0.0, 1.0);

        let factors = [
            WeightedFactor::new(0.25, shoulder_symmetry),
            WeightedFactor::new(0.25, head_prominence),
            WeightedFactor::new(0.2, neckline_score),
            WeightedFactor::new(0.15, volume_score),
            WeightedFactor::new(0.15, time_symmetry),
        ];
        let confidence = sensitivity_adjust(aggregate(&factors), sens);
        if confidence < accept_threshold {
            continue;
        }

        let kind = if top { PatternKind::HeadShoulders } else { PatternKind::InverseHeadShoulders };
        let levels = key_levels(&[
            ("left_shoulder", v_l),
            ("head", v_h),
            ("right_shoulder", v_r),
            ("neckline", neckline),
            ("target_price", target_price),
        ]);
        let volume_slice = &volumes[l..=r];
        let confirming = if top { VolumeTrend::Decreasing } else { VolumeTrend::Increasing };
        let profile = build_volume_profile(volume_slice, confirming, None);

        patterns.push(make_pattern(
            kind,
            confidence,
            series,
            l,
            r,
            levels,
            profile,
            format!("{kind:?} left={l} head={h} right={r} neckline={neckline:.4}"),
            None,
        ));
    }

    patterns
}

/// Index (relative to `slice`) of the neckline extreme: the minimum for a
/// top pattern's valleys, the maximum for an inverse pattern's peaks.
fn neckline_index(slice: &[f64], top: bool) -> usize {
    let extreme = if top {
        slice.iter().cloned().fold(f64::MAX, f64::min)
    } else {
        slice.iter().cloned().fold(f64::MIN, f64::max)
    };
    slice.iter().position(|&v| (v - extreme).abs() < f64::EPSILON).unwrap_or(0)
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
                volume: 1000.0 - i as f64 * 2.0,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn detects_a_head_and_shoulders_top() {
        let n = 50;
        let mut highs = vec![100.0; n];
        let mut lows = vec![95.0; n];

        highs[10] = 110.0;
        highs[25] = 120.0;
        highs[40] = 110.3;
        for i in 0..n {
            lows[i] = highs[i] - 5.0;
        }
        lows[17] = 100.0;
        lows[32] = 100.5;

        let series = series_from(&highs, &lows);
        let sensitivity = pattern_core::SensitivityLevel::High.expand();
        let (patterns, _warnings) = detect(&series, &sensitivity);
        assert!(patterns.iter().any(|p| p.kind == PatternKind::HeadShoulders));
        for p in &patterns {
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.start_index < p.end_index);
        }
    }

    #[test]
    fn neckline_index_finds_the_lowest_valley_for_a_top() {
        let slice = [3.0, 1.0, 2.0];
        assert_eq!(neckline_index(&slice, true), 1);
    }

    #[test]
    fn neckline_index_finds_the_highest_peak_for_an_inverse() {
        let slice = [3.0, 5.0, 2.0];
        assert_eq!(neckline_index(&slice, false), 1);
    }
}
