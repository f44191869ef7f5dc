use pattern_core::{PatternKind, SensitivityConfig, Series, TurningPointKind, VolumeTrend};
use pattern_primitives::{
    aggregate, build_volume_profile, fit_trendline, find_turning_points, length_score,
    line_fit_quality, sensitivity_adjust, touch_count, WeightedFactor,
};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const SLOPE_THRESHOLD: f64 = 0.001;
const MIN_DISTANCE: usize = 3;
const TOUCH_TOLERANCE: f64 = 0.02;
const MIN_DIVERGENCE_RATIO: f64 = 0.3;
const MIN_RANGE_GROWTH: f64 = 1.3;

/// Broadening formation: highs rising, lows falling, the mirror image of the
/// converging triangle family (spec §4.8).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let highs = series.highs();
    let lows = series.lows();
    let volumes = series.volumes();
    let n = series.len();

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

    let sens = sensitivity.geometric_patterns;
    let accept_threshold = 0.3 + sens * 0.4;
    let mut patterns = Vec::new();

    for i in 0..peaks.len() {
        for j in (i + 1)..peaks.len() {
            let (p1, p2) = (peaks[i], peaks[j]);
            let between: Vec<usize> = troughs.iter().copied().filter(|&t| t > p1 && t < p2).collect();

            for k in 0..between.len() {
                for l in (k + 1)..between.len() {
                    let (t1, t2) = (between[k], between[l]);
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
                    if !(upper.slope > SLOPE_THRESHOLD && lower.slope < -SLOPE_THRESHOLD) {
                        continue;
                    }

                    let start_range = upper.value_at(start_index) - lower.value_at(start_index);
                    let end_range = upper.value_at(end_index) - lower.value_at(end_index);
                    if start_range <= 0.0 || end_range <= start_range {
                        continue;
                    }
                    let divergence_ratio = (end_range - start_range) / start_range;
                    if divergence_ratio < MIN_DIVERGENCE_RATIO && end_range < MIN_RANGE_GROWTH * start_range {
                        continue;
                    }

                    let upper_fit = line_fit_quality(&highs, start_index, &upper, true);
                    let lower_fit = line_fit_quality(&lows, start_index, &lower, false);
                    let len = end_index - start_index + 1;
                    let touches = touch_count(&highs, start_index, end_index, &upper, TOUCH_TOLERANCE)
                        + touch_count(&lows, start_index, end_index, &lower, TOUCH_TOLERANCE);
                    let touch_score = (touches as f64 / (2.0 * len as f64)).min(1.0);

                    let end = end_index.min(volumes.len().saturating_sub(1));
                    let profile = build_volume_profile(&volumes[start_index..=end], VolumeTrend::Increasing, None);
                    let volume_score = if profile.confirms_pattern { 1.0 } else { 0.4 };
                    let len_score = length_score(len, 15, 50);

                    let factors = [
                        WeightedFactor::new(0.3, upper_fit),
                        WeightedFactor::new(0.3, lower_fit),
                        WeightedFactor::new(0.2, touch_score),
                        WeightedFactor::new(0.1, volume_score),
                        WeightedFactor::new(0.1, len_score),
                    ];
                    let confidence = sensitivity_adjust(aggregate(&factors), sens);
                    if confidence < accept_threshold {
                        continue;
                    }

                    let levels = key_levels(&[
                        ("upper_slope", upper.slope),
                        ("lower_slope", lower.slope),
                        ("divergence_ratio", divergence_ratio),
                        ("start_range", start_range),
                        ("end_range", end_range),
                    ]);

                    patterns.push(make_pattern(
                        PatternKind::ExpandingTriangle,
                        confidence,
                        series,
                        start_index,
                        end_index,
                        levels,
                        profile,
                        format!("ExpandingTriangle across bars {start_index}-{end_index}"),
                        None,
                    ));
                }
            }
        }
    }

    (patterns, Vec::new())
}
