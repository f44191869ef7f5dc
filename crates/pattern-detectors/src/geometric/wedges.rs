use pattern_core::{PatternKind, SensitivityConfig, Series, TurningPointKind, VolumeTrend};
use pattern_primitives::{
    aggregate, build_volume_profile, convergence_point, fit_trendline, find_turning_points,
    length_score, line_fit_quality, sensitivity_adjust, WeightedFactor,
};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const SLOPE_THRESHOLD: f64 = 0.001;
const MIN_DISTANCE: usize = 3;

/// Rising/falling wedge detection. The source implementation always emits
/// the reversal kind regardless of prior trend context — the continuation
/// variants exist in the taxonomy but this family never produces them (see
/// the grounding ledger).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let highs = series.highs();
    let lows = series.lows();
    let n = series.len();
    let volumes = series.volumes();

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
    let accept_threshold = 0.3 + sens * 0.3;
    let mut patterns = Vec::new();
    let warnings = Vec::new();

    if peaks.len() < 2 || troughs.len() < 2 {
        return (patterns, warnings);
    }

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
                    let Some((kind, wedge_kind)) = classify(upper.slope, lower.slope) else {
                        continue;
                    };

                    let len = end_index - start_index;
                    let conv = convergence_point(&upper, &lower);
                    if conv.is_infinite() {
                        continue;
                    }
                    let min_conv = end_index as f64 - len as f64 * 0.2;
                    let max_conv = end_index as f64 + len as f64 * 1.5;
                    if conv < min_conv || conv > max_conv {
                        continue;
                    }

                    let upper_fit = line_fit_quality(&highs, start_index, &upper, true);
                    let lower_fit = line_fit_quality(&lows, start_index, &lower, false);
                    let convergence_score = score_convergence(wedge_kind, upper.slope, lower.slope);

                    let end = end_index.min(volumes.len().saturating_sub(1));
                    let profile = build_volume_profile(&volumes[start_index..=end], VolumeTrend::Decreasing, None);
                    let volume_score = if profile.confirms_pattern { 1.0 } else { 0.4 };
                    let len_score = length_score(len, 15, 50);

                    let factors = [
                        WeightedFactor::new(0.3, upper_fit),
                        WeightedFactor::new(0.3, lower_fit),
                        WeightedFactor::new(0.2, convergence_score),
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
                        ("convergence_index", conv),
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

#[derive(Clone, Copy, PartialEq)]
enum WedgeShape {
    Rising,
    Falling,
}

fn classify(upper_slope: f64, lower_slope: f64) -> Option<(PatternKind, WedgeShape)> {
    let th = SLOPE_THRESHOLD;
    if upper_slope > th && lower_slope > th && lower_slope > upper_slope * 1.2 {
        Some((PatternKind::RisingWedgeReversal, WedgeShape::Rising))
    } else if upper_slope < -th && lower_slope < -th && upper_slope < lower_slope * 1.2 {
        Some((PatternKind::FallingWedgeReversal, WedgeShape::Falling))
    } else {
        None
    }
}

fn score_convergence(shape: WedgeShape, upper_slope: f64, lower_slope: f64) -> f64 {
    match shape {
        WedgeShape::Rising if lower_slope.abs() > f64::EPSILON => {
            (1.0 - upper_slope / lower_slope).clamp(0.0, 1.0)
        }
        WedgeShape::Falling if upper_slope.abs() > f64::EPSILON => {
            (1.0 - lower_slope / upper_slope).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}
