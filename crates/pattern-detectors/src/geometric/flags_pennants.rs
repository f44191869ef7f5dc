use pattern_core::{PatternKind, SensitivityConfig, Series, Trendline, VolumeTrend};
use pattern_primitives::{
    aggregate, build_volume_profile, fit_trendline, sensitivity_adjust, WeightedFactor,
};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_FLAGPOLE_LEN: usize = 3;
const MAX_FLAGPOLE_LEN: usize = 20;
const MIN_CONSOLIDATION_LEN: usize = 5;
const MAX_CONSOLIDATION_LEN: usize = 30;
const MIN_FLAGPOLE_R_SQUARED: f64 = 0.6;

struct Flagpole {
    start: usize,
    end: usize,
    price_change: f64,
    r_squared: f64,
    bullish: bool,
}

/// Flags & pennants: a short directional flagpole followed by a brief
/// consolidation (spec §4.5).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();
    let volumes = series.volumes();
    let n = series.len();
    let sens = sensitivity.geometric_patterns;
    let min_change = 0.03 - 0.015 * sens;
    let accept_threshold = 0.3 + sens * 0.3;

    let mut patterns = Vec::new();
    let warnings = Vec::new();

    for start in 0..n {
        for length in MIN_FLAGPOLE_LEN..=MAX_FLAGPOLE_LEN {
            if start + length > n {
                break;
            }
            let end = start + length - 1;
            let first = closes[start];
            if first.abs() < f64::EPSILON {
                continue;
            }
            let price_change = (closes[end] - first) / first;
            if price_change.abs() < min_change {
                continue;
            }

            let points: Vec<(usize, f64)> = (start..=end).map(|i| (i, closes[i])).collect();
            let Some(trend_line) = fit_trendline(&points) else {
                continue;
            };
            if trend_line.r_squared < MIN_FLAGPOLE_R_SQUARED {
                continue;
            }

            let flagpole = Flagpole {
                start,
                end,
                price_change,
                r_squared: trend_line.r_squared,
                bullish: price_change > 0.0,
            };

            for consol_len in MIN_CONSOLIDATION_LEN..=MAX_CONSOLIDATION_LEN.min(flagpole.end - flagpole.start + 1) {
                let consol_start = flagpole.end + 1;
                if consol_start + consol_len > n {
                    break;
                }
                let consol_end = consol_start + consol_len - 1;

                let upper_points: Vec<(usize, f64)> =
                    (consol_start..=consol_end).map(|i| (i, highs[i])).collect();
                let lower_points: Vec<(usize, f64)> =
                    (consol_start..=consol_end).map(|i| (i, lows[i])).collect();
                let mid_points: Vec<(usize, f64)> =
                    (consol_start..=consol_end).map(|i| (i, closes[i])).collect();

                let (Some(upper), Some(lower), Some(mid)) = (
                    fit_trendline(&upper_points),
                    fit_trendline(&lower_points),
                    fit_trendline(&mid_points),
                ) else {
                    continue;
                };

                if !retraces_slightly(&flagpole, &mid) {
                    continue;
                }

                let Some(kind) = classify(&flagpole, &upper, &lower) else {
                    continue;
                };

                let flagpole_strength = ((flagpole.price_change.abs() - min_change) / min_change)
                    .clamp(0.0, 1.0)
                    * 0.5
                    + flagpole.r_squared * 0.5;

                let slope_appropriateness = slope_score(&flagpole, &mid);

                let flagpole_len = (flagpole.end - flagpole.start + 1) as f64;
                let ratio = consol_len as f64 / flagpole_len;
                let length_ratio_score = 1.0 - ((ratio - 0.5).abs() / 0.5).clamp(0.0, 1.0);

                let volume_slice = &volumes[consol_start..=consol_end];
                let profile = build_volume_profile(volume_slice, VolumeTrend::Decreasing, None);
                let volume_score = if profile.confirms_pattern { 1.0 } else { 0.3 };

                let factors = [
                    WeightedFactor::new(0.3, flagpole_strength),
                    WeightedFactor::new(0.3, slope_appropriateness),
                    WeightedFactor::new(0.2, length_ratio_score),
                    WeightedFactor::new(0.2, volume_score),
                ];
                let confidence = sensitivity_adjust(aggregate(&factors), sens);
                if confidence < accept_threshold {
                    continue;
                }

                let levels = key_levels(&[
                    ("flagpole_start", flagpole.start as f64),
                    ("flagpole_change_pct", flagpole.price_change * 100.0),
                    ("consolidation_upper_slope", upper.slope),
                    ("consolidation_lower_slope", lower.slope),
                ]);

                patterns.push(make_pattern(
                    kind,
                    confidence,
                    series,
                    flagpole.start,
                    consol_end,
                    levels,
                    profile,
                    format!("{kind:?} flagpole {}-{} consolidation {}-{}", flagpole.start, flagpole.end, consol_start, consol_end),
                    None,
                ));
            }
        }
    }

    (patterns, warnings)
}

fn retraces_slightly(flagpole: &Flagpole, consolidation_mid: &Trendline) -> bool {
    let flagpole_slope = flagpole.price_change / (flagpole.end - flagpole.start + 1) as f64;
    if flagpole.bullish {
        // sideways or mildly declining, never continuing the rally at full pace.
        consolidation_mid.slope < flagpole_slope.abs() * 0.6
    } else {
        consolidation_mid.slope > -flagpole_slope.abs() * 0.6
    }
}

fn slope_score(flagpole: &Flagpole, consolidation_mid: &Trendline) -> f64 {
    let flagpole_slope = flagpole.price_change / (flagpole.end - flagpole.start + 1) as f64;
    if flagpole.bullish {
        (1.0 - (consolidation_mid.slope / flagpole_slope.abs()).clamp(-1.0, 1.0)).clamp(0.0, 2.0) / 2.0
    } else {
        (1.0 + (consolidation_mid.slope / flagpole_slope.abs()).clamp(-1.0, 1.0)).clamp(0.0, 2.0) / 2.0
    }
}

fn classify(flagpole: &Flagpole, upper: &Trendline, lower: &Trendline) -> Option<PatternKind> {
    let slope_scale = upper.slope.abs().max(lower.slope.abs()).max(1e-9);
    let slope_similarity = 1.0 - ((upper.slope - lower.slope).abs() / slope_scale).min(1.0);
    let converging = upper.slope < 0.0 && lower.slope > 0.0;
    let convergence_factor = if converging {
        ((upper.slope.abs() + lower.slope.abs()) / slope_scale).min(1.0)
    } else {
        0.0
    };

    if converging && convergence_factor >= 0.5 {
        Some(if flagpole.bullish {
            PatternKind::BullPennant
        } else {
            PatternKind::BearPennant
        })
    } else if slope_similarity >= 0.7 {
        Some(if flagpole.bullish {
            PatternKind::BullFlag
        } else {
            PatternKind::BearFlag
        })
    } else {
        None
    }
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
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 1000.0 - i as f64 * 2.0,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn classify_requires_parallel_or_converging_slopes() {
        let fp = Flagpole {
            start: 0,
            end: 10,
            price_change: 0.1,
            r_squared: 0.9,
            bullish: true,
        };
        let upper = Trendline { start_index: 11, end_index: 16, slope: 0.01, intercept: 100.0, r_squared: 0.8 };
        let lower = Trendline { start_index: 11, end_index: 16, slope: 0.01, intercept: 95.0, r_squared: 0.8 };
        assert_eq!(classify(&fp, &upper, &lower), Some(PatternKind::BullFlag));
    }

    #[test]
    fn runs_without_panicking_on_a_flag_like_series() {
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64 * 1.2).collect();
        closes.extend((0..10).map(|i| {
            let last = *closes.last().unwrap();
            last - (i as f64 * 0.05)
        }));
        let series = series_from(&closes);
        let sensitivity = pattern_core::SensitivityLevel::High.expand();
        let (patterns, _warnings) = detect(&series, &sensitivity);
        for p in &patterns {
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.start_index < p.end_index);
        }
    }
}
