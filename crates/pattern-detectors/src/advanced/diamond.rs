use pattern_core::{PatternKind, SensitivityConfig, Series, VolumeTrend};
use pattern_primitives::{aggregate, build_volume_profile, length_score, sensitivity_adjust, WeightedFactor};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_LEN: usize = 21;
const MAX_LEN: usize = 81;
const IDEAL_LOW: usize = 24;
const IDEAL_HIGH: usize = 60;
const MIN_EXPANSION_RATIO: f64 = 1.2;
const MAX_CONTRACTION_RATIO: f64 = 0.8;

/// Diamond top/bottom: the window's price range expands through the middle
/// third then contracts through the late third (spec §4.8).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let highs = series.highs();
    let lows = series.lows();
    let volumes = series.volumes();
    let n = series.len();
    let sens = sensitivity.geometric_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let mut patterns = Vec::new();

    for start in 0..n {
        for length in MIN_LEN..=MAX_LEN {
            if start + length > n {
                break;
            }
            let end = start + length - 1;
            let third = length / 3;
            if third == 0 {
                continue;
            }
            let early = start..(start + third);
            let middle = (start + third)..(start + 2 * third);
            let late = (start + 2 * third)..=end;

            let range_of = |r: std::ops::Range<usize>| -> f64 {
                let hi = highs[r.clone()].iter().cloned().fold(f64::MIN, f64::max);
                let lo = lows[r].iter().cloned().fold(f64::MAX, f64::min);
                hi - lo
            };
            let range_of_incl = |r: std::ops::RangeInclusive<usize>| -> f64 {
                let hi = highs[r.clone()].iter().cloned().fold(f64::MIN, f64::max);
                let lo = lows[r].iter().cloned().fold(f64::MAX, f64::min);
                hi - lo
            };

            let range_e = range_of(early.clone());
            let range_m = range_of(middle.clone());
            let range_l = range_of_incl(late.clone());
            if range_e.abs() < f64::EPSILON || range_m.abs() < f64::EPSILON {
                continue;
            }

            if range_m / range_e < MIN_EXPANSION_RATIO || range_l / range_m > MAX_CONTRACTION_RATIO {
                continue;
            }

            let expansion_growth = range_m / range_e - 1.0;
            let expansion_score = (expansion_growth / 0.5).clamp(0.0, 1.0);
            let contraction_drop = 1.0 - range_l / range_m;
            let contraction_score = (contraction_drop / 0.4).clamp(0.0, 1.0);

            let early_len = third as f64;
            let late_len = (end - (start + 2 * third) + 1) as f64;
            let time_symmetry = (1.0 - (early_len - late_len).abs() / length as f64).clamp(0.0, 1.0);

            let vol_early: f64 = volumes[early.clone()].iter().sum::<f64>() / early.len() as f64;
            let vol_late: f64 = volumes[late.clone()].iter().sum::<f64>() / late.clone().count() as f64;
            let volume_score = if vol_early > vol_late { 1.0 } else { 0.4 };

            let len_score = length_score(length, IDEAL_LOW, IDEAL_HIGH);

            let factors = [
                WeightedFactor::new(0.3, expansion_score),
                WeightedFactor::new(0.3, contraction_score),
                WeightedFactor::new(0.2, time_symmetry),
                WeightedFactor::new(0.1, volume_score),
                WeightedFactor::new(0.1, len_score),
            ];
            let confidence = sensitivity_adjust(aggregate(&factors), sens);
            if confidence < accept_threshold {
                continue;
            }

            let mid_index = start + third + (start + 2 * third - (start + third)) / 2;
            let levels = key_levels(&[
                ("early_range", range_e),
                ("middle_range", range_m),
                ("late_range", range_l),
                ("widest_high", highs[mid_index]),
                ("widest_low", lows[mid_index]),
            ]);
            let profile = build_volume_profile(&volumes[start..=end], VolumeTrend::Decreasing, None);

            patterns.push(make_pattern(
                PatternKind::Diamond,
                confidence,
                series,
                start,
                end,
                levels,
                profile,
                format!("Diamond across bars {start}-{end}"),
                None,
            ));
        }
    }

    (patterns, Vec::new())
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
                volume: 1000.0 - i as f64,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn runs_without_panicking_on_a_diamond_shaped_series() {
        let n = 42;
        let mut highs = vec![100.0; n];
        let mut lows = vec![95.0; n];
        for i in 0..n {
            let widen = if i < 14 {
                i as f64 * 0.5
            } else if i < 28 {
                7.0
            } else {
                (7.0 - (i as f64 - 28.0) * 0.6).max(0.5)
            };
            highs[i] = 100.0 + widen;
            lows[i] = 95.0 - widen;
        }
        let series = series_from(&highs, &lows);
        let sensitivity = pattern_core::SensitivityLevel::High.expand();
        let (patterns, _warnings) = detect(&series, &sensitivity);
        for p in &patterns {
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.start_index < p.end_index);
        }
    }
}
