use pattern_core::{PatternKind, SensitivityConfig, Series, VolumeTrend};
use pattern_primitives::{aggregate, build_volume_profile, find_turning_points, sensitivity_adjust, WeightedFactor};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_DISTANCE: usize = 5;
const CANONICAL_RATIOS: [f64; 5] = [0.618, 0.786, 1.0, 1.272, 1.618];

/// Plain ABCD harmonic: four alternating points, no X leg (spec §4.7).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let closes = series.closes();
    let volumes = series.volumes();
    let sens = sensitivity.harmonic_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let points = find_turning_points(&closes, MIN_DISTANCE);
    let mut patterns = Vec::new();

    for window in points.windows(4) {
        let (a, b, c, d) = (window[0], window[1], window[2], window[3]);

        let ab = b.value - a.value;
        let cd = d.value - c.value;
        let time_ab = (b.index - a.index) as f64;
        let time_cd = (d.index - c.index) as f64;
        if ab.abs() < f64::EPSILON || time_ab.abs() < f64::EPSILON {
            continue;
        }

        let ratio = (cd / ab).abs();
        if !(0.618..=1.618).contains(&ratio) {
            continue;
        }
        let time_ratio = time_cd / time_ab;
        if !(0.5..=2.0).contains(&time_ratio) {
            continue;
        }

        let ratio_accuracy = CANONICAL_RATIOS
            .iter()
            .map(|&canon| (1.0 - (ratio - canon).abs() / canon).clamp(0.0, 1.0))
            .fold(0.0_f64, f64::max);

        let dist = if time_ratio >= 1.0 { time_ratio - 1.0 } else { 1.0 - time_ratio };
        let max_dist = if time_ratio >= 1.0 { 1.0 } else { 0.5 };
        let time_symmetry = (1.0 - dist / max_dist).clamp(0.0, 1.0);

        let factors = [
            WeightedFactor::new(0.6, ratio_accuracy),
            WeightedFactor::new(0.4, time_symmetry),
        ];
        let confidence = sensitivity_adjust(aggregate(&factors), sens);
        if confidence < accept_threshold {
            continue;
        }

        let levels = key_levels(&[
            ("a", a.value),
            ("b", b.value),
            ("c", c.value),
            ("d", d.value),
            ("cd_ab_ratio", ratio),
            ("time_ratio", time_ratio),
        ]);

        let end = d.index.min(volumes.len().saturating_sub(1));
        let start = a.index.min(end);
        let profile = build_volume_profile(&volumes[start..=end], VolumeTrend::Increasing, None);

        patterns.push(make_pattern(
            PatternKind::Abcd,
            confidence,
            series,
            a.index,
            d.index,
            levels,
            profile,
            format!("ABCD across bars {}-{}", a.index, d.index),
            None,
        ));
    }

    (patterns, Vec::new())
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
                volume: 1000.0 + i as f64,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn runs_without_panicking_on_an_alternating_series() {
        let closes = vec![
            100.0, 100.0, 100.0, 100.0, 100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 140.0, 130.0,
            120.0, 115.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 150.0, 140.0, 130.0, 125.0,
            120.0, 121.0, 120.5, 121.5, 120.2, 121.1,
        ];
        let series = series_from(&closes);
        let sensitivity = pattern_core::SensitivityLevel::High.expand();
        let (patterns, _warnings) = detect(&series, &sensitivity);
        for p in &patterns {
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.start_index < p.end_index);
        }
    }
}
