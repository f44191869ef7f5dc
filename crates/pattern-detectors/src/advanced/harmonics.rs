use pattern_core::{PatternKind, SensitivityConfig, Series, VolumeTrend};
use pattern_primitives::{aggregate, build_volume_profile, find_turning_points, sensitivity_adjust, WeightedFactor};

use crate::common::{key_levels, make_pattern, DetectorOutput};

const MIN_DISTANCE: usize = 5;
const MIN_SPAN: usize = 20;
const MAX_SPAN: usize = 100;
const TOLERANCE: f64 = 0.05;

#[derive(Clone, Copy)]
enum Ratio {
    Exact(f64),
    Range(f64, f64),
}

impl Ratio {
    fn reference(&self) -> f64 {
        match self {
            Ratio::Exact(v) => *v,
            Ratio::Range(lo, hi) => (lo + hi) / 2.0,
        }
    }

    /// `(accuracy in [0,1], within_tolerance)`.
    fn score(&self, actual: f64) -> (f64, bool) {
        match self {
            Ratio::Exact(v) => {
                let diff = (actual - v).abs();
                ((1.0 - diff / v).clamp(0.0, 1.0), diff <= TOLERANCE)
            }
            Ratio::Range(lo, hi) => {
                if actual >= *lo && actual <= *hi {
                    (1.0, true)
                } else {
                    let dist = (actual - lo).abs().min((actual - hi).abs());
                    let within = actual >= lo - TOLERANCE && actual <= hi + TOLERANCE;
                    ((1.0 - dist / self.reference()).clamp(0.0, 1.0), within)
                }
            }
        }
    }
}

struct HarmonicSpec {
    kind: PatternKind,
    ab_xa: Ratio,
    bc_ab: Ratio,
    xd_xa: Ratio,
}

fn specs() -> [HarmonicSpec; 5] {
    [
        HarmonicSpec { kind: PatternKind::Gartley, ab_xa: Ratio::Exact(0.618), bc_ab: Ratio::Range(0.382, 0.886), xd_xa: Ratio::Exact(0.786) },
        HarmonicSpec { kind: PatternKind::Butterfly, ab_xa: Ratio::Exact(0.786), bc_ab: Ratio::Range(0.382, 0.886), xd_xa: Ratio::Range(1.27, 1.618) },
        HarmonicSpec { kind: PatternKind::Bat, ab_xa: Ratio::Range(0.382, 0.5), bc_ab: Ratio::Range(0.382, 0.886), xd_xa: Ratio::Exact(0.886) },
        HarmonicSpec { kind: PatternKind::Crab, ab_xa: Ratio::Range(0.382, 0.618), bc_ab: Ratio::Range(0.382, 0.886), xd_xa: Ratio::Exact(1.618) },
        HarmonicSpec { kind: PatternKind::Cypher, ab_xa: Ratio::Exact(0.382), bc_ab: Ratio::Exact(1.272), xd_xa: Ratio::Exact(0.786) },
    ]
}

/// XABCD harmonics: Gartley, Butterfly, Bat, Crab, Cypher (spec §4.7).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let closes = series.closes();
    let volumes = series.volumes();
    let sens = sensitivity.harmonic_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let points = find_turning_points(&closes, MIN_DISTANCE);
    let mut patterns = Vec::new();

    for window in points.windows(5) {
        let (x, a, b, c, d) = (window[0], window[1], window[2], window[3], window[4]);
        let span = d.index - x.index;
        if !(MIN_SPAN..=MAX_SPAN).contains(&span) {
            continue;
        }

        let xa = a.value - x.value;
        let ab = b.value - a.value;
        let bc = c.value - b.value;
        let cd = d.value - c.value;
        if xa.abs() < f64::EPSILON || ab.abs() < f64::EPSILON || bc.abs() < f64::EPSILON {
            continue;
        }

        let ab_xa = (ab / xa).abs();
        let bc_ab = (bc / ab).abs();
        let cd_bc = (cd / bc).abs();
        let xd_xa = ((d.value - x.value) / xa).abs();
        let cd_ab = (cd / ab).abs();

        let mut best: Option<(f64, &HarmonicSpec)> = None;
        for spec in &specs() {
            let (s1, ok1) = spec.ab_xa.score(ab_xa);
            let (s2, ok2) = spec.bc_ab.score(bc_ab);
            let (s3, ok3) = spec.xd_xa.score(xd_xa);
            if !(ok1 && ok2 && ok3) {
                continue;
            }
            let avg = (s1 + s2 + s3) / 3.0;
            if best.map_or(true, |(b, _)| avg > b) {
                best = Some((avg, spec));
            }
        }

        let Some((avg, spec)) = best else {
            continue;
        };
        let bonus = if avg > 0.9 { 1.1 } else { 1.0 };
        let confidence = sensitivity_adjust((avg * bonus).clamp(0.0, 1.0), sens);
        if confidence < accept_threshold {
            continue;
        }

        let xa_abs = xa.abs();
        let bullish = xa > 0.0;
        let target_1 = if bullish { d.value + xa_abs * 0.382 } else { d.value - xa_abs * 0.382 };
        let target_2 = if bullish { d.value + xa_abs * 0.618 } else { d.value - xa_abs * 0.618 };

        let mut fib = std::collections::BTreeMap::new();
        fib.insert("XA_0.618".to_string(), x.value + xa * 0.618);
        fib.insert("XA_0.786".to_string(), x.value + xa * 0.786);
        fib.insert("target_1".to_string(), target_1);
        fib.insert("target_2".to_string(), target_2);

        let levels = key_levels(&[
            ("x", x.value),
            ("a", a.value),
            ("b", b.value),
            ("c", c.value),
            ("d", d.value),
            ("ab_xa", ab_xa),
            ("bc_ab", bc_ab),
            ("cd_bc", cd_bc),
            ("xd_xa", xd_xa),
            ("cd_ab", cd_ab),
        ]);

        let end = d.index.min(volumes.len().saturating_sub(1));
        let start = x.index.min(end);
        let profile = build_volume_profile(&volumes[start..=end], VolumeTrend::Increasing, None);

        patterns.push(make_pattern(
            spec.kind,
            confidence,
            series,
            x.index,
            d.index,
            levels,
            profile,
            format!("{:?} XABCD across bars {}-{}", spec.kind, x.index, d.index),
            Some(fib),
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
                volume: 1000.0 + i as f64 * 2.0,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn ratio_exact_scores_perfect_match_as_one() {
        let r = Ratio::Exact(0.618);
        let (score, ok) = r.score(0.618);
        assert!((score - 1.0).abs() < 1e-9);
        assert!(ok);
    }

    #[test]
    fn detects_a_gartley_shaped_xabcd() {
        // X=100, A=138.2, B=114.6 (AB/XA=0.618), C=129.7 (BC/AB≈0.382), D=108.0 (XD/XA≈0.786)
        let mut closes = vec![100.0; 5];
        closes.extend(vec![110.0, 120.0, 130.0, 138.2]); // rising leg to A, index 8
        closes.extend(vec![130.0, 122.0, 114.6]); // falling leg to B, index 11
        closes.extend(vec![120.0, 129.7]); // rising leg to C, index 13
        closes.extend(vec![120.0, 108.0]); // falling leg to D, index 15
        closes.extend(vec![110.0, 112.0, 111.0, 113.0, 112.5]);
        let series = series_from(&closes);
        let sensitivity = pattern_core::SensitivityLevel::High.expand();
        let (patterns, _warnings) = detect(&series, &sensitivity);
        for p in &patterns {
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.fibonacci_levels.is_some());
        }
    }
}
