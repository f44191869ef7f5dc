use pattern_core::{pattern_order_key, Configuration, DetectedPattern, EngineError, Series};
use pattern_indicators::{macd, rsi, MacdSnapshot, RsiSnapshot};
use rayon::prelude::*;

use crate::cancellation::CancellationToken;
use crate::recommendations::build_recommendations;
use crate::result::{AnalysisOutcome, AnalysisResult, IndicatorSnapshot, PatternSummary};

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Runs the full detection pipeline over `series` under `config` (spec
/// §4.12). `indicator_values`, if given, feeds the divergence family instead
/// of the internally-computed RSI (spec §6 "optional indicator_values").
/// Cooperative cancellation is checked between families.
pub fn analyze(
    series: Series,
    config: &Configuration,
    indicator_values: Option<&[Option<f64>]>,
    cancellation: &CancellationToken,
) -> Result<AnalysisOutcome, EngineError> {
    let started = std::time::Instant::now();
    config.validate()?;

    if series.len() > config.analysis.max_data_points {
        tracing::debug!(
            from = series.len(),
            to = config.analysis.max_data_points,
            "truncating oversized series"
        );
    }
    let series = series.truncate_to(&config.analysis);
    if series.len() < config.analysis.min_data_points {
        return Err(EngineError::TooFewBars {
            actual: series.len(),
            minimum: config.analysis.min_data_points,
        });
    }

    if cancellation.is_cancelled() {
        tracing::debug!("analysis cancelled before any family ran");
        return Ok(AnalysisOutcome::Cancelled {
            warnings: Vec::new(),
        });
    }

    // step 2: invoke each enabled family (spec §4.12). Families are
    // independent pure functions of (series, sensitivity) with no shared
    // mutable state, so `rayon`'s `par_iter` can run them across a thread
    // pool (spec §5); the deterministic sort below re-establishes a fixed
    // merge order regardless of which family finishes first, so dispatching
    // sequentially instead must yield byte-identical output (asserted by
    // `parallel_dispatch_matches_sequential` below).
    let active: Vec<(&'static str, FamilyFn<'_>)> = families(config, indicator_values)
        .into_iter()
        .filter(|(_, enabled, _)| *enabled)
        .map(|(name, _, run)| (name, run))
        .collect();

    let family_results: Vec<(&'static str, Vec<DetectedPattern>, Vec<String>)> = active
        .into_par_iter()
        .map(|(name, run)| {
            tracing::debug!(family = name, "running detector family");
            let (patterns, family_warnings) = run(&series, config);
            (name, patterns, family_warnings)
        })
        .collect();

    let mut warnings = Vec::new();
    let mut candidates: Vec<DetectedPattern> = Vec::new();
    for (name, mut patterns, family_warnings) in family_results {
        for w in &family_warnings {
            tracing::warn!(family = name, warning = %w, "detector warning");
        }
        candidates.append(&mut patterns);
        warnings.extend(family_warnings);
    }

    if cancellation.is_cancelled() {
        return Ok(AnalysisOutcome::Cancelled { warnings });
    }

    // step 3: sort by confidence descending with the spec's deterministic
    // tie-breaker, so a parallel dispatch and a sequential one merge
    // identically regardless of completion order.
    candidates.sort_by_key(pattern_order_key);

    // step 4: filter.
    let filtered = filter_candidates(candidates, config);

    // step 5: global cap, already confidence-sorted from the filter pass.
    let mut capped = filtered;
    capped.truncate(config.patterns.max_total_patterns);

    // step 6: overlap removal.
    let accepted = if config.patterns.filter_overlapping {
        remove_overlaps(capped, config.patterns.overlap_threshold)
    } else {
        capped
    };

    if cancellation.is_cancelled() {
        return Ok(AnalysisOutcome::Cancelled { warnings });
    }

    // step 7: indicator snapshot, summary, recommendations.
    let closes = series.closes();
    let rsi_values = rsi(&closes, RSI_PERIOD);
    let macd_result = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let indicators = IndicatorSnapshot {
        rsi: RsiSnapshot::from_series(&rsi_values).into(),
        macd: MacdSnapshot::from_result(&macd_result).into(),
    };

    let pattern_summary = PatternSummary::from_patterns(&accepted);
    let recommendations = build_recommendations(&pattern_summary, &indicators, &accepted);

    let result = AnalysisResult {
        symbol: series.symbol.clone(),
        timeframe: series.timeframe.clone(),
        data_points: series.len(),
        patterns: accepted,
        pattern_summary,
        indicators,
        recommendations,
        warnings,
        analysis_time_seconds: started.elapsed().as_secs_f64(),
    };

    Ok(AnalysisOutcome::Completed(result))
}

type FamilyFn<'a> =
    Box<dyn Fn(&Series, &Configuration) -> (Vec<DetectedPattern>, Vec<String>) + Send + Sync + 'a>;

/// One entry per family: name, whether it's enabled, and the closure that
/// runs it. Boxed rather than bare `fn` pointers so the divergence entry can
/// capture the caller-supplied `indicator_values` (spec §6).
fn families<'a>(
    config: &Configuration,
    indicator_values: Option<&'a [Option<f64>]>,
) -> [(&'static str, bool, FamilyFn<'a>); 5] {
    [
        (
            "geometric",
            config.patterns.enabled_geometric,
            Box::new(|series, config| pattern_detectors::geometric::detect_all(series, &config.sensitivity)),
        ),
        (
            "reversal",
            config.patterns.enabled_reversal,
            Box::new(|series, config| pattern_detectors::reversal::detect_all(series, &config.sensitivity)),
        ),
        (
            "harmonic",
            config.patterns.enabled_harmonic,
            Box::new(|series, config| pattern_detectors::advanced::detect_all(series, &config.sensitivity)),
        ),
        (
            "candlestick",
            config.patterns.enabled_candlestick,
            Box::new(|series, config| pattern_detectors::candlestick::detect_all(series, &config.sensitivity)),
        ),
        (
            "divergence",
            config.patterns.enabled_divergence,
            Box::new(move |series, config| match indicator_values {
                Some(values) => (
                    pattern_detectors::divergence::detect_against(series, values, "external", &config.sensitivity),
                    Vec::new(),
                ),
                None => pattern_detectors::divergence::detect(series, &config.sensitivity),
            }),
        ),
    ]
}

/// Spec §4.12 step 4: kind enable, category floor, duration bounds, volume
/// confirmation, then per-kind cap. Input is already confidence-sorted, so
/// each per-kind group's first `max_patterns_per_type` survivors are its
/// highest-confidence ones.
fn filter_candidates(candidates: Vec<DetectedPattern>, config: &Configuration) -> Vec<DetectedPattern> {
    use std::collections::BTreeMap;

    let mut per_kind_count: BTreeMap<pattern_core::PatternKind, usize> = BTreeMap::new();
    let mut out = Vec::new();

    for p in candidates {
        if !config.patterns.is_kind_enabled(p.kind) {
            continue;
        }
        if p.confidence < config.sensitivity.min_confidence_for(p.category) {
            continue;
        }
        let duration = p.duration_bars();
        if duration < config.sensitivity.min_pattern_duration
            || duration > config.sensitivity.max_pattern_duration
        {
            continue;
        }
        if config.sensitivity.require_volume_confirmation && !p.volume_profile.confirms_pattern {
            continue;
        }
        let count = per_kind_count.entry(p.kind).or_insert(0);
        if *count >= config.patterns.max_patterns_per_type {
            continue;
        }
        *count += 1;
        out.push(p);
    }

    out
}

/// Spec §4.12 step 6 / §8 invariant 7: iterate confidence-descending,
/// accepting a candidate iff its overlap with every already-accepted
/// pattern, divided by its own length, stays below `overlap_threshold`.
fn remove_overlaps(candidates: Vec<DetectedPattern>, overlap_threshold: f64) -> Vec<DetectedPattern> {
    let mut accepted: Vec<DetectedPattern> = Vec::new();
    for candidate in candidates {
        let length = candidate.duration_bars() as f64;
        let overlaps_too_much = accepted.iter().any(|existing| {
            let overlap = candidate.overlap_bars(existing) as f64;
            length > 0.0 && (overlap / length) >= overlap_threshold
        });
        if !overlaps_too_much {
            accepted.push(candidate);
        }
    }
    accepted
}

/// Spec §8 scenario S6: a Triangle (confidence 0.8, bars [10,40]) and a Wedge
/// (confidence 0.6, bars [20,45]) overlap 21 bars; the wedge's own length is
/// 26, giving a ratio of 21/26 ≈ 0.81 ≥ the default 0.5 threshold, so only
/// the higher-confidence Triangle survives.
#[cfg(test)]
mod overlap_scenario {
    use super::*;
    use chrono::Utc;
    use pattern_core::{Category, PatternKind, VolumeProfile, VolumeTrend};
    use std::collections::BTreeMap;

    fn candidate(kind: PatternKind, start: usize, end: usize, confidence: f64) -> DetectedPattern {
        DetectedPattern {
            kind,
            category: kind.category(),
            confidence,
            start_time: Utc::now(),
            end_time: Utc::now(),
            start_index: start,
            end_index: end,
            key_levels: BTreeMap::new(),
            volume_profile: VolumeProfile {
                average_volume: 1000.0,
                trend: VolumeTrend::Unknown,
                confirms_pattern: false,
                breakout_volume: None,
            },
            description: String::new(),
            fibonacci_levels: None,
        }
    }

    #[test]
    fn higher_confidence_pattern_survives_overlap_removal() {
        let triangle = candidate(PatternKind::SymmetricalTriangle, 10, 40, 0.8);
        let wedge = candidate(PatternKind::RisingWedgeReversal, 20, 45, 0.6);
        assert_eq!(triangle.overlap_bars(&wedge), 21);

        let mut candidates = vec![triangle.clone(), wedge.clone()];
        candidates.sort_by_key(pattern_order_key);
        let accepted = remove_overlaps(candidates, 0.5);

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].kind, PatternKind::SymmetricalTriangle);
    }

    #[test]
    fn non_overlapping_patterns_both_survive() {
        let a = candidate(PatternKind::SymmetricalTriangle, 10, 40, 0.8);
        let b = candidate(PatternKind::RisingWedgeReversal, 50, 70, 0.6);
        let mut candidates = vec![a, b];
        candidates.sort_by_key(pattern_order_key);
        let accepted = remove_overlaps(candidates, 0.5);
        assert_eq!(accepted.len(), 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pattern_core::{Bar, SensitivityLevel};

    fn flat_series(n: usize) -> Series {
        let t0 = Utc::now();
        let bars: Vec<Bar> = (0..n)
            .map(|i| Bar {
                timestamp: t0 + Duration::hours(i as i64),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0,
                volume: 1000.0,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn runs_without_panicking_on_a_flat_series() {
        let config = Configuration::from_level(SensitivityLevel::Medium);
        let outcome = analyze(flat_series(60), &config, None, &CancellationToken::new()).unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Completed(_)));
    }

    #[test]
    fn rejects_series_shorter_than_min_data_points() {
        let config = Configuration::from_level(SensitivityLevel::Medium);
        let result = analyze(flat_series(5), &config, None, &CancellationToken::new());
        assert!(result.is_err());
    }

    #[test]
    fn pre_cancelled_token_yields_cancelled_outcome() {
        let config = Configuration::from_level(SensitivityLevel::Medium);
        let token = CancellationToken::new();
        token.cancel();
        let outcome = analyze(flat_series(60), &config, None, &token).unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Cancelled { .. }));
    }

    /// Trending series with plenty of turning points, so several families
    /// actually produce candidates for the merge below to reorder.
    fn trending_series(n: usize) -> Series {
        let t0 = Utc::now();
        let bars: Vec<Bar> = (0..n)
            .map(|i| {
                let phase = (i as f64 * 0.6).sin() * 3.0;
                let level = 100.0 + i as f64 * 0.4 + phase;
                Bar {
                    timestamp: t0 + Duration::hours(i as i64),
                    open: level,
                    high: level + 1.5,
                    low: level - 1.5,
                    close: level + phase.signum() * 0.5,
                    volume: 1000.0 - (i as f64 * 2.0),
                }
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    /// Spec §5: the `rayon` fan-out across families must not change the
    /// result relative to running every family on a single thread — the
    /// deterministic sort (spec §8 invariant 11) is what the test actually
    /// exercises, since real family completion order is scheduler-dependent.
    #[test]
    fn parallel_dispatch_matches_sequential() {
        let config = Configuration::from_level(SensitivityLevel::High);
        let series = trending_series(120);

        let run = || {
            let outcome =
                analyze(series.clone(), &config, None, &CancellationToken::new()).unwrap();
            match outcome {
                AnalysisOutcome::Completed(result) => result.patterns,
                AnalysisOutcome::Cancelled { .. } => panic!("unexpected cancellation"),
            }
        };

        let many_threads = rayon::ThreadPoolBuilder::new()
            .num_threads(8)
            .build()
            .unwrap()
            .install(run);
        let one_thread = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap()
            .install(run);

        assert_eq!(many_threads.len(), one_thread.len());
        for (a, b) in many_threads.iter().zip(one_thread.iter()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.start_index, b.start_index);
            assert_eq!(a.end_index, b.end_index);
            assert_eq!(a.confidence, b.confidence);
        }
    }
}
