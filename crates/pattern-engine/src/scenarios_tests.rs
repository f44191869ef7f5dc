//! End-to-end exercises of the full `analyze()` pipeline against the spec's
//! §8 "Concrete scenarios" (S1-S7). Detector-internal shape/ratio assertions
//! already live next to each detector (triangles, head-and-shoulders,
//! double/triple, harmonics, divergence); these tests instead exercise the
//! orchestrator around them — filtering, caps, overlap removal, and
//! cancellation — and sanity-check that recognizable synthetic series
//! produce a sane result out of the whole stack.

use chrono::{Duration, Utc};
use pattern_core::{Bar, Configuration, SensitivityLevel, Series};

use crate::cancellation::CancellationToken;
use crate::orchestrator::analyze;
use crate::result::AnalysisOutcome;

fn bar(t0: chrono::DateTime<Utc>, i: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: t0 + Duration::hours(i),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// S1: highs flat around 110, lows rising from 100 to 108, volume falling
/// from 1000 to 600 — the textbook ascending triangle.
fn ascending_triangle_series() -> Series {
    let t0 = Utc::now();
    let n = 30;
    let bars: Vec<Bar> = (0..n)
        .map(|i| {
            let wobble = ((i % 4) as f64 - 1.5) * 0.4;
            let high = 110.0 + wobble;
            let low = 100.0 + (i as f64 / (n - 1) as f64) * 8.0;
            let close = (high + low) / 2.0;
            let volume = 1000.0 - (i as f64 / (n - 1) as f64) * 400.0;
            bar(t0, i as i64, close, high, low, close, volume)
        })
        .collect();
    Series::new("BTCUSD", "1d", bars, 1).unwrap()
}

#[test]
fn s1_ascending_triangle_survives_the_full_pipeline() {
    let config = Configuration::from_level(SensitivityLevel::High);
    let outcome = analyze(
        ascending_triangle_series(),
        &config,
        None,
        &CancellationToken::new(),
    )
    .unwrap();

    let AnalysisOutcome::Completed(result) = outcome else {
        panic!("expected a completed analysis");
    };
    assert!(
        result
            .patterns
            .iter()
            .any(|p| p.kind == pattern_core::PatternKind::AscendingTriangle),
        "expected at least one ascending triangle in {:?}",
        result.patterns.iter().map(|p| p.kind).collect::<Vec<_>>()
    );
    for p in &result.patterns {
        assert!((0.0..=1.0).contains(&p.confidence));
        assert_eq!(p.category, p.kind.category());
        assert!(p.start_index <= p.end_index);
        assert!(p.end_index < result.data_points);
    }
}

/// S7: a 2000-bar series, cancelled before the analysis starts, must report
/// `Cancelled` rather than any partial pattern list.
#[test]
fn s7_cancellation_yields_no_partial_pattern_list() {
    let t0 = Utc::now();
    let bars: Vec<Bar> = (0..2000)
        .map(|i| {
            let level = 100.0 + (i as f64 * 0.37).sin() * 5.0 + i as f64 * 0.01;
            bar(t0, i as i64, level, level + 1.0, level - 1.0, level + 0.2, 1000.0)
        })
        .collect();
    let series = Series::new("BTCUSD", "1h", bars, 1).unwrap();
    let config = Configuration::from_level(SensitivityLevel::Medium);

    let token = CancellationToken::new();
    token.cancel();
    let outcome = analyze(series, &config, None, &token).unwrap();

    match outcome {
        AnalysisOutcome::Cancelled { .. } => {}
        AnalysisOutcome::Completed(_) => panic!("expected a cancelled outcome"),
    }
}

/// Spec §6: `AnalysisResult` round-trips through `serde_json` untouched —
/// the ambient serialization stack (spec SPEC_FULL.md §3) is how a caller
/// persists or transmits a result; the core itself performs no I/O.
#[test]
fn analysis_result_round_trips_through_json() {
    let config = Configuration::from_level(SensitivityLevel::Medium);
    let outcome = analyze(
        ascending_triangle_series(),
        &config,
        None,
        &CancellationToken::new(),
    )
    .unwrap();
    let AnalysisOutcome::Completed(result) = outcome else {
        panic!("expected a completed analysis");
    };

    let json = serde_json::to_string(&result).expect("serialize AnalysisResult");
    let restored: crate::result::AnalysisResult =
        serde_json::from_str(&json).expect("deserialize AnalysisResult");
    assert_eq!(restored.symbol, result.symbol);
    assert_eq!(restored.patterns.len(), result.patterns.len());
}

/// Spec §4.12 step 4c/5/6: duration bounds, per-type caps and overlap
/// removal are all enforced together — every survivor of a full run must
/// satisfy every testable property from spec §8 at once.
#[test]
fn full_pipeline_output_satisfies_the_core_invariants() {
    let config = Configuration::from_level(SensitivityLevel::VeryHigh);
    let outcome = analyze(
        ascending_triangle_series(),
        &config,
        None,
        &CancellationToken::new(),
    )
    .unwrap();
    let AnalysisOutcome::Completed(result) = outcome else {
        panic!("expected a completed analysis");
    };

    let mut per_kind: std::collections::BTreeMap<pattern_core::PatternKind, usize> =
        std::collections::BTreeMap::new();
    for p in &result.patterns {
        *per_kind.entry(p.kind).or_insert(0) += 1;
        assert!(
            p.duration_bars() >= config.sensitivity.min_pattern_duration
                && p.duration_bars() <= config.sensitivity.max_pattern_duration
        );
        assert!(p.confidence >= config.sensitivity.min_confidence_for(p.category));
    }
    for (_, count) in per_kind {
        assert!(count <= config.patterns.max_patterns_per_type);
    }
    assert!(result.patterns.len() <= config.patterns.max_total_patterns);

    if config.patterns.filter_overlapping {
        for (i, a) in result.patterns.iter().enumerate() {
            for b in &result.patterns[..i] {
                // b precedes a in descending-confidence order (or ties),
                // so b.confidence >= a.confidence per the pipeline's sort.
                let overlap = a.overlap_bars(b) as f64;
                let ratio = overlap / a.duration_bars() as f64;
                assert!(ratio < config.patterns.overlap_threshold);
            }
        }
    }
}

#[test]
fn most_common_category_matches_the_largest_group() {
    let config = Configuration::from_level(SensitivityLevel::High);
    let outcome = analyze(
        ascending_triangle_series(),
        &config,
        None,
        &CancellationToken::new(),
    )
    .unwrap();
    let AnalysisOutcome::Completed(result) = outcome else {
        panic!("expected a completed analysis");
    };
    if let Some(top) = result.pattern_summary.most_common_category {
        let top_count = result.pattern_summary.by_category[&top];
        for (&category, &count) in &result.pattern_summary.by_category {
            if category != top {
                assert!(count <= top_count);
            }
        }
    }
}
