use pattern_core::{PatternKind, SensitivityConfig, Series, VolumeTrend};
use pattern_primitives::{aggregate, build_volume_profile, sensitivity_adjust, WeightedFactor};

use crate::candlestick::bar_stats::{context_before, BarStats, TrendContext};
use crate::common::{key_levels, make_pattern, DetectorOutput};

const DOJI_BODY_MAX: f64 = 0.05;
const SPINNING_TOP_BODY_MAX: f64 = 0.3;
const SPINNING_TOP_WICK_MIN: f64 = 0.3;
const MARUBOZU_BODY_MIN: f64 = 0.8;
const MARUBOZU_WICK_MAX: f64 = 0.1;
const HAMMER_WICK_MIN: f64 = 0.6;
const HAMMER_OPPOSITE_WICK_MAX: f64 = 0.1;

/// Single-bar candlestick shapes (spec §4.9).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let bars = series.bars();
    let closes = series.closes();
    let volumes = series.volumes();
    let sens = sensitivity.candlestick_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let mut patterns = Vec::new();

    for i in 0..bars.len() {
        let stats = BarStats::compute(&bars[i]);
        let context = context_before(&closes, i);
        let volume_profile = build_volume_profile(&volumes[i..=i], VolumeTrend::Increasing, None);

        if stats.range.abs() < f64::EPSILON {
            continue;
        }

        if stats.body_ratio <= DOJI_BODY_MAX {
            let body_fit = (1.0 - stats.body_ratio / DOJI_BODY_MAX).clamp(0.0, 1.0);

            if stats.upper_wick_ratio >= HAMMER_WICK_MIN && stats.lower_wick_ratio <= HAMMER_OPPOSITE_WICK_MAX {
                push(&mut patterns, series, i, PatternKind::GravestoneDoji, sens, accept_threshold,
                    &[WeightedFactor::new(0.4, body_fit), WeightedFactor::new(0.6, stats.upper_wick_ratio.clamp(0.0, 1.0))],
                    volume_profile, "gravestone doji");
            } else {
                push(&mut patterns, series, i, PatternKind::Doji, sens, accept_threshold,
                    &[WeightedFactor::new(0.7, body_fit), WeightedFactor::new(0.3, 1.0)],
                    volume_profile, "doji");
            }
        }

        if stats.body_ratio > DOJI_BODY_MAX
            && stats.body_ratio <= SPINNING_TOP_BODY_MAX
            && stats.upper_wick_ratio >= SPINNING_TOP_WICK_MIN
            && stats.lower_wick_ratio >= SPINNING_TOP_WICK_MIN
        {
            let balance = 1.0 - (stats.upper_wick_ratio - stats.lower_wick_ratio).abs();
            push(&mut patterns, series, i, PatternKind::SpinningTop, sens, accept_threshold,
                &[WeightedFactor::new(0.5, balance.clamp(0.0, 1.0)), WeightedFactor::new(0.5, 1.0 - stats.body_ratio / SPINNING_TOP_BODY_MAX)],
                volume_profile, "spinning top");
        }

        if stats.body_ratio >= MARUBOZU_BODY_MIN
            && stats.upper_wick_ratio <= MARUBOZU_WICK_MAX
            && stats.lower_wick_ratio <= MARUBOZU_WICK_MAX
        {
            let fit = ((stats.body_ratio - MARUBOZU_BODY_MIN) / (1.0 - MARUBOZU_BODY_MIN)).clamp(0.0, 1.0);
            push(&mut patterns, series, i, PatternKind::Marubozu, sens, accept_threshold,
                &[WeightedFactor::new(0.7, fit), WeightedFactor::new(0.3, 1.0)],
                volume_profile, "marubozu");
        }

        if stats.lower_wick_ratio >= HAMMER_WICK_MIN
            && stats.body_ratio <= SPINNING_TOP_BODY_MAX
            && stats.upper_wick_ratio <= HAMMER_OPPOSITE_WICK_MAX
            && matches!(context, TrendContext::Downtrend | TrendContext::Sideways)
        {
            let body_fit = (1.0 - stats.body_ratio / SPINNING_TOP_BODY_MAX).clamp(0.0, 1.0);
            let wick_fit = stats.lower_wick_ratio.clamp(0.0, 1.0);
            let context_score = if context == TrendContext::Downtrend { 1.0 } else { 0.6 };
            push(&mut patterns, series, i, PatternKind::Hammer, sens, accept_threshold,
                &[WeightedFactor::new(0.35, body_fit), WeightedFactor::new(0.35, wick_fit), WeightedFactor::new(0.3, context_score)],
                volume_profile, "hammer");
        }

        if stats.upper_wick_ratio >= HAMMER_WICK_MIN
            && stats.body_ratio <= SPINNING_TOP_BODY_MAX
            && stats.lower_wick_ratio <= HAMMER_OPPOSITE_WICK_MAX
            && matches!(context, TrendContext::Uptrend | TrendContext::Sideways)
        {
            let body_fit = (1.0 - stats.body_ratio / SPINNING_TOP_BODY_MAX).clamp(0.0, 1.0);
            let wick_fit = stats.upper_wick_ratio.clamp(0.0, 1.0);
            let context_score = if context == TrendContext::Uptrend { 1.0 } else { 0.6 };
            push(&mut patterns, series, i, PatternKind::ShootingStar, sens, accept_threshold,
                &[WeightedFactor::new(0.35, body_fit), WeightedFactor::new(0.35, wick_fit), WeightedFactor::new(0.3, context_score)],
                volume_profile, "shooting star");
        }
    }

    (patterns, Vec::new())
}

#[allow(clippy::too_many_arguments)]
fn push(
    patterns: &mut Vec<pattern_core::DetectedPattern>,
    series: &Series,
    index: usize,
    kind: PatternKind,
    sens: f64,
    accept_threshold: f64,
    factors: &[WeightedFactor],
    volume_profile: pattern_core::VolumeProfile,
    label: &str,
) {
    let confidence = sensitivity_adjust(aggregate(factors), sens);
    if confidence < accept_threshold {
        return;
    }
    let bar = series.bar(index);
    let levels = key_levels(&[("open", bar.open), ("high", bar.high), ("low", bar.low), ("close", bar.close)]);
    patterns.push(make_pattern(
        kind,
        confidence,
        series,
        index,
        index,
        levels,
        volume_profile,
        format!("{label} at bar {index}"),
        None,
    ));
}
