use pattern_core::{PatternKind, SensitivityConfig, Series, VolumeTrend};
use pattern_primitives::{aggregate, build_volume_profile, sensitivity_adjust, WeightedFactor};

use crate::candlestick::bar_stats::{context_before, BarStats, TrendContext};
use crate::common::{key_levels, make_pattern, DetectorOutput};

const STAR_BODY_MAX: f64 = 0.3;
const LARGE_BODY_MIN: f64 = 0.5;

/// Three-bar composite candlesticks (spec §4.9).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let bars = series.bars();
    let closes = series.closes();
    let volumes = series.volumes();
    let sens = sensitivity.candlestick_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let mut patterns = Vec::new();

    for i in 2..bars.len() {
        let b1 = bars[i - 2];
        let b2 = bars[i - 1];
        let b3 = bars[i];
        let s1 = BarStats::compute(&b1);
        let s2 = BarStats::compute(&b2);
        let s3 = BarStats::compute(&b3);
        let context = context_before(&closes, i - 2);
        let volume_profile = build_volume_profile(&volumes[(i - 2)..=i], VolumeTrend::Increasing, None);

        let b1_lo = b1.open.min(b1.close);
        let b1_hi = b1.open.max(b1.close);
        let b1_mid = (b1_lo + b1_hi) / 2.0;
        let b2_hi = b2.open.max(b2.close);
        let b2_lo = b2.open.min(b2.close);

        // Morning star
        if !s1.is_bullish
            && s1.body_ratio >= LARGE_BODY_MIN
            && s2.body_ratio <= STAR_BODY_MAX
            && b2_hi <= b1.close
            && s3.is_bullish
            && s3.body_ratio >= LARGE_BODY_MIN
            && b3.close > b1_mid
            && context == TrendContext::Downtrend
        {
            let star_score = (1.0 - s2.body_ratio / STAR_BODY_MAX).clamp(0.0, 1.0);
            let gap_score = ((b1.close - b2_hi) / (b1_hi - b1_lo).max(f64::EPSILON)).clamp(0.0, 1.0);
            let penetration = ((b3.close - b1_mid) / (b1_hi - b1_lo).max(f64::EPSILON)).clamp(0.0, 1.0);
            push(&mut patterns, series, i - 2, i, PatternKind::MorningStar, sens, accept_threshold,
                &[WeightedFactor::new(0.3, star_score), WeightedFactor::new(0.3, gap_score), WeightedFactor::new(0.2, penetration), WeightedFactor::new(0.2, 1.0)],
                volume_profile, "morning star");
        }

        // Evening star
        if s1.is_bullish
            && s1.body_ratio >= LARGE_BODY_MIN
            && s2.body_ratio <= STAR_BODY_MAX
            && b2_lo >= b1.close
            && !s3.is_bullish
            && s3.body_ratio >= LARGE_BODY_MIN
            && b3.close < b1_mid
            && context == TrendContext::Uptrend
        {
            let star_score = (1.0 - s2.body_ratio / STAR_BODY_MAX).clamp(0.0, 1.0);
            let gap_score = ((b2_lo - b1.close) / (b1_hi - b1_lo).max(f64::EPSILON)).clamp(0.0, 1.0);
            let penetration = ((b1_mid - b3.close) / (b1_hi - b1_lo).max(f64::EPSILON)).clamp(0.0, 1.0);
            push(&mut patterns, series, i - 2, i, PatternKind::EveningStar, sens, accept_threshold,
                &[WeightedFactor::new(0.3, star_score), WeightedFactor::new(0.3, gap_score), WeightedFactor::new(0.2, penetration), WeightedFactor::new(0.2, 1.0)],
                volume_profile, "evening star");
        }

        // Three white soldiers
        if s1.is_bullish && s2.is_bullish && s3.is_bullish
            && s1.body_ratio >= LARGE_BODY_MIN && s2.body_ratio >= LARGE_BODY_MIN && s3.body_ratio >= LARGE_BODY_MIN
            && s1.upper_wick_ratio <= 0.3 && s2.upper_wick_ratio <= 0.3 && s3.upper_wick_ratio <= 0.3
            && b2.open >= b1.open.min(b1.close) && b2.open <= b1.open.max(b1.close)
            && b3.open >= b2.open.min(b2.close) && b3.open <= b2.open.max(b2.close)
            && b2.close > b1.close && b3.close > b2.close
        {
            let avg_body = (s1.body_ratio + s2.body_ratio + s3.body_ratio) / 3.0;
            let wick_score = 1.0 - (s1.upper_wick_ratio + s2.upper_wick_ratio + s3.upper_wick_ratio) / 3.0;
            push(&mut patterns, series, i - 2, i, PatternKind::ThreeWhiteSoldiers, sens, accept_threshold,
                &[WeightedFactor::new(0.4, avg_body), WeightedFactor::new(0.3, wick_score), WeightedFactor::new(0.3, 1.0)],
                volume_profile, "three white soldiers");
        }

        // Three black crows
        if !s1.is_bullish && !s2.is_bullish && !s3.is_bullish
            && s1.body_ratio >= LARGE_BODY_MIN && s2.body_ratio >= LARGE_BODY_MIN && s3.body_ratio >= LARGE_BODY_MIN
            && s1.lower_wick_ratio <= 0.3 && s2.lower_wick_ratio <= 0.3 && s3.lower_wick_ratio <= 0.3
            && b2.open >= b1.open.min(b1.close) && b2.open <= b1.open.max(b1.close)
            && b3.open >= b2.open.min(b2.close) && b3.open <= b2.open.max(b2.close)
            && b2.close < b1.close && b3.close < b2.close
        {
            let avg_body = (s1.body_ratio + s2.body_ratio + s3.body_ratio) / 3.0;
            let wick_score = 1.0 - (s1.lower_wick_ratio + s2.lower_wick_ratio + s3.lower_wick_ratio) / 3.0;
            push(&mut patterns, series, i - 2, i, PatternKind::ThreeBlackCrows, sens, accept_threshold,
                &[WeightedFactor::new(0.4, avg_body), WeightedFactor::new(0.3, wick_score), WeightedFactor::new(0.3, 1.0)],
                volume_profile, "three black crows");
        }

        // Rising three methods
        if s1.is_bullish
            && s1.body_ratio >= LARGE_BODY_MIN
            && b2.high <= b1.high
            && b2.low >= b1.low
            && s3.is_bullish
            && s3.body_ratio >= LARGE_BODY_MIN
            && b3.close > b1.close
        {
            let containment = 1.0 - ((b2.high - b2.low) / (b1.high - b1.low).max(f64::EPSILON)).clamp(0.0, 1.0);
            let continuation = ((b3.close - b1.close) / (b1_hi - b1_lo).max(f64::EPSILON)).clamp(0.0, 1.0);
            push(&mut patterns, series, i - 2, i, PatternKind::RisingThreeMethods, sens, accept_threshold,
                &[WeightedFactor::new(0.3, s1.body_ratio), WeightedFactor::new(0.3, containment), WeightedFactor::new(0.4, continuation)],
                volume_profile, "rising three methods");
        }

        // Falling three methods
        if !s1.is_bullish
            && s1.body_ratio >= LARGE_BODY_MIN
            && b2.high <= b1.high
            && b2.low >= b1.low
            && !s3.is_bullish
            && s3.body_ratio >= LARGE_BODY_MIN
            && b3.close < b1.close
        {
            let containment = 1.0 - ((b2.high - b2.low) / (b1.high - b1.low).max(f64::EPSILON)).clamp(0.0, 1.0);
            let continuation = ((b1.close - b3.close) / (b1_hi - b1_lo).max(f64::EPSILON)).clamp(0.0, 1.0);
            push(&mut patterns, series, i - 2, i, PatternKind::FallingThreeMethods, sens, accept_threshold,
                &[WeightedFactor::new(0.3, s1.body_ratio), WeightedFactor::new(0.3, containment), WeightedFactor::new(0.4, continuation)],
                volume_profile, "falling three methods");
        }
    }

    (patterns, Vec::new())
}

#[allow(clippy::too_many_arguments)]
fn push(
    patterns: &mut Vec<pattern_core::DetectedPattern>,
    series: &Series,
    start: usize,
    end: usize,
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
    let levels = key_levels(&[
        ("first_close", series.bar(start).close),
        ("last_close", series.bar(end).close),
    ]);
    patterns.push(make_pattern(
        kind,
        confidence,
        series,
        start,
        end,
        levels,
        volume_profile,
        format!("{label} at bars {start}-{end}"),
        None,
    ));
}
