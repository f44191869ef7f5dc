use pattern_core::{PatternKind, SensitivityConfig, Series, VolumeTrend};
use pattern_primitives::{aggregate, build_volume_profile, sensitivity_adjust, WeightedFactor};

use crate::candlestick::bar_stats::{average_range_before, context_before, BarStats, TrendContext};
use crate::common::{key_levels, make_pattern, DetectorOutput};

const TWEEZER_TOLERANCE: f64 = 0.02;
const HARAMI_PREV_BODY_MIN: f64 = 0.5;
const HARAMI_CURR_BODY_MAX_RATIO: f64 = 0.5;
const PENETRATION_MIN: f64 = 0.5;

/// Two-bar composite candlesticks (spec §4.9).
pub fn detect(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let bars = series.bars();
    let closes = series.closes();
    let volumes = series.volumes();
    let sens = sensitivity.candlestick_patterns;
    let accept_threshold = 0.3 + sens * 0.3;

    let mut patterns = Vec::new();

    for i in 1..bars.len() {
        let prev = bars[i - 1];
        let curr = bars[i];
        let prev_stats = BarStats::compute(&prev);
        let curr_stats = BarStats::compute(&curr);
        let context = context_before(&closes, i - 1);
        let avg_range = average_range_before(bars, i);
        let volume_profile = build_volume_profile(&volumes[(i - 1)..=i], VolumeTrend::Increasing, None);

        let prev_lo = prev.open.min(prev.close);
        let prev_hi = prev.open.max(prev.close);
        let curr_lo = curr.open.min(curr.close);
        let curr_hi = curr.open.max(curr.close);

        // Engulfing
        if !prev_stats.is_bullish
            && curr_stats.is_bullish
            && curr_lo <= prev_lo
            && curr_hi >= prev_hi
            && matches!(context, TrendContext::Downtrend | TrendContext::Sideways)
        {
            let engulf_ratio = ((curr_hi - curr_lo) / (prev_hi - prev_lo).max(f64::EPSILON)).clamp(1.0, 3.0);
            let size_score = ((engulf_ratio - 1.0) / 2.0).clamp(0.0, 1.0);
            let context_score = if context == TrendContext::Downtrend { 1.0 } else { 0.6 };
            push(&mut patterns, series, i - 1, i, PatternKind::BullishEngulfing, sens, accept_threshold,
                &[WeightedFactor::new(0.5, size_score), WeightedFactor::new(0.2, curr_stats.body_ratio), WeightedFactor::new(0.3, context_score)],
                volume_profile, "bullish engulfing");
        }
        if prev_stats.is_bullish
            && !curr_stats.is_bullish
            && curr_lo <= prev_lo
            && curr_hi >= prev_hi
            && matches!(context, TrendContext::Uptrend | TrendContext::Sideways)
        {
            let engulf_ratio = ((curr_hi - curr_lo) / (prev_hi - prev_lo).max(f64::EPSILON)).clamp(1.0, 3.0);
            let size_score = ((engulf_ratio - 1.0) / 2.0).clamp(0.0, 1.0);
            let context_score = if context == TrendContext::Uptrend { 1.0 } else { 0.6 };
            push(&mut patterns, series, i - 1, i, PatternKind::BearishEngulfing, sens, accept_threshold,
                &[WeightedFactor::new(0.5, size_score), WeightedFactor::new(0.2, curr_stats.body_ratio), WeightedFactor::new(0.3, context_score)],
                volume_profile, "bearish engulfing");
        }

        // Harami
        let curr_contained = curr_lo >= prev_lo && curr_hi <= prev_hi;
        if !prev_stats.is_bullish
            && prev_stats.body_ratio >= HARAMI_PREV_BODY_MIN
            && curr_contained
            && curr_stats.body_ratio <= prev_stats.body_ratio * HARAMI_CURR_BODY_MAX_RATIO
            && matches!(context, TrendContext::Downtrend | TrendContext::Sideways)
        {
            let containment = 1.0 - (curr_stats.body / prev_stats.body.max(f64::EPSILON)).clamp(0.0, 1.0);
            let context_score = if context == TrendContext::Downtrend { 1.0 } else { 0.6 };
            push(&mut patterns, series, i - 1, i, PatternKind::BullishHarami, sens, accept_threshold,
                &[WeightedFactor::new(0.5, containment), WeightedFactor::new(0.2, prev_stats.body_ratio), WeightedFactor::new(0.3, context_score)],
                volume_profile, "bullish harami");
        }
        if prev_stats.is_bullish
            && prev_stats.body_ratio >= HARAMI_PREV_BODY_MIN
            && curr_contained
            && curr_stats.body_ratio <= prev_stats.body_ratio * HARAMI_CURR_BODY_MAX_RATIO
            && matches!(context, TrendContext::Uptrend | TrendContext::Sideways)
        {
            let containment = 1.0 - (curr_stats.body / prev_stats.body.max(f64::EPSILON)).clamp(0.0, 1.0);
            let context_score = if context == TrendContext::Uptrend { 1.0 } else { 0.6 };
            push(&mut patterns, series, i - 1, i, PatternKind::BearishHarami, sens, accept_threshold,
                &[WeightedFactor::new(0.5, containment), WeightedFactor::new(0.2, prev_stats.body_ratio), WeightedFactor::new(0.3, context_score)],
                volume_profile, "bearish harami");
        }

        // Piercing line / dark cloud cover
        let prev_mid = (prev_lo + prev_hi) / 2.0;
        if !prev_stats.is_bullish
            && curr_stats.is_bullish
            && curr.open < prev.low
            && curr.close > prev_mid
            && curr.close < prev_hi
            && context == TrendContext::Downtrend
        {
            let penetration = (curr.close - prev_lo) / (prev_hi - prev_lo).max(f64::EPSILON);
            let penetration_score = ((penetration - PENETRATION_MIN) / PENETRATION_MIN).clamp(0.0, 1.0);
            let gap_score = ((prev.low - curr.open) / avg_range).clamp(0.0, 1.0);
            push(&mut patterns, series, i - 1, i, PatternKind::PiercingLine, sens, accept_threshold,
                &[WeightedFactor::new(0.5, penetration_score), WeightedFactor::new(0.3, gap_score), WeightedFactor::new(0.2, 1.0)],
                volume_profile, "piercing line");
        }
        if prev_stats.is_bullish
            && !curr_stats.is_bullish
            && curr.open > prev.high
            && curr.close < prev_mid
            && curr.close > prev_lo
            && context == TrendContext::Uptrend
        {
            let penetration = (prev_hi - curr.close) / (prev_hi - prev_lo).max(f64::EPSILON);
            let penetration_score = ((penetration - PENETRATION_MIN) / PENETRATION_MIN).clamp(0.0, 1.0);
            let gap_score = ((curr.open - prev.high) / avg_range).clamp(0.0, 1.0);
            push(&mut patterns, series, i - 1, i, PatternKind::DarkCloudCover, sens, accept_threshold,
                &[WeightedFactor::new(0.5, penetration_score), WeightedFactor::new(0.3, gap_score), WeightedFactor::new(0.2, 1.0)],
                volume_profile, "dark cloud cover");
        }

        // Tweezer tops/bottoms
        let high_diff = (prev.high - curr.high).abs() / avg_range;
        if high_diff <= TWEEZER_TOLERANCE && context == TrendContext::Uptrend {
            let match_score = (1.0 - high_diff / TWEEZER_TOLERANCE).clamp(0.0, 1.0);
            push(&mut patterns, series, i - 1, i, PatternKind::TweezerTops, sens, accept_threshold,
                &[WeightedFactor::new(0.7, match_score), WeightedFactor::new(0.3, 1.0)],
                volume_profile, "tweezer tops");
        }
        let low_diff = (prev.low - curr.low).abs() / avg_range;
        if low_diff <= TWEEZER_TOLERANCE && context == TrendContext::Downtrend {
            let match_score = (1.0 - low_diff / TWEEZER_TOLERANCE).clamp(0.0, 1.0);
            push(&mut patterns, series, i - 1, i, PatternKind::TweezerBottoms, sens, accept_threshold,
                &[WeightedFactor::new(0.7, match_score), WeightedFactor::new(0.3, 1.0)],
                volume_profile, "tweezer bottoms");
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
        ("prev_close", series.bar(start).close),
        ("curr_close", series.bar(end).close),
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pattern_core::Bar;

    fn series_with(bars: Vec<(f64, f64, f64, f64)>) -> Series {
        let t0 = Utc::now();
        let bars: Vec<Bar> = bars
            .into_iter()
            .enumerate()
            .map(|(i, (o, h, l, c))| Bar {
                timestamp: t0 + Duration::hours(i as i64),
                open: o,
                high: h,
                low: l,
                close: c,
                volume: 1000.0,
            })
            .collect();
        Series::new("TEST", "1h", bars, 1).unwrap()
    }

    #[test]
    fn detects_a_bullish_engulfing_after_a_downtrend() {
        let mut bars = Vec::new();
        for i in 0..6 {
            let base = 110.0 - i as f64;
            bars.push((base, base + 0.2, base - 1.0, base - 0.8));
        }
        bars.push((103.0, 103.2, 101.5, 102.0));
        bars.push((101.5, 105.0, 101.3, 104.5));
        let series = series_with(bars);
        let sensitivity = pattern_core::SensitivityLevel::VeryHigh.expand();
        let (patterns, _warnings) = detect(&series, &sensitivity);
        assert!(patterns.iter().any(|p| p.kind == PatternKind::BullishEngulfing));
    }
}
