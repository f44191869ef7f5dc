use pattern_core::DetectedPattern;

use crate::result::{IndicatorSnapshot, PatternSummary};

/// Builds the short recommendation list (spec §6): bias, strongest signal,
/// RSI note, volume note, risk note.
pub fn build_recommendations(
    summary: &PatternSummary,
    indicators: &IndicatorSnapshot,
    patterns: &[DetectedPattern],
) -> Vec<String> {
    let mut out = Vec::new();

    // Bias
    if summary.total == 0 {
        out.push("No patterns detected; no directional bias.".to_string());
    } else if summary.sentiment.bullish > summary.sentiment.bearish {
        out.push(format!(
            "Bullish bias: {} bullish pattern(s) vs {} bearish.",
            summary.sentiment.bullish, summary.sentiment.bearish
        ));
    } else if summary.sentiment.bearish > summary.sentiment.bullish {
        out.push(format!(
            "Bearish bias: {} bearish pattern(s) vs {} bullish.",
            summary.sentiment.bearish, summary.sentiment.bullish
        ));
    } else {
        out.push("Mixed bias: bullish and bearish patterns are balanced.".to_string());
    }

    // Strongest signal
    if let Some(strongest) = patterns
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    {
        out.push(format!(
            "Strongest signal: {:?} at confidence {:.2}.",
            strongest.kind, strongest.confidence
        ));
    }

    // RSI note
    if let Some(current) = indicators.rsi.current {
        if indicators.rsi.overbought {
            out.push(format!("RSI is overbought at {current:.1}."));
        } else if indicators.rsi.oversold {
            out.push(format!("RSI is oversold at {current:.1}."));
        }
    }

    // Volume note
    let confirmed = patterns.iter().filter(|p| p.volume_profile.confirms_pattern).count();
    if summary.total > 0 {
        let ratio = confirmed as f64 / summary.total as f64;
        out.push(format!(
            "{confirmed}/{} pattern(s) ({:.0}%) have volume confirmation.",
            summary.total,
            ratio * 100.0
        ));
    }

    // Risk note
    if summary.average_confidence < 0.5 {
        out.push("Average pattern confidence is below 0.5; treat signals with caution.".to_string());
    } else {
        out.push("Average pattern confidence is solid; standard risk management still applies.".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pattern_core::{Category, PatternKind, VolumeProfile, VolumeTrend};
    use chrono::Utc;

    fn pattern(kind: PatternKind, category: Category, confidence: f64, confirms: bool) -> DetectedPattern {
        DetectedPattern {
            kind,
            category,
            confidence,
            start_time: Utc::now(),
            end_time: Utc::now(),
            start_index: 0,
            end_index: 10,
            key_levels: Default::default(),
            volume_profile: VolumeProfile {
                average_volume: 1000.0,
                trend: VolumeTrend::Increasing,
                confirms_pattern: confirms,
                breakout_volume: None,
            },
            description: String::new(),
            fibonacci_levels: None,
        }
    }

    #[test]
    fn empty_pattern_list_yields_no_bias_note() {
        let summary = PatternSummary::from_patterns(&[]);
        let indicators = IndicatorSnapshot {
            rsi: crate::result::RsiSnapshotData { current: None, overbought: false, oversold: false },
            macd: crate::result::MacdSnapshotData { current_macd: None, current_signal: None, bullish_crossover: false },
        };
        let recs = build_recommendations(&summary, &indicators, &[]);
        assert!(recs[0].contains("No patterns detected"));
    }

    #[test]
    fn bullish_majority_yields_bullish_bias() {
        let patterns = vec![
            pattern(PatternKind::DoubleBottom, Category::BullishReversal, 0.8, true),
            pattern(PatternKind::AscendingTriangle, Category::BullishContinuation, 0.7, true),
            pattern(PatternKind::HeadShoulders, Category::BearishReversal, 0.6, false),
        ];
        let summary = PatternSummary::from_patterns(&patterns);
        let indicators = IndicatorSnapshot {
            rsi: crate::result::RsiSnapshotData { current: Some(50.0), overbought: false, oversold: false },
            macd: crate::result::MacdSnapshotData { current_macd: None, current_signal: None, bullish_crossover: false },
        };
        let recs = build_recommendations(&summary, &indicators, &patterns);
        assert!(recs[0].contains("Bullish bias"));
        assert!(recs.iter().any(|r| r.contains("DoubleBottom")));
    }
}
