use std::collections::BTreeMap;

use pattern_core::{Category, DetectedPattern};
use pattern_indicators::{MacdSnapshot, RsiSnapshot};
use serde::{Deserialize, Serialize};

// `RsiSnapshot`/`MacdSnapshot` live in `pattern-indicators` without a `serde`
// dependency (spec §3's ambient-stack list keeps indicators plain `Vec<f64>`
// functions); these two shadow structs carry the same fields with derives so
// `AnalysisResult` can still round-trip to JSON.

/// Bullish/bearish/neutral split over a pattern list (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentSplit {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
}

/// Aggregate view over the accepted pattern list (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub sentiment: SentimentSplit,
    pub average_confidence: f64,
    pub highest_confidence: f64,
    pub most_common_category: Option<Category>,
}

impl PatternSummary {
    pub fn from_patterns(patterns: &[DetectedPattern]) -> Self {
        let total = patterns.len();
        let mut by_category: BTreeMap<Category, usize> = BTreeMap::new();
        let mut sentiment = SentimentSplit {
            bullish: 0,
            bearish: 0,
            neutral: 0,
        };
        let mut confidence_sum = 0.0;
        let mut highest_confidence = 0.0_f64;

        for p in patterns {
            *by_category.entry(p.category).or_insert(0) += 1;
            if p.is_bullish() {
                sentiment.bullish += 1;
            } else if p.is_bearish() {
                sentiment.bearish += 1;
            } else {
                sentiment.neutral += 1;
            }
            confidence_sum += p.confidence;
            highest_confidence = highest_confidence.max(p.confidence);
        }

        let average_confidence = if total > 0 {
            confidence_sum / total as f64
        } else {
            0.0
        };
        let most_common_category = by_category
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(category, _)| *category);

        PatternSummary {
            total,
            by_category,
            sentiment,
            average_confidence,
            highest_confidence,
            most_common_category,
        }
    }
}

/// Current RSI/MACD readings alongside the pattern list (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: RsiSnapshotData,
    pub macd: MacdSnapshotData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiSnapshotData {
    pub current: Option<f64>,
    pub overbought: bool,
    pub oversold: bool,
}

impl From<RsiSnapshot> for RsiSnapshotData {
    fn from(snap: RsiSnapshot) -> Self {
        RsiSnapshotData {
            current: snap.current,
            overbought: snap.overbought,
            oversold: snap.oversold,
        }
    }
}

/// `MacdSnapshot` carried through as plain data so it derives `Serialize`
/// without requiring `pattern-indicators` to depend on `serde`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdSnapshotData {
    pub current_macd: Option<f64>,
    pub current_signal: Option<f64>,
    pub bullish_crossover: bool,
}

impl From<MacdSnapshot> for MacdSnapshotData {
    fn from(snap: MacdSnapshot) -> Self {
        MacdSnapshotData {
            current_macd: snap.current_macd,
            current_signal: snap.current_signal,
            bullish_crossover: snap.bullish_crossover,
        }
    }
}

/// The full result of one `analyze()` call (spec §6). `success` is implicit
/// in the `Result<AnalysisOutcome, EngineError>` the call returns, so it is
/// not duplicated as a field here — see DESIGN.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub timeframe: String,
    pub data_points: usize,
    pub patterns: Vec<DetectedPattern>,
    pub pattern_summary: PatternSummary,
    pub indicators: IndicatorSnapshot,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
    pub analysis_time_seconds: f64,
}

/// The three outcomes of an analysis call (spec §7): a completed result, or a
/// cancellation with whatever warnings had already accumulated. Fatal input
/// errors are surfaced as `Err(EngineError)` by `analyze()` rather than a
/// third variant here.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Completed(AnalysisResult),
    Cancelled { warnings: Vec<String> },
}
