use serde::{Deserialize, Serialize};

use crate::bar::Bar;
use crate::config::AnalysisConfig;
use crate::error::EngineError;

/// An ordered sequence of bars for one symbol/timeframe. Indexed `0..len()-1`.
/// Detectors hold only read-only references; nothing in this crate mutates a
/// `Series` after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub symbol: String,
    pub timeframe: String,
    bars: Vec<Bar>,
}

impl Series {
    /// Validates and constructs a series. Fatal per spec §7/§8: too few bars,
    /// a malformed bar, or non-monotonic timestamps all reject the whole
    /// series — there is no partial construction.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        bars: Vec<Bar>,
        min_data_points: usize,
    ) -> Result<Self, EngineError> {
        if bars.len() < min_data_points {
            return Err(EngineError::TooFewBars {
                actual: bars.len(),
                minimum: min_data_points,
            });
        }
        for (i, b) in bars.iter().enumerate() {
            b.validate(i)?;
            if i > 0 && bars[i - 1].timestamp >= b.timestamp {
                return Err(EngineError::NonMonotonicTimestamps { index: i });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            bars,
        })
    }

    /// Truncates an oversized series to the most recent `max_data_points`
    /// bars, per spec §4.12 step 1. A no-op if already within bounds.
    pub fn truncate_to(&self, analysis: &AnalysisConfig) -> Self {
        let max = analysis.max_data_points;
        if self.bars.len() <= max {
            return self.clone();
        }
        let start = self.bars.len() - max;
        Self {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn bar(&self, index: usize) -> &Bar {
        &self.bars[index]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn bars(n: usize) -> Vec<Bar> {
        let t0 = Utc::now();
        (0..n)
            .map(|i| Bar {
                timestamp: t0 + Duration::hours(i as i64),
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.5 + i as f64,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn rejects_too_few_bars() {
        assert!(Series::new("BTC", "1h", bars(3), 5).is_err());
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let mut b = bars(5);
        b[3].timestamp = b[1].timestamp;
        assert!(Series::new("BTC", "1h", b, 5).is_err());
    }

    #[test]
    fn truncates_to_most_recent() {
        let s = Series::new("BTC", "1h", bars(10), 5).unwrap();
        let cfg = AnalysisConfig {
            min_data_points: 5,
            max_data_points: 4,
        };
        let t = s.truncate_to(&cfg);
        assert_eq!(t.len(), 4);
        assert_eq!(t.bar(0).open, s.bar(6).open);
    }
}
