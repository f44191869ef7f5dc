use pattern_core::Bar;

/// Ratios derived from a single bar's body/range/wicks (spec §4.9).
#[derive(Debug, Clone, Copy)]
pub struct BarStats {
    pub body: f64,
    pub range: f64,
    pub upper_wick: f64,
    pub lower_wick: f64,
    pub body_ratio: f64,
    pub upper_wick_ratio: f64,
    pub lower_wick_ratio: f64,
    pub is_bullish: bool,
}

impl BarStats {
    pub fn compute(bar: &Bar) -> Self {
        let range = bar.range();
        let safe = if range.abs() < f64::EPSILON { 1.0 } else { range };
        Self {
            body: bar.body(),
            range,
            upper_wick: bar.upper_wick(),
            lower_wick: bar.lower_wick(),
            body_ratio: bar.body() / safe,
            upper_wick_ratio: bar.upper_wick() / safe,
            lower_wick_ratio: bar.lower_wick() / safe,
            is_bullish: bar.is_bullish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendContext {
    Uptrend,
    Downtrend,
    Sideways,
}

const CONTEXT_WINDOW: usize = 5;
const SLOPE_THRESHOLD: f64 = 0.001;

/// Classifies the trend leading into `index` using up to the prior 5 closes
/// (spec §4.9 "context windows ... classify the prevailing trend").
pub fn context_before(closes: &[f64], index: usize) -> TrendContext {
    let window_start = index.saturating_sub(CONTEXT_WINDOW);
    if window_start >= index || index == 0 {
        return TrendContext::Sideways;
    }
    let slice = &closes[window_start..index];
    if slice.len() < 2 {
        return TrendContext::Sideways;
    }
    let first = slice[0];
    let last = *slice.last().unwrap();
    if first.abs() < f64::EPSILON {
        return TrendContext::Sideways;
    }
    let change = (last - first) / first;
    if change > SLOPE_THRESHOLD {
        TrendContext::Uptrend
    } else if change < -SLOPE_THRESHOLD {
        TrendContext::Downtrend
    } else {
        TrendContext::Sideways
    }
}

/// Mean `range()` over up to 5 bars before `index`, used to normalize
/// cross-bar comparisons (tweezer highs/lows, gap sizes).
pub fn average_range_before(bars: &[Bar], index: usize) -> f64 {
    let window_start = index.saturating_sub(CONTEXT_WINDOW);
    if window_start >= index {
        return bars[index].range().max(f64::EPSILON);
    }
    let slice = &bars[window_start..index];
    let avg = slice.iter().map(|b| b.range()).sum::<f64>() / slice.len() as f64;
    avg.max(f64::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar { timestamp: Utc::now(), open: o, high: h, low: l, close: c, volume: 100.0 }
    }

    #[test]
    fn computes_ratios_for_a_hammer_shaped_bar() {
        let stats = BarStats::compute(&bar(10.0, 10.2, 8.0, 10.1));
        assert!(stats.lower_wick_ratio > 0.8);
        assert!(stats.body_ratio < 0.2);
    }

    #[test]
    fn classifies_a_rising_run_as_an_uptrend() {
        let closes = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        assert_eq!(context_before(&closes, 5), TrendContext::Uptrend);
    }

    #[test]
    fn classifies_a_flat_run_as_sideways() {
        let closes = vec![100.0, 100.1, 99.9, 100.05, 99.95, 100.0];
        assert_eq!(context_before(&closes, 5), TrendContext::Sideways);
    }
}
