use crate::finite_or;

/// Point-in-time read of the most recent RSI value (spec §4.11).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiSnapshot {
    pub current: Option<f64>,
    pub overbought: bool,
    pub oversold: bool,
}

impl RsiSnapshot {
    pub fn from_series(values: &[Option<f64>]) -> Self {
        let current = values.iter().rev().find_map(|v| *v);
        RsiSnapshot {
            current,
            overbought: current.is_some_and(|v| v > 70.0),
            oversold: current.is_some_and(|v| v < 30.0),
        }
    }
}

/// Wilder-smoothed RSI over `period` (default 14). Output is the same
/// length as `closes`; the first `period` positions are `None` since no
/// average gain/loss is available yet (spec §4.11).
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    if period == 0 || n < period + 1 {
        return vec![None; n];
    }

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    let mut out = vec![None; n];
    let mut avg_gain = gains[1..=period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[1..=period].iter().sum::<f64>() / period as f64;

    for i in (period + 1)..n {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;

        let rs = if avg_loss.abs() < f64::EPSILON {
            f64::INFINITY
        } else {
            avg_gain / avg_loss
        };
        let value = if rs.is_infinite() {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + rs))
        };
        out[i] = Some(finite_or(value, 50.0));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uptrend(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn leading_positions_are_none() {
        let values = rsi(&uptrend(30), 14);
        assert!(values[..15].iter().all(Option::is_none));
    }

    #[test]
    fn pure_uptrend_approaches_one_hundred() {
        let values = rsi(&uptrend(40), 14);
        let last = values.last().unwrap().unwrap();
        assert!(last > 95.0, "expected near-100 RSI, got {last}");
    }

    #[test]
    fn pure_downtrend_approaches_zero() {
        let closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let values = rsi(&closes, 14);
        let last = values.last().unwrap().unwrap();
        assert!(last < 5.0, "expected near-0 RSI, got {last}");
    }

    #[test]
    fn too_short_series_is_all_none() {
        let values = rsi(&[1.0, 2.0, 3.0], 14);
        assert!(values.iter().all(Option::is_none));
    }

    #[test]
    fn snapshot_reads_latest_value_and_zones() {
        let mut values = vec![None, None, Some(80.0), Some(20.0)];
        let snap = RsiSnapshot::from_series(&values);
        assert_eq!(snap.current, Some(20.0));
        assert!(snap.oversold);
        assert!(!snap.overbought);

        values.pop();
        let snap = RsiSnapshot::from_series(&values);
        assert_eq!(snap.current, Some(80.0));
        assert!(snap.overbought);
    }

    #[test]
    fn output_length_matches_input() {
        let closes = uptrend(50);
        assert_eq!(rsi(&closes, 14).len(), closes.len());
    }
}
