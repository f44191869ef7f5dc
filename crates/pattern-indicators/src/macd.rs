use crate::finite_or;

/// MACD(12, 26, 9): EMA₁₂ − EMA₂₆, with a 9-period EMA signal line (spec
/// §4.11). Every field is the same length as the input, with leading `None`s
/// wherever the underlying EMA isn't seeded yet.
pub struct MacdResult {
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Point-in-time read of the most recent MACD/signal pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdSnapshot {
    pub current_macd: Option<f64>,
    pub current_signal: Option<f64>,
    pub bullish_crossover: bool,
}

impl MacdSnapshot {
    pub fn from_result(result: &MacdResult) -> Self {
        let current_macd = result.macd_line.iter().rev().find_map(|v| *v);
        let current_signal = result.signal_line.iter().rev().find_map(|v| *v);
        let bullish_crossover = match (current_macd, current_signal) {
            (Some(m), Some(s)) => m > s,
            _ => false,
        };
        MacdSnapshot {
            current_macd,
            current_signal,
            bullish_crossover,
        }
    }
}

fn ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = data.len();
    if period == 0 || n < period {
        return vec![None; n];
    }

    let mut out = vec![None; n];
    let seed = finite_or(data[..period].iter().sum::<f64>() / period as f64, 0.0);
    out[period - 1] = Some(seed);

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in period..n {
        let value = finite_or((data[i] - prev) * multiplier + prev, prev);
        out[i] = Some(value);
        prev = value;
    }
    out
}

/// MACD over `close`, aligned to its full length.
pub fn macd(close: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    let n = close.len();
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || slow_period < fast_period {
        return MacdResult {
            macd_line: vec![None; n],
            signal_line: vec![None; n],
            histogram: vec![None; n],
        };
    }

    let ema_fast = ema(close, fast_period);
    let ema_slow = ema(close, slow_period);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let dense_macd: Vec<f64> = macd_line.iter().filter_map(|v| *v).collect();
    let first_valid = macd_line.iter().position(Option::is_some);

    let signal_line = match first_valid {
        Some(offset) => {
            let dense_signal = ema(&dense_macd, signal_period);
            let mut signal = vec![None; n];
            for (i, v) in dense_signal.into_iter().enumerate() {
                signal[offset + i] = v;
            }
            signal
        }
        None => vec![None; n],
    };

    let histogram: Vec<Option<f64>> = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn output_length_matches_input() {
        let close = rising(60);
        let result = macd(&close, 12, 26, 9);
        assert_eq!(result.macd_line.len(), close.len());
        assert_eq!(result.signal_line.len(), close.len());
        assert_eq!(result.histogram.len(), close.len());
    }

    #[test]
    fn too_short_series_is_all_none() {
        let result = macd(&rising(5), 12, 26, 9);
        assert!(result.macd_line.iter().all(Option::is_none));
    }

    #[test]
    fn rising_series_has_positive_macd() {
        let close = rising(80);
        let result = macd(&close, 12, 26, 9);
        let last = result.macd_line.last().unwrap().unwrap();
        assert!(last > 0.0);
    }

    #[test]
    fn snapshot_detects_bullish_crossover() {
        let close = rising(80);
        let result = macd(&close, 12, 26, 9);
        let snap = MacdSnapshot::from_result(&result);
        assert!(snap.current_macd.is_some());
        assert!(snap.current_signal.is_some());
        assert!(snap.bullish_crossover);
    }

    #[test]
    fn rejects_slow_period_shorter_than_fast() {
        let result = macd(&rising(60), 26, 12, 9);
        assert!(result.macd_line.iter().all(Option::is_none));
    }
}
