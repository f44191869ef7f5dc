pub mod macd;
pub mod rsi;

pub use macd::{macd, MacdResult, MacdSnapshot};
pub use rsi::{rsi, RsiSnapshot};

/// Return `val` if finite, otherwise `default`. Keeps a single divide-by-zero
/// guard shared by every indicator below.
#[inline]
pub fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}
