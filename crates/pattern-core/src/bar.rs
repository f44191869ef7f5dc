use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A single OHLCV observation. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Validates the well-formedness invariant from spec §8 property 1:
    /// `low <= open, close <= high` and `volume >= 0`.
    pub fn validate(&self, index: usize) -> Result<(), EngineError> {
        if !self.open.is_finite()
            || !self.high.is_finite()
            || !self.low.is_finite()
            || !self.close.is_finite()
        {
            return Err(EngineError::InvalidBar {
                index,
                reason: "non-finite price".to_string(),
            });
        }
        if self.volume < 0.0 || !self.volume.is_finite() {
            return Err(EngineError::InvalidBar {
                index,
                reason: "negative or non-finite volume".to_string(),
            });
        }
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(EngineError::InvalidBar {
                index,
                reason: "prices must be positive".to_string(),
            });
        }
        if self.low > self.open || self.low > self.close || self.low > self.high {
            return Err(EngineError::InvalidBar {
                index,
                reason: "low is not the minimum of the bar".to_string(),
            });
        }
        if self.high < self.open || self.high < self.close {
            return Err(EngineError::InvalidBar {
                index,
                reason: "high is not the maximum of the bar".to_string(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    #[inline]
    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    #[inline]
    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        }
    }

    #[test]
    fn accepts_well_formed_bar() {
        assert!(bar(10.0, 12.0, 9.0, 11.0).validate(0).is_ok());
    }

    #[test]
    fn rejects_low_above_open() {
        assert!(bar(10.0, 12.0, 10.5, 11.0).validate(0).is_err());
    }

    #[test]
    fn rejects_high_below_close() {
        assert!(bar(10.0, 10.5, 9.0, 11.0).validate(0).is_err());
    }

    #[test]
    fn rejects_negative_volume() {
        let mut b = bar(10.0, 12.0, 9.0, 11.0);
        b.volume = -1.0;
        assert!(b.validate(0).is_err());
    }

    #[test]
    fn rejects_non_positive_price() {
        let mut b = bar(10.0, 12.0, 9.0, 11.0);
        b.low = 0.0;
        assert!(b.validate(0).is_err());
    }
}
