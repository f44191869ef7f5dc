pub mod advanced;
pub mod candlestick;
pub mod common;
pub mod divergence;
pub mod geometric;
pub mod reversal;

use pattern_core::{SensitivityConfig, Series};

use crate::common::DetectorOutput;

/// Runs every pattern family and concatenates their output. The orchestrator
/// in `pattern-engine` applies sorting, filtering and overlap resolution on
/// top of this (spec §4.12).
pub fn detect_all(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = Vec::new();
    let mut warnings = Vec::new();

    for (mut p, mut w) in [
        geometric::detect_all(series, sensitivity),
        reversal::detect_all(series, sensitivity),
        advanced::detect_all(series, sensitivity),
        candlestick::detect_all(series, sensitivity),
        divergence::detect(series, sensitivity),
    ] {
        patterns.append(&mut p);
        warnings.append(&mut w);
    }

    (patterns, warnings)
}
