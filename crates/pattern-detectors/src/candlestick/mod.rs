pub mod bar_stats;
pub mod single;
pub mod three_bar;
pub mod two_bar;

use pattern_core::{SensitivityConfig, Series};

use crate::common::DetectorOutput;

/// Runs every candlestick-family detector: single-bar shapes, then 2- and
/// 3-bar composites (spec §4.9).
pub fn detect_all(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = Vec::new();
    let mut warnings = Vec::new();

    for (mut p, mut w) in [
        single::detect(series, sensitivity),
        two_bar::detect(series, sensitivity),
        three_bar::detect(series, sensitivity),
    ] {
        patterns.append(&mut p);
        warnings.append(&mut w);
    }

    (patterns, warnings)
}
