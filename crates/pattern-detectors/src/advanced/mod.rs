pub mod abcd;
pub mod diamond;
pub mod expanding_triangle;
pub mod harmonics;

use pattern_core::{SensitivityConfig, Series};

use crate::common::DetectorOutput;

/// Runs the advanced geometric/harmonic detectors (spec §4.7/§4.8): diamonds,
/// expanding triangles, and XABCD harmonics (including plain ABCD).
pub fn detect_all(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = Vec::new();
    let mut warnings = Vec::new();

    for (mut p, mut w) in [
        diamond::detect(series, sensitivity),
        expanding_triangle::detect(series, sensitivity),
        harmonics::detect(series, sensitivity),
        abcd::detect(series, sensitivity),
    ] {
        patterns.append(&mut p);
        warnings.append(&mut w);
    }

    (patterns, warnings)
}
