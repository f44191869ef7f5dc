pub mod double_triple;
pub mod head_shoulders;

use pattern_core::{SensitivityConfig, Series};

use crate::common::DetectorOutput;

/// Runs every reversal-family detector (spec §4.6).
pub fn detect_all(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = Vec::new();
    let mut warnings = Vec::new();

    for (mut p, mut w) in [
        double_triple::detect(series, sensitivity),
        head_shoulders::detect(series, sensitivity),
    ] {
        patterns.append(&mut p);
        warnings.append(&mut w);
    }

    (patterns, warnings)
}
