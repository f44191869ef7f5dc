pub mod cup_handle;
pub mod flags_pennants;
pub mod rectangles;
pub mod triangles;
pub mod wedges;

use pattern_core::{SensitivityConfig, Series};

use crate::common::DetectorOutput;

/// Runs every geometric-family detector and concatenates their output
/// (spec §4.5). Order doesn't matter here — the orchestrator sorts and
/// filters globally afterwards.
pub fn detect_all(series: &Series, sensitivity: &SensitivityConfig) -> DetectorOutput {
    let mut patterns = Vec::new();
    let mut warnings = Vec::new();

    for (mut p, mut w) in [
        triangles::detect(series, sensitivity),
        wedges::detect(series, sensitivity),
        rectangles::detect(series, sensitivity),
        flags_pennants::detect(series, sensitivity),
        cup_handle::detect(series, sensitivity),
    ] {
        patterns.append(&mut p);
        warnings.append(&mut w);
    }

    (patterns, warnings)
}
