use std::collections::BTreeMap;

use pattern_core::{DetectedPattern, PatternKind, Series, VolumeProfile};

/// What a single detector returns: accepted candidates plus any non-fatal
/// warnings raised along the way (spec §4.12 "Failure semantics" — a
/// degenerate window is dropped and logged, never a fatal error).
pub type DetectorOutput = (Vec<DetectedPattern>, Vec<String>);

/// Shared constructor so every detector stamps the same invariants
/// (`category` always derived from `kind`, confidence always clamped).
#[allow(clippy::too_many_arguments)]
pub fn make_pattern(
    kind: PatternKind,
    confidence: f64,
    series: &Series,
    start_index: usize,
    end_index: usize,
    key_levels: BTreeMap<String, f64>,
    volume_profile: VolumeProfile,
    description: impl Into<String>,
    fibonacci_levels: Option<BTreeMap<String, f64>>,
) -> DetectedPattern {
    DetectedPattern {
        kind,
        category: kind.category(),
        confidence: confidence.clamp(0.0, 1.0),
        start_time: series.bar(start_index).timestamp,
        end_time: series.bar(end_index).timestamp,
        start_index,
        end_index,
        key_levels,
        volume_profile,
        description: description.into(),
        fibonacci_levels,
    }
}

pub fn key_levels(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
