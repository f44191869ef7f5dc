use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::pattern::{Category, PatternKind};

/// A sensitivity preset name, expanded into concrete per-family values by
/// `SensitivityLevel::expand` (spec §3 "Configuration" / §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl SensitivityLevel {
    /// The dial value in `[0,1]` the preset expands each family to.
    pub fn value(self) -> f64 {
        match self {
            SensitivityLevel::VeryLow => 0.2,
            SensitivityLevel::Low => 0.35,
            SensitivityLevel::Medium => 0.5,
            SensitivityLevel::High => 0.65,
            SensitivityLevel::VeryHigh => 0.8,
        }
    }

    /// Expand the preset into a full `SensitivityConfig`. Raising the level
    /// both scales up each family's dial (which raises the detectors' own
    /// confidence via the sensitivity adjustment, spec §4.2) and lowers the
    /// per-category floor the orchestrator enforces afterwards — the two
    /// together guarantee §8 invariant 12 (monotonicity).
    pub fn expand(self) -> SensitivityConfig {
        let v = self.value();
        let floor = 0.6 - v * 0.3; // 0.66 (very_low) down to 0.36 (very_high)
        let mut min_confidence = BTreeMap::new();
        for category in [
            Category::BullishContinuation,
            Category::BearishContinuation,
            Category::BullishReversal,
            Category::BearishReversal,
            Category::BilateralNeutral,
            Category::Harmonic,
            Category::Candlestick,
            Category::Divergence,
        ] {
            min_confidence.insert(category, floor);
        }
        SensitivityConfig {
            level: self,
            geometric_patterns: v,
            reversal_patterns: v,
            candlestick_patterns: v,
            harmonic_patterns: v,
            divergence_patterns: v,
            min_confidence,
            min_pattern_duration: 3,
            max_pattern_duration: 200,
            require_volume_confirmation: false,
        }
    }
}

/// Per-family sensitivity dials and category confidence floors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    pub level: SensitivityLevel,
    pub geometric_patterns: f64,
    pub reversal_patterns: f64,
    pub candlestick_patterns: f64,
    pub harmonic_patterns: f64,
    pub divergence_patterns: f64,
    pub min_confidence: BTreeMap<Category, f64>,
    pub min_pattern_duration: usize,
    pub max_pattern_duration: usize,
    pub require_volume_confirmation: bool,
}

impl SensitivityConfig {
    pub fn min_confidence_for(&self, category: Category) -> f64 {
        self.min_confidence.get(&category).copied().unwrap_or(0.5)
    }
}

/// Per-kind/per-family enable flags and result-shaping limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternsConfig {
    pub enabled_geometric: bool,
    pub enabled_reversal: bool,
    pub enabled_candlestick: bool,
    pub enabled_harmonic: bool,
    pub enabled_divergence: bool,
    /// Per-kind overrides; a kind absent from this map is enabled iff its
    /// family is enabled.
    pub enabled: BTreeMap<PatternKind, bool>,
    pub max_patterns_per_type: usize,
    pub max_total_patterns: usize,
    pub filter_overlapping: bool,
    pub overlap_threshold: f64,
}

impl PatternsConfig {
    pub fn is_kind_enabled(&self, kind: PatternKind) -> bool {
        if let Some(&explicit) = self.enabled.get(&kind) {
            return explicit;
        }
        use crate::pattern::Category::*;
        match kind.category() {
            BullishContinuation | BearishContinuation | BilateralNeutral => {
                self.enabled_geometric
            }
            BullishReversal | BearishReversal => self.enabled_reversal,
            Candlestick => self.enabled_candlestick,
            Harmonic => self.enabled_harmonic,
            Divergence => self.enabled_divergence,
        }
    }
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            enabled_geometric: true,
            enabled_reversal: true,
            enabled_candlestick: true,
            enabled_harmonic: true,
            enabled_divergence: true,
            enabled: BTreeMap::new(),
            max_patterns_per_type: 3,
            max_total_patterns: 20,
            filter_overlapping: true,
            overlap_threshold: 0.5,
        }
    }
}

/// Bounds the orchestrator applies to the input series before detection
/// (spec §4.12 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub min_data_points: usize,
    pub max_data_points: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_data_points: 30,
            max_data_points: 2000,
        }
    }
}

/// Top-level, read-only detection configuration (spec §3/§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub sensitivity: SensitivityConfig,
    pub patterns: PatternsConfig,
    pub analysis: AnalysisConfig,
}

impl Configuration {
    pub fn from_level(level: SensitivityLevel) -> Self {
        Self {
            sensitivity: level.expand(),
            patterns: PatternsConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }

    /// Validates the numeric bounds spec §7 treats as fatal input errors.
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, v) in [
            ("geometric_patterns", self.sensitivity.geometric_patterns),
            ("reversal_patterns", self.sensitivity.reversal_patterns),
            ("candlestick_patterns", self.sensitivity.candlestick_patterns),
            ("harmonic_patterns", self.sensitivity.harmonic_patterns),
            ("divergence_patterns", self.sensitivity.divergence_patterns),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "sensitivity.{name} must be in [0,1], got {v}"
                )));
            }
        }
        for (&category, &v) in &self.sensitivity.min_confidence {
            if !(0.0..=1.0).contains(&v) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "sensitivity.min_confidence[{category:?}] must be in [0,1], got {v}"
                )));
            }
        }
        if self.sensitivity.min_pattern_duration == 0 {
            return Err(EngineError::InvalidConfiguration(
                "sensitivity.min_pattern_duration must be positive".to_string(),
            ));
        }
        if self.sensitivity.max_pattern_duration < self.sensitivity.min_pattern_duration {
            return Err(EngineError::InvalidConfiguration(
                "sensitivity.max_pattern_duration must be >= min_pattern_duration".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.patterns.overlap_threshold) {
            return Err(EngineError::InvalidConfiguration(
                "patterns.overlap_threshold must be in [0,1]".to_string(),
            ));
        }
        if self.patterns.max_patterns_per_type == 0 || self.patterns.max_total_patterns == 0 {
            return Err(EngineError::InvalidConfiguration(
                "patterns.max_patterns_per_type and max_total_patterns must be positive"
                    .to_string(),
            ));
        }
        if self.analysis.min_data_points == 0 || self.analysis.max_data_points == 0 {
            return Err(EngineError::InvalidConfiguration(
                "analysis.min_data_points and max_data_points must be positive".to_string(),
            ));
        }
        if self.analysis.max_data_points < self.analysis.min_data_points {
            return Err(EngineError::InvalidConfiguration(
                "analysis.max_data_points must be >= min_data_points".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::from_level(SensitivityLevel::Medium)
    }
}

/// `final = clamp(base + (sensitivity - 0.5) * 0.2, 0, 1)` — the sensitivity
/// adjustment shared by every detector's confidence aggregator (spec §4.2).
pub fn sensitivity_adjust(base: f64, sensitivity: f64) -> f64 {
    (base + (sensitivity - 0.5) * 0.2).clamp(0.0, 1.0)
}
