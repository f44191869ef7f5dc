pub mod cancellation;
pub mod orchestrator;
pub mod recommendations;
pub mod result;

#[cfg(test)]
mod scenarios_tests;

pub use cancellation::CancellationToken;
pub use orchestrator::analyze;
pub use result::{
    AnalysisOutcome, AnalysisResult, IndicatorSnapshot, MacdSnapshotData, PatternSummary,
    RsiSnapshotData, SentimentSplit,
};

pub use pattern_core::{
    AnalysisConfig, Bar, Category, Configuration, DetectedPattern, EngineError, PatternKind,
    PatternsConfig, SensitivityConfig, SensitivityLevel, Series, VolumeProfile, VolumeTrend,
};
