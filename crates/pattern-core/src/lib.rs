pub mod bar;
pub mod config;
pub mod error;
pub mod pattern;
pub mod series;

pub use bar::Bar;
pub use config::{
    AnalysisConfig, Configuration, PatternsConfig, SensitivityConfig, SensitivityLevel,
};
pub use error::EngineError;
pub use pattern::{
    Category, DetectedPattern, PatternKind, Trendline, TurningPoint, TurningPointKind,
    VolumeProfile, VolumeTrend,
};
pub use series::Series;
