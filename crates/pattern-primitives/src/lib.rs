pub mod scoring;
pub mod support_resistance;
pub mod trendline;
pub mod turning_points;
pub mod volume_profile;

pub use scoring::{aggregate, sensitivity_adjust, WeightedFactor};
pub use support_resistance::{cluster_levels, SrLevel};
pub use trendline::{
    convergence_point, fit_trendline, length_score, line_fit_quality, touch_count,
};
pub use turning_points::find_turning_points;
pub use volume_profile::build_volume_profile;
