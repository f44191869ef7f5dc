use pattern_core::{VolumeProfile, VolumeTrend};

/// Builds a `VolumeProfile` over a pattern's volume slice (spec §4.3).
/// `confirming_trend` is the convention the calling detector picked (e.g.
/// triangles/flags want `Decreasing`, reversals/harmonics want
/// `Increasing`) — this function only classifies the trend and compares it
/// against that convention.
pub fn build_volume_profile(
    volumes: &[f64],
    confirming_trend: VolumeTrend,
    breakout_volume: Option<f64>,
) -> VolumeProfile {
    let positive: Vec<f64> = volumes.iter().copied().filter(|&v| v > 0.0).collect();
    let average_volume = if positive.is_empty() {
        0.0
    } else {
        positive.iter().sum::<f64>() / positive.len() as f64
    };

    if volumes.len() < 2 {
        return VolumeProfile {
            average_volume,
            trend: VolumeTrend::Unknown,
            confirms_pattern: false,
            breakout_volume,
        };
    }

    let mid = volumes.len() / 2;
    let first_half = &volumes[..mid];
    let second_half = &volumes[mid..];
    let first_mean = mean(first_half);
    let second_mean = mean(second_half);

    let trend = if first_half.is_empty() || second_half.is_empty() {
        VolumeTrend::Unknown
    } else if first_mean.abs() < f64::EPSILON {
        VolumeTrend::Unknown
    } else {
        let change_ratio = (second_mean - first_mean) / first_mean;
        if change_ratio > 0.10 {
            VolumeTrend::Increasing
        } else if change_ratio < -0.10 {
            VolumeTrend::Decreasing
        } else {
            VolumeTrend::Stable
        }
    };

    VolumeProfile {
        average_volume,
        trend,
        confirms_pattern: trend == confirming_trend,
        breakout_volume,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_decreasing_volume() {
        let volumes = vec![1000.0, 900.0, 800.0, 700.0, 600.0, 500.0];
        let profile = build_volume_profile(&volumes, VolumeTrend::Decreasing, None);
        assert_eq!(profile.trend, VolumeTrend::Decreasing);
        assert!(profile.confirms_pattern);
    }

    #[test]
    fn classifies_increasing_volume() {
        let volumes = vec![500.0, 550.0, 600.0, 900.0, 950.0, 1000.0];
        let profile = build_volume_profile(&volumes, VolumeTrend::Decreasing, None);
        assert_eq!(profile.trend, VolumeTrend::Increasing);
        assert!(!profile.confirms_pattern);
    }

    #[test]
    fn classifies_stable_volume() {
        let volumes = vec![1000.0, 1010.0, 990.0, 1005.0];
        let profile = build_volume_profile(&volumes, VolumeTrend::Stable, None);
        assert_eq!(profile.trend, VolumeTrend::Stable);
    }

    #[test]
    fn empty_slice_is_unknown() {
        let profile = build_volume_profile(&[], VolumeTrend::Increasing, None);
        assert_eq!(profile.trend, VolumeTrend::Unknown);
        assert_eq!(profile.average_volume, 0.0);
        assert!(!profile.confirms_pattern);
    }

    #[test]
    fn ignores_non_positive_volumes_in_average() {
        let volumes = vec![0.0, 100.0, 0.0, 200.0];
        let profile = build_volume_profile(&volumes, VolumeTrend::Unknown, None);
        assert!((profile.average_volume - 150.0).abs() < 1e-9);
    }
}
