use pattern_core::Trendline;

/// Fits a line through `points` (already-absolute `(index, value)` pairs).
/// Two points fit exactly (slope guarded against a zero run); three or more
/// use ordinary least squares with an R² over the span (spec §4.2 "Fit").
pub fn fit_trendline(points: &[(usize, f64)]) -> Option<Trendline> {
    if points.len() < 2 {
        return None;
    }
    let start_index = points.iter().map(|p| p.0).min().unwrap();
    let end_index = points.iter().map(|p| p.0).max().unwrap();

    if points.len() == 2 {
        let (i1, v1) = points[0];
        let (i2, v2) = points[1];
        if i1 == i2 {
            return None;
        }
        let slope = (v2 - v1) / (i2 as f64 - i1 as f64);
        let intercept = v1 - slope * i1 as f64;
        return Some(Trendline {
            start_index,
            end_index,
            slope,
            intercept,
            r_squared: 1.0,
        });
    }

    let n = points.len() as f64;
    let x_sum: f64 = points.iter().map(|p| p.0 as f64).sum();
    let y_sum: f64 = points.iter().map(|p| p.1).sum();
    let xy_sum: f64 = points.iter().map(|p| p.0 as f64 * p.1).sum();
    let xx_sum: f64 = points.iter().map(|p| (p.0 as f64).powi(2)).sum();

    let denom = n * xx_sum - x_sum.powi(2);
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let slope = (n * xy_sum - x_sum * y_sum) / denom;
    let intercept = (y_sum - slope * x_sum) / n;

    let y_mean = y_sum / n;
    let ss_tot: f64 = points.iter().map(|p| (p.1 - y_mean).powi(2)).sum();
    let ss_res: f64 = points
        .iter()
        .map(|p| {
            let predicted = slope * p.0 as f64 + intercept;
            (p.1 - predicted).powi(2)
        })
        .sum();
    let r_squared = if ss_tot.abs() < f64::EPSILON {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).max(0.0)
    };

    Some(Trendline {
        start_index,
        end_index,
        slope,
        intercept,
        r_squared,
    })
}

/// Quality of a candidate resistance (`is_upper = true`) or support line over
/// `values[start..=end]`: residuals from points that break the line (above a
/// resistance, below a support) count double (spec §4.2 "Line-fit quality").
pub fn line_fit_quality(values: &[f64], start: usize, line: &Trendline, is_upper: bool) -> f64 {
    let slice = &values[start..=line.end_index.min(values.len() - 1)];
    if slice.is_empty() {
        return 0.0;
    }
    let range = slice.iter().cloned().fold(f64::MIN, f64::max)
        - slice.iter().cloned().fold(f64::MAX, f64::min);
    if range <= 0.0 {
        return 0.0;
    }

    let mut total_residual = 0.0;
    for (offset, &v) in slice.iter().enumerate() {
        let index = start + offset;
        let predicted = line.value_at(index);
        let residual = (v - predicted).abs();
        let breaks_line = if is_upper {
            v > predicted
        } else {
            v < predicted
        };
        total_residual += if breaks_line {
            2.0 * residual
        } else {
            residual
        };
    }

    let normalized_error = total_residual / (slice.len() as f64 * range);
    (1.0 - 2.0 * normalized_error).max(0.0)
}

/// Count of indices in `values[start..=end]` within `tolerance` (relative,
/// default 2%) of the fitted line's value at that index (spec §4.2 "Touch
/// count").
pub fn touch_count(values: &[f64], start: usize, end: usize, line: &Trendline, tolerance: f64) -> usize {
    let end = end.min(values.len().saturating_sub(1));
    if start > end {
        return 0;
    }
    (start..=end)
        .filter(|&i| {
            let predicted = line.value_at(i);
            if predicted.abs() < f64::EPSILON {
                (values[i] - predicted).abs() < 1e-9
            } else {
                ((values[i] - predicted) / predicted).abs() <= tolerance
            }
        })
        .count()
}

/// Piecewise length score (spec §4.2 "Length score"): a plateau of 1.0 over
/// `[ideal_low, ideal_high]`, scaling linearly down to 0 below the band and
/// asymptotically (floor 0.3) above it.
pub fn length_score(length: usize, ideal_low: usize, ideal_high: usize) -> f64 {
    let length = length as f64;
    let low = ideal_low as f64;
    let high = ideal_high as f64;
    if length < low {
        if low <= 0.0 {
            return 0.0;
        }
        (length / low).clamp(0.0, 1.0)
    } else if length <= high {
        1.0
    } else {
        let excess = (length - high) / high;
        (1.0 / (1.0 + excess)).max(0.3)
    }
}

/// X-coordinate of the intersection of two lines; `+inf` if parallel within
/// epsilon (spec §4.2 "Convergence point").
pub fn convergence_point(upper: &Trendline, lower: &Trendline) -> f64 {
    let slope_diff = upper.slope - lower.slope;
    if slope_diff.abs() < 1e-9 {
        return f64::INFINITY;
    }
    (lower.intercept - upper.intercept) / slope_diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_point_fit_is_exact() {
        let line = fit_trendline(&[(0, 10.0), (10, 20.0)]).unwrap();
        assert!((line.slope - 1.0).abs() < 1e-9);
        assert!((line.intercept - 10.0).abs() < 1e-9);
        assert!((line.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn two_point_fit_rejects_zero_run() {
        assert!(fit_trendline(&[(5, 1.0), (5, 2.0)]).is_none());
    }

    #[test]
    fn least_squares_fit_on_perfect_line_has_r_squared_one() {
        let pts: Vec<(usize, f64)> = (0..10).map(|i| (i, 2.0 * i as f64 + 1.0)).collect();
        let line = fit_trendline(&pts).unwrap();
        assert!((line.slope - 2.0).abs() < 1e-6);
        assert!((line.r_squared - 1.0).abs() < 1e-6);
    }

    #[test]
    fn length_score_plateaus_and_decays() {
        assert!(length_score(5, 15, 50) < length_score(30, 15, 50));
        assert!((length_score(30, 15, 50) - 1.0).abs() < 1e-9);
        assert!(length_score(500, 15, 50) >= 0.3);
        assert!(length_score(500, 15, 50) < 1.0);
    }

    #[test]
    fn convergence_point_is_infinite_for_parallel_lines() {
        let a = Trendline {
            start_index: 0,
            end_index: 10,
            slope: 1.0,
            intercept: 0.0,
            r_squared: 1.0,
        };
        let b = Trendline {
            start_index: 0,
            end_index: 10,
            slope: 1.0,
            intercept: 5.0,
            r_squared: 1.0,
        };
        assert!(convergence_point(&a, &b).is_infinite());
    }

    #[test]
    fn convergence_point_finds_crossing() {
        let a = Trendline {
            start_index: 0,
            end_index: 10,
            slope: -1.0,
            intercept: 20.0,
            r_squared: 1.0,
        };
        let b = Trendline {
            start_index: 0,
            end_index: 10,
            slope: 1.0,
            intercept: 0.0,
            r_squared: 1.0,
        };
        assert!((convergence_point(&a, &b) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn touch_count_counts_near_line_points() {
        let values = vec![10.0, 10.05, 9.0, 10.1, 8.0];
        let line = Trendline {
            start_index: 0,
            end_index: 4,
            slope: 0.0,
            intercept: 10.0,
            r_squared: 1.0,
        };
        assert_eq!(touch_count(&values, 0, 4, &line, 0.02), 3);
    }
}
