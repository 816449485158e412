//! Population timing statistics shared by Stage 2's variance gate and the
//! Stage 4 cross-session analyzer. Uses *population* (not sample) standard
//! deviation, and defines CV as 0 when the mean is non-positive.

/// Arithmetic mean. Returns 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation: sqrt(sum((x-mean)^2) / n).
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Coefficient of variation: std / mean, guarded to 0 when mean <= 0.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m <= 0.0 {
        return 0.0;
    }
    population_std(values) / m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_has_zero_cv() {
        let xs = vec![0.1, 0.1, 0.1, 0.1];
        assert_eq!(coefficient_of_variation(&xs), 0.0);
    }

    #[test]
    fn zero_mean_guards_cv_to_zero() {
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn erratic_timings_produce_high_cv() {
        let xs = vec![0.01, 1.2, 0.02, 1.1, 0.015, 1.3, 0.01, 1.0, 0.02, 1.25];
        assert!(coefficient_of_variation(&xs) > 0.8);
    }
}
