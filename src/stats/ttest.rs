//! Welch two-sample t-test

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of a Welch t-test
#[derive(Debug, Clone, Copy)]
pub struct TTestResult {
    pub statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

/// Two-sample t-test without the equal-variance assumption, two-sided.
///
/// Returns None when either sample has fewer than two observations or both
/// samples have zero variance.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<TTestResult> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }

    let (mean_a, var_a) = mean_and_variance(a);
    let (mean_b, var_b) = mean_and_variance(b);

    let se_a = var_a / a.len() as f64;
    let se_b = var_b / b.len() as f64;
    let pooled_se = se_a + se_b;
    if pooled_se <= 0.0 {
        return None;
    }

    let statistic = (mean_a - mean_b) / pooled_se.sqrt();

    // Welch-Satterthwaite degrees of freedom
    let degrees_of_freedom = pooled_se.powi(2)
        / (se_a.powi(2) / (a.len() as f64 - 1.0) + se_b.powi(2) / (b.len() as f64 - 1.0));
    if !degrees_of_freedom.is_finite() || degrees_of_freedom <= 0.0 {
        return None;
    }

    let dist = StudentsT::new(0.0, 1.0, degrees_of_freedom).ok()?;
    let p_value = 2.0 * (1.0 - dist.cdf(statistic.abs()));

    Some(TTestResult {
        statistic,
        degrees_of_freedom,
        p_value,
    })
}

/// Sample mean and unbiased variance
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = if values.len() < 2 {
        0.0
    } else {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    };
    (mean, variance)
}
