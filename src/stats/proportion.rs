//! Two-proportion z-test

use statrs::distribution::{ContinuousCDF, Normal};

/// Result of a two-proportion z-test
#[derive(Debug, Clone, Copy)]
pub struct ZTestResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Pooled two-proportion z-test, two-sided.
///
/// Returns None when either group is empty or the pooled proportion is
/// degenerate (all successes or all failures), where the standard error
/// collapses to zero.
pub fn two_proportion_z_test(
    successes_a: u64,
    total_a: u64,
    successes_b: u64,
    total_b: u64,
) -> Option<ZTestResult> {
    if total_a == 0 || total_b == 0 || successes_a > total_a || successes_b > total_b {
        return None;
    }

    let n_a = total_a as f64;
    let n_b = total_b as f64;
    let p_a = successes_a as f64 / n_a;
    let p_b = successes_b as f64 / n_b;

    let pooled = (successes_a + successes_b) as f64 / (n_a + n_b);
    let standard_error = (pooled * (1.0 - pooled) * (1.0 / n_a + 1.0 / n_b)).sqrt();
    if standard_error == 0.0 {
        return None;
    }

    let statistic = (p_a - p_b) / standard_error;
    let normal = Normal::new(0.0, 1.0).ok()?;
    let p_value = 2.0 * (1.0 - normal.cdf(statistic.abs()));

    Some(ZTestResult {
        statistic,
        p_value,
    })
}
