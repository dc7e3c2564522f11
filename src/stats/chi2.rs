//! Chi-square test of independence

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Result of a chi-square independence test
#[derive(Debug, Clone, Copy)]
pub struct Chi2Result {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

/// Chi-square test of independence over an R x 2 contingency table.
///
/// Rows are categories, columns are the two outcome counts. Returns None
/// when the table has fewer than two non-empty rows, an empty column, or a
/// zero grand total. A 2 x 2 table (one degree of freedom) gets the Yates
/// continuity correction, matching scipy's chi2_contingency default.
pub fn chi_square_independence(observed: &[[u64; 2]]) -> Option<Chi2Result> {
    let rows: Vec<[u64; 2]> = observed
        .iter()
        .filter(|row| row[0] + row[1] > 0)
        .copied()
        .collect();
    if rows.len() < 2 {
        return None;
    }

    let col_totals = [
        rows.iter().map(|r| r[0]).sum::<u64>(),
        rows.iter().map(|r| r[1]).sum::<u64>(),
    ];
    if col_totals[0] == 0 || col_totals[1] == 0 {
        return None;
    }
    let grand_total = (col_totals[0] + col_totals[1]) as f64;

    let degrees_of_freedom = rows.len() - 1;
    let yates = degrees_of_freedom == 1;

    let mut statistic = 0.0;
    for row in &rows {
        let row_total = (row[0] + row[1]) as f64;
        for col in 0..2 {
            let expected = row_total * col_totals[col] as f64 / grand_total;
            let mut delta = (row[col] as f64 - expected).abs();
            if yates {
                delta = (delta - 0.5).max(0.0);
            }
            statistic += delta * delta / expected;
        }
    }

    let dist = ChiSquared::new(degrees_of_freedom as f64).ok()?;
    let p_value = 1.0 - dist.cdf(statistic);

    Some(Chi2Result {
        statistic,
        degrees_of_freedom,
        p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_table_high_p() {
        // same proportions in every row
        let result = chi_square_independence(&[[90, 10], [45, 5], [180, 20]]).unwrap();
        assert!(result.statistic < 1e-9);
        assert!(result.p_value > 0.99);
        assert_eq!(result.degrees_of_freedom, 2);
    }

    #[test]
    fn test_known_value_against_scipy() {
        // scipy.stats.chi2_contingency([[10, 20], [30, 5]])
        // -> chi2 = 16.5785, dof = 1, p = 4.67e-05 (Yates-corrected)
        let result = chi_square_independence(&[[10, 20], [30, 5]]).unwrap();
        assert!((result.statistic - 16.5785).abs() < 1e-3);
        assert_eq!(result.degrees_of_freedom, 1);
        assert!(result.p_value < 1e-4);
    }

    #[test]
    fn test_three_rows_uncorrected() {
        // scipy.stats.chi2_contingency([[10, 20], [30, 5], [15, 15]])
        // -> chi2 = 19.3033, dof = 2 (no correction above one dof)
        let result = chi_square_independence(&[[10, 20], [30, 5], [15, 15]]).unwrap();
        assert!((result.statistic - 19.3033).abs() < 1e-3);
        assert_eq!(result.degrees_of_freedom, 2);
    }

    #[test]
    fn test_empty_rows_are_dropped() {
        let with_empty = chi_square_independence(&[[10, 20], [0, 0], [30, 5]]).unwrap();
        let without = chi_square_independence(&[[10, 20], [30, 5]]).unwrap();
        assert!((with_empty.statistic - without.statistic).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_tables() {
        assert!(chi_square_independence(&[[10, 20]]).is_none());
        assert!(chi_square_independence(&[[10, 0], [20, 0]]).is_none());
        assert!(chi_square_independence(&[]).is_none());
    }
}
