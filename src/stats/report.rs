//! Plain-text summary of a hypothesis-test run

use crate::stats::{TestConclusion, TestOutcome};

/// Render the battery results as a human-readable report
pub fn render_report(outcomes: &[TestOutcome], alpha: f64) -> String {
    let mut out = String::new();
    out.push_str("============================================================\n");
    out.push_str("Clutch-time hypothesis testing report\n");
    out.push_str("============================================================\n\n");
    out.push_str(&format!("Significance level: alpha = {}\n\n", alpha));
    out.push_str("Summary of tests:\n");

    for outcome in outcomes {
        out.push_str(&format!("\n- {}\n", outcome.name));
        if let (Some(statistic), Some(p_value)) = (outcome.statistic, outcome.p_value) {
            out.push_str(&format!(
                "  statistic = {:.4}, p = {:.4}\n",
                statistic, p_value
            ));
        }
        out.push_str(&format!("  {}\n", outcome.detail));
        let verdict = match &outcome.conclusion {
            TestConclusion::RejectNull => "REJECT H0".to_string(),
            TestConclusion::FailToReject => "FAIL TO REJECT H0".to_string(),
            TestConclusion::Skipped(reason) => format!("SKIPPED ({})", reason),
            TestConclusion::Inconclusive(reason) => format!("INCONCLUSIVE ({})", reason),
        };
        out.push_str(&format!("  {}\n", verdict));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_every_outcome() {
        let outcomes = vec![
            TestOutcome {
                name: "First test".to_string(),
                statistic: Some(2.5),
                p_value: Some(0.0124),
                conclusion: TestConclusion::RejectNull,
                detail: "n = 100".to_string(),
            },
            TestOutcome {
                name: "Second test".to_string(),
                statistic: None,
                p_value: None,
                conclusion: TestConclusion::Skipped("no events".to_string()),
                detail: "no events".to_string(),
            },
        ];

        let report = render_report(&outcomes, 0.05);
        assert!(report.contains("First test"));
        assert!(report.contains("p = 0.0124"));
        assert!(report.contains("REJECT H0"));
        assert!(report.contains("SKIPPED (no events)"));
        assert!(report.contains("alpha = 0.05"));
    }
}
