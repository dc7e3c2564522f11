//! Hypothesis-test battery over clutch-time tables
//!
//! Downstream consumers of the game-state table: they read enriched events,
//! never mutate them. Deterministic, f64 throughout.

pub mod chi2;
pub mod proportion;
pub mod report;
pub mod ttest;

use crate::engine::derive::EnrichedEvent;
use crate::engine::normalize::{EventKind, ShotCategory};
use crate::engine::table::GameStateTable;
use crate::StatsConfig;

/// How a hypothesis test resolved
#[derive(Debug, Clone, PartialEq)]
pub enum TestConclusion {
    /// p < alpha
    RejectNull,
    /// p >= alpha
    FailToReject,
    /// preconditions for running the test were not met
    Skipped(String),
    /// the test ran but its result is not trustworthy
    Inconclusive(String),
}

/// Result of one hypothesis test
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub name: String,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub conclusion: TestConclusion,
    pub detail: String,
}

impl TestOutcome {
    fn skipped(name: &str, reason: &str) -> Self {
        TestOutcome {
            name: name.to_string(),
            statistic: None,
            p_value: None,
            conclusion: TestConclusion::Skipped(reason.to_string()),
            detail: reason.to_string(),
        }
    }

    fn inconclusive(name: &str, reason: &str) -> Self {
        TestOutcome {
            name: name.to_string(),
            statistic: None,
            p_value: None,
            conclusion: TestConclusion::Inconclusive(reason.to_string()),
            detail: reason.to_string(),
        }
    }

    fn concluded(name: &str, statistic: f64, p_value: f64, alpha: f64, detail: String) -> Self {
        let conclusion = if p_value < alpha {
            TestConclusion::RejectNull
        } else {
            TestConclusion::FailToReject
        };
        TestOutcome {
            name: name.to_string(),
            statistic: Some(statistic),
            p_value: Some(p_value),
            conclusion,
            detail,
        }
    }
}

/// Run all three hypotheses over a set of clutch tables
pub fn run_battery(tables: &[&GameStateTable], config: &StatsConfig) -> Vec<TestOutcome> {
    let events: Vec<&EnrichedEvent> = tables.iter().flat_map(|t| t.events()).collect();
    vec![
        hypothesis_shot_selection(&events, config),
        hypothesis_foul_frequency(&events, config),
        hypothesis_score_pressure(&events, config),
    ]
}

/// H1: in the last 30 seconds with the home team trailing by 3+, do 3PT
/// attempts convert at a different rate than 2PT attempts? Welch t-test on
/// made-rates.
pub fn hypothesis_shot_selection(events: &[&EnrichedEvent], config: &StatsConfig) -> TestOutcome {
    const NAME: &str = "Shot selection: 3PT vs 2PT make rate (last 30s, home down 3+)";

    let mut made_three = Vec::new();
    let mut made_two = Vec::new();
    for record in events {
        if record.event.seconds_remaining > 30.0 || record.score_diff > -3 {
            continue;
        }
        let made = if record.event.kind.is_made_shot() { 1.0 } else { 0.0 };
        match record.event.shot_category {
            Some(ShotCategory::Three) => made_three.push(made),
            Some(ShotCategory::Two) => made_two.push(made),
            _ => {}
        }
    }

    if made_three.is_empty() || made_two.is_empty() {
        return TestOutcome::skipped(NAME, "need both 3PT and 2PT attempts");
    }
    if made_three.len() < config.min_sample_size || made_two.len() < config.min_sample_size {
        return TestOutcome::inconclusive(NAME, "sample sizes too small for a reliable t-test");
    }

    match ttest::welch_t_test(&made_three, &made_two) {
        Some(result) => {
            let detail = format!(
                "3PT: {}/{} made, 2PT: {}/{} made, t = {:.4}, df = {:.1}",
                made_three.iter().sum::<f64>() as usize,
                made_three.len(),
                made_two.iter().sum::<f64>() as usize,
                made_two.len(),
                result.statistic,
                result.degrees_of_freedom,
            );
            TestOutcome::concluded(NAME, result.statistic, result.p_value, config.alpha, detail)
        }
        None => TestOutcome::inconclusive(NAME, "zero variance in both groups"),
    }
}

/// H2: are fouls a larger share of events in the final 30 seconds than in
/// the earlier clutch window (31-180s)? Two-proportion z-test.
pub fn hypothesis_foul_frequency(events: &[&EnrichedEvent], config: &StatsConfig) -> TestOutcome {
    const NAME: &str = "Foul frequency: last 30s vs 31-180s";

    let mut fouls_a = 0u64;
    let mut total_a = 0u64;
    let mut fouls_b = 0u64;
    let mut total_b = 0u64;

    for record in events {
        let remaining = record.event.seconds_remaining;
        let is_foul = record.event.kind == EventKind::Foul;
        if remaining <= 30.0 {
            total_a += 1;
            fouls_a += is_foul as u64;
        } else if remaining <= 180.0 {
            total_b += 1;
            fouls_b += is_foul as u64;
        }
    }

    if total_a == 0 || total_b == 0 {
        return TestOutcome::skipped(NAME, "not enough events in one or both windows");
    }
    if fouls_a == 0 || fouls_b == 0 || fouls_a == total_a || fouls_b == total_b {
        return TestOutcome::inconclusive(NAME, "degenerate proportions make the z-test unstable");
    }

    match proportion::two_proportion_z_test(fouls_a, total_a, fouls_b, total_b) {
        Some(result) => {
            let detail = format!(
                "window A: {}/{} fouls, window B: {}/{} fouls, z = {:.4}",
                fouls_a, total_a, fouls_b, total_b, result.statistic,
            );
            TestOutcome::concluded(NAME, result.statistic, result.p_value, config.alpha, detail)
        }
        None => TestOutcome::inconclusive(NAME, "degenerate proportions make the z-test unstable"),
    }
}

/// Score buckets over home-minus-away, matching the EDA boundaries
pub const SCORE_BUCKET_LABELS: [&str; 6] = [
    "home -7 or worse",
    "home -4 to -6",
    "home -1 to -3",
    "tied to home +3",
    "home +4 to +6",
    "home +7 or better",
];

/// Bucket index for a score differential; None outside [-20, 20].
///
/// Closed integer ranges that follow the bucket labels, so -6 falls in
/// "-4 to -6" and 0 in "tied to home +3". The EDA's pandas cut over the
/// same boundaries is right-closed and would put -6 one bucket lower and
/// 0 one bucket lower; its labels and intervals disagree, and the labels
/// win here.
pub fn score_bucket(score_diff: i32) -> Option<usize> {
    match score_diff {
        -20..=-7 => Some(0),
        -6..=-4 => Some(1),
        -3..=-1 => Some(2),
        0..=3 => Some(3),
        4..=6 => Some(4),
        7..=20 => Some(5),
        _ => None,
    }
}

/// H3: is foul likelihood independent of the score differential bucket?
/// Chi-square test of independence over bucket x is-foul counts.
pub fn hypothesis_score_pressure(events: &[&EnrichedEvent], config: &StatsConfig) -> TestOutcome {
    const NAME: &str = "Score pressure: score bucket vs foul likelihood";

    let mut counts = [[0u64; 2]; 6];
    for record in events {
        if let Some(bucket) = score_bucket(record.score_diff) {
            let is_foul = (record.event.kind == EventKind::Foul) as usize;
            counts[bucket][is_foul] += 1;
        }
    }

    // only observed buckets enter the contingency table
    let observed: Vec<[u64; 2]> = counts
        .iter()
        .filter(|row| row[0] + row[1] > 0)
        .copied()
        .collect();

    let foul_total: u64 = observed.iter().map(|row| row[1]).sum();
    let non_foul_total: u64 = observed.iter().map(|row| row[0]).sum();
    if observed.len() < 2 || foul_total == 0 || non_foul_total == 0 {
        return TestOutcome::skipped(NAME, "not enough variation across buckets or foul status");
    }

    match chi2::chi_square_independence(&observed) {
        Some(result) => {
            let detail = format!(
                "{} buckets, {} fouls among {} events, chi2 = {:.4}, dof = {}",
                observed.len(),
                foul_total,
                foul_total + non_foul_total,
                result.statistic,
                result.degrees_of_freedom,
            );
            TestOutcome::concluded(NAME, result.statistic, result.p_value, config.alpha, detail)
        }
        None => TestOutcome::inconclusive(NAME, "degenerate contingency table"),
    }
}
