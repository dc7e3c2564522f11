//! Feature derivation
//!
//! A pure function of (event, pre-state, post-state, static facts) producing
//! the enriched record the hypothesis tests consume.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::normalize::CanonicalEvent;
use crate::engine::tracker::StateSnapshot;
use crate::engine::window::TimeBin;
use crate::{EngineConfig, PlayerId, TeamId};

/// Per-game facts resolved once from a boxscore-like summary.
///
/// When a team's top scorer is unknown, `is_clutch_player_event` degrades to
/// always-false for that team; the table build records a data-quality flag
/// instead of failing the game.
#[derive(Debug, Clone, Default)]
pub struct GameStaticFacts {
    pub home_team: Option<TeamId>,
    pub away_team: Option<TeamId>,
    pub top_scorers: HashMap<TeamId, PlayerId>,
}

impl GameStaticFacts {
    /// True when a top scorer is known for both teams
    pub fn top_scorers_resolved(&self) -> bool {
        match (self.home_team, self.away_team) {
            (Some(home), Some(away)) => {
                self.top_scorers.contains_key(&home) && self.top_scorers.contains_key(&away)
            }
            _ => false,
        }
    }
}

/// A canonical event plus everything derived from running state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    pub event: CanonicalEvent,
    /// Home minus away, recomputed strictly from the cumulative score fields
    pub score_diff: i32,
    /// Pre-state snapshot: was the opposing team already over the foul
    /// threshold when this event happened
    pub in_bonus: bool,
    /// Seconds since the acting team's last possession start; None when no
    /// possession start has been observed this period
    pub possession_duration: Option<f64>,
    /// possession_duration clamped to the shot-clock maximum
    pub shot_clock_used: Option<f64>,
    /// Set when possession_duration exceeded the shot-clock maximum,
    /// indicating a missed possession-start detection upstream
    pub shot_clock_anomaly: bool,
    /// The acting player is the game's top scorer for their team
    pub is_clutch_player_event: bool,
    /// Score differential at the game's last event; identical for every
    /// event of a game, back-filled after full traversal
    pub final_score_diff: i32,
    pub time_bin: TimeBin,
}

/// Computes derived features from tracker snapshots
pub struct FeatureDeriver {
    bonus_foul_threshold: u32,
    shot_clock_max_seconds: f64,
    regulation_period_count: u32,
}

impl FeatureDeriver {
    pub fn new(config: &EngineConfig) -> Self {
        FeatureDeriver {
            bonus_foul_threshold: config.bonus_foul_threshold,
            shot_clock_max_seconds: config.shot_clock_max_seconds,
            regulation_period_count: config.regulation_period_count,
        }
    }

    /// Derive the enriched record for one event.
    ///
    /// `pre` is the snapshot from just before the event was counted (bonus
    /// semantics); `post` reflects the event itself (possession timing, so a
    /// possession-start event gets duration 0). `final_score_diff` is left
    /// at 0 here and back-filled by the table builder.
    pub fn derive(
        &self,
        event: &CanonicalEvent,
        pre: &StateSnapshot,
        post: &StateSnapshot,
        facts: &GameStaticFacts,
    ) -> EnrichedEvent {
        let score_diff = event.home_score as i32 - event.away_score as i32;

        let in_bonus = event
            .team_id
            .map(|team| pre.opponent_fouls(team) >= self.bonus_foul_threshold)
            .unwrap_or(false);

        let possession_duration = event.team_id.and_then(|team| {
            post.possession_started_at(team)
                .map(|started| (event.elapsed_seconds - started).max(0.0))
        });

        let shot_clock_anomaly = possession_duration
            .map(|d| d > self.shot_clock_max_seconds)
            .unwrap_or(false);
        if shot_clock_anomaly {
            log::debug!(
                "{} event {}: possession of {:.1}s exceeds shot clock, \
                 likely missed possession start",
                event.game_id,
                event.sequence,
                possession_duration.unwrap_or(0.0)
            );
        }
        let shot_clock_used =
            possession_duration.map(|d| d.min(self.shot_clock_max_seconds));

        let is_clutch_player_event = match (event.team_id, event.player_id) {
            (Some(team), Some(player)) => facts.top_scorers.get(&team) == Some(&player),
            _ => false,
        };

        EnrichedEvent {
            event: event.clone(),
            score_diff,
            in_bonus,
            possession_duration,
            shot_clock_used,
            shot_clock_anomaly,
            is_clutch_player_event,
            final_score_diff: 0,
            time_bin: TimeBin::for_event(
                event.period,
                event.seconds_remaining,
                self.regulation_period_count,
            ),
        }
    }
}
