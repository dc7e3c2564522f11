//! Per-game running state
//!
//! A stateful fold over one game's canonical events. One tracker per game;
//! trackers are never shared, so independent games can be processed in
//! parallel without locking.

use std::collections::HashMap;

use crate::engine::normalize::{CanonicalEvent, EventKind};
use crate::{ClutchError, EngineConfig, GameId, Result, TeamId};

/// Running state for one team within the current game.
///
/// Foul counts and possession-start timestamps reset at every period
/// boundary (overtime periods included).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamRunningState {
    /// Fouls committed by this team in the current period
    pub period_fouls: u32,
    /// Elapsed game seconds of this team's last possession-start event
    pub possession_started_at: Option<f64>,
    /// Elapsed game seconds of this team's last event
    pub last_event_at: Option<f64>,
}

/// Immutable view of tracker state at a point in the event stream
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    teams: HashMap<TeamId, TeamRunningState>,
    period: u32,
}

impl StateSnapshot {
    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn team(&self, team: TeamId) -> Option<&TeamRunningState> {
        self.teams.get(&team)
    }

    /// Period fouls committed by the team opposing `team`.
    ///
    /// Returns 0 while the opponent has not yet appeared in the stream.
    pub fn opponent_fouls(&self, team: TeamId) -> u32 {
        self.teams
            .iter()
            .find(|(id, _)| **id != team)
            .map(|(_, state)| state.period_fouls)
            .unwrap_or(0)
    }

    pub fn possession_started_at(&self, team: TeamId) -> Option<f64> {
        self.teams.get(&team)?.possession_started_at
    }
}

/// Tracks per-team running state for a single game.
///
/// `apply` expects events in non-decreasing elapsed-time order (ties broken
/// upstream by ingestion sequence) and returns the state *as of just before*
/// the event is counted, so an event's own effect is visible only from the
/// next event onwards.
pub struct StateTracker {
    game_id: GameId,
    tolerance: f64,
    current_period: u32,
    last_elapsed: Option<f64>,
    teams: HashMap<TeamId, TeamRunningState>,
}

impl StateTracker {
    pub fn new(game_id: GameId, config: &EngineConfig) -> Self {
        StateTracker {
            game_id,
            tolerance: config.time_tolerance_seconds,
            current_period: 0,
            last_elapsed: None,
            teams: HashMap::new(),
        }
    }

    /// Seed the tracker with both team ids so opponent lookups work from the
    /// first event. Without this the pair is learned from the stream.
    pub fn with_teams(mut self, home: TeamId, away: TeamId) -> Self {
        self.teams.entry(home).or_default();
        self.teams.entry(away).or_default();
        self
    }

    /// Apply one event, returning the pre-event state snapshot.
    ///
    /// Fails with `OutOfOrderEvent` when the event precedes the previously
    /// applied one by more than the configured tolerance; the tracker state
    /// is left untouched in that case.
    pub fn apply(&mut self, event: &CanonicalEvent) -> Result<StateSnapshot> {
        if let Some(previous) = self.last_elapsed {
            if event.elapsed_seconds < previous - self.tolerance {
                return Err(ClutchError::OutOfOrderEvent {
                    game_id: self.game_id.clone(),
                    sequence: event.sequence,
                    elapsed: event.elapsed_seconds,
                    previous,
                });
            }
        }

        // Period boundary: foul counts and possession timestamps are
        // per-period state and start fresh.
        if event.period != self.current_period {
            for state in self.teams.values_mut() {
                state.period_fouls = 0;
                state.possession_started_at = None;
            }
            self.current_period = event.period;
        }

        if let Some(team) = event.team_id {
            self.teams.entry(team).or_default();
        }

        let snapshot = self.snapshot();

        if let Some(team) = event.team_id {
            if event.kind == EventKind::Foul {
                if let Some(state) = self.teams.get_mut(&team) {
                    state.period_fouls += 1;
                }
            }

            if let Some(starter) = self.possession_start_for(team, event.kind) {
                if let Some(state) = self.teams.get_mut(&starter) {
                    state.possession_started_at = Some(event.elapsed_seconds);
                }
            }

            if let Some(state) = self.teams.get_mut(&team) {
                state.last_event_at = Some(event.elapsed_seconds);
            }
        }

        self.last_elapsed = Some(
            self.last_elapsed
                .map_or(event.elapsed_seconds, |p| p.max(event.elapsed_seconds)),
        );

        Ok(snapshot)
    }

    /// Current (post-event) state snapshot
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            teams: self.teams.clone(),
            period: self.current_period,
        }
    }

    /// Which team, if any, starts a possession on this event.
    ///
    /// Heuristic, not ground truth: a defensive rebound starts a possession
    /// for the rebounding team; a turnover or a made field goal hands the
    /// ball to the opponent (inbound). The feed does not distinguish
    /// live-ball from dead-ball turnovers, so every turnover counts.
    fn possession_start_for(&self, actor: TeamId, kind: EventKind) -> Option<TeamId> {
        match kind {
            EventKind::ReboundDefensive => Some(actor),
            EventKind::Turnover | EventKind::ShotMade => self.opponent_of(actor),
            _ => None,
        }
    }

    fn opponent_of(&self, team: TeamId) -> Option<TeamId> {
        self.teams.keys().find(|id| **id != team).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::normalize::EventNormalizer;
    use crate::{Config, PlayerId, RawEvent};

    const HOME: TeamId = TeamId(1);
    const AWAY: TeamId = TeamId(2);

    fn event(sequence: u32, period: u32, clock: &str, team: TeamId, action: &str) -> CanonicalEvent {
        let normalizer = EventNormalizer::new(&Config::default().engine);
        normalizer
            .normalize(&RawEvent {
                game_id: GameId("g1".to_string()),
                sequence,
                period: Some(period),
                clock: Some(clock.to_string()),
                action_type: Some(action.to_string()),
                sub_type: if action == "rebound" {
                    Some("defensive".to_string())
                } else {
                    None
                },
                shot_type: None,
                shot_result: if action == "shot" {
                    Some("Made".to_string())
                } else {
                    None
                },
                player_id: Some(PlayerId(10)),
                team_id: Some(team),
                home_score: Some(0),
                away_score: Some(0),
            })
            .unwrap()
    }

    fn tracker() -> StateTracker {
        StateTracker::new(GameId("g1".to_string()), &Config::default().engine).with_teams(HOME, AWAY)
    }

    #[test]
    fn test_foul_counts_accumulate_and_snapshot_is_pre_state() {
        let mut tracker = tracker();

        let pre = tracker.apply(&event(1, 1, "11:00", HOME, "foul")).unwrap();
        assert_eq!(pre.team(HOME).unwrap().period_fouls, 0);
        assert_eq!(tracker.snapshot().team(HOME).unwrap().period_fouls, 1);

        let pre = tracker.apply(&event(2, 1, "10:30", HOME, "foul")).unwrap();
        assert_eq!(pre.team(HOME).unwrap().period_fouls, 1);
        // the snapshot the away team sees reflects the first foul only
        assert_eq!(pre.opponent_fouls(AWAY), 1);
    }

    #[test]
    fn test_foul_counts_reset_each_period() {
        let mut tracker = tracker();
        for sequence in 1..=4 {
            tracker
                .apply(&event(sequence, 1, "06:00", HOME, "foul"))
                .unwrap();
        }
        assert_eq!(tracker.snapshot().team(HOME).unwrap().period_fouls, 4);

        let pre = tracker.apply(&event(5, 2, "12:00", HOME, "foul")).unwrap();
        assert_eq!(pre.team(HOME).unwrap().period_fouls, 0);
        assert_eq!(tracker.snapshot().team(HOME).unwrap().period_fouls, 1);
    }

    #[test]
    fn test_overtime_is_its_own_foul_period() {
        let mut tracker = tracker();
        tracker.apply(&event(1, 4, "00:10", HOME, "foul")).unwrap();
        let pre = tracker.apply(&event(2, 5, "05:00", HOME, "foul")).unwrap();
        assert_eq!(pre.team(HOME).unwrap().period_fouls, 0);
    }

    #[test]
    fn test_defensive_rebound_starts_possession() {
        let mut tracker = tracker();
        tracker
            .apply(&event(1, 1, "10:00", HOME, "rebound"))
            .unwrap();
        let post = tracker.snapshot();
        assert_eq!(post.possession_started_at(HOME), Some(120.0));
        assert_eq!(post.possession_started_at(AWAY), None);
    }

    #[test]
    fn test_made_shot_gives_opponent_possession() {
        let mut tracker = tracker();
        tracker.apply(&event(1, 1, "10:00", HOME, "shot")).unwrap();
        let post = tracker.snapshot();
        assert_eq!(post.possession_started_at(AWAY), Some(120.0));
        assert_eq!(post.possession_started_at(HOME), None);
    }

    #[test]
    fn test_turnover_gives_opponent_possession() {
        let mut tracker = tracker();
        tracker
            .apply(&event(1, 1, "08:00", AWAY, "turnover"))
            .unwrap();
        assert_eq!(tracker.snapshot().possession_started_at(HOME), Some(240.0));
    }

    #[test]
    fn test_possession_resets_at_period_boundary() {
        let mut tracker = tracker();
        tracker
            .apply(&event(1, 1, "00:20", HOME, "rebound"))
            .unwrap();
        tracker.apply(&event(2, 2, "12:00", AWAY, "other")).unwrap();
        assert_eq!(tracker.snapshot().possession_started_at(HOME), None);
    }

    #[test]
    fn test_out_of_order_event_rejected() {
        let mut tracker = tracker();
        tracker.apply(&event(1, 4, "03:00", HOME, "other")).unwrap();
        let result = tracker.apply(&event(2, 4, "03:30", HOME, "other"));
        assert!(matches!(result, Err(ClutchError::OutOfOrderEvent { .. })));
        // tracker state is untouched after the rejection
        assert!(tracker.apply(&event(3, 4, "02:59", HOME, "other")).is_ok());
    }

    #[test]
    fn test_small_backwards_step_within_tolerance() {
        let mut tracker = tracker();
        tracker
            .apply(&event(1, 4, "PT3M0.0S", HOME, "other"))
            .unwrap();
        // 0.4s backwards, inside the 0.5s default tolerance
        assert!(tracker
            .apply(&event(2, 4, "PT3M0.4S", HOME, "other"))
            .is_ok());
    }
}
