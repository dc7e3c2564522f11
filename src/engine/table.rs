//! GameStateTable materialization
//!
//! Two-pass construction per game: pass 1 folds the tracker and deriver over
//! the ordered event stream, pass 2 back-fills `final_score_diff` once the
//! full stream has been observed. Final outcome is only known at end of
//! game, so a true one-pass mode cannot offer this field.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::derive::{EnrichedEvent, FeatureDeriver, GameStaticFacts};
use crate::engine::normalize::EventNormalizer;
use crate::engine::tracker::StateTracker;
use crate::{ClutchError, EngineConfig, GameId, RawEvent};

/// Non-fatal data-quality conditions observed while building a game's table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityFlags {
    /// Malformed events skipped during normalization
    pub malformed_skipped: u32,
    /// Top scorer unresolved; clutch-player attribution degraded to false
    pub missing_top_scorer: bool,
    /// Possessions that exceeded the shot-clock maximum
    pub shot_clock_anomalies: u32,
    /// Clocks clamped into the period range
    pub clocks_clamped: u32,
}

impl DataQualityFlags {
    pub fn is_clean(&self) -> bool {
        self.malformed_skipped == 0
            && !self.missing_top_scorer
            && self.shot_clock_anomalies == 0
            && self.clocks_clamped == 0
    }
}

/// The immutable output artifact: one game's ordered enriched events.
///
/// Append-only during construction, never mutated after; downstream
/// consumers (windower, hypothesis tests) read it concurrently without
/// coordination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateTable {
    game_id: GameId,
    events: Vec<EnrichedEvent>,
    flags: DataQualityFlags,
}

impl GameStateTable {
    pub fn new(game_id: GameId, events: Vec<EnrichedEvent>, flags: DataQualityFlags) -> Self {
        GameStateTable {
            game_id,
            events,
            flags,
        }
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn events(&self) -> &[EnrichedEvent] {
        &self.events
    }

    pub fn flags(&self) -> DataQualityFlags {
        self.flags
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Score differential at the last event (0 for an empty table)
    pub fn final_score_diff(&self) -> i32 {
        self.events.last().map(|e| e.final_score_diff).unwrap_or(0)
    }

    /// Same table metadata over a filtered subsequence (used by the windower)
    pub fn with_events(&self, events: Vec<EnrichedEvent>) -> Self {
        GameStateTable {
            game_id: self.game_id.clone(),
            events,
            flags: self.flags,
        }
    }
}

/// Outcome of building one game's table.
///
/// A Partial table is usable but carries data-quality flags; a Failed game
/// produced no table (ordering violation) and should be excluded or
/// re-fetched.
#[derive(Debug)]
pub enum GameBuildResult {
    Success(GameStateTable),
    Partial(GameStateTable),
    Failed { game_id: GameId, error: ClutchError },
}

impl GameBuildResult {
    pub fn game_id(&self) -> &GameId {
        match self {
            GameBuildResult::Success(table) | GameBuildResult::Partial(table) => table.game_id(),
            GameBuildResult::Failed { game_id, .. } => game_id,
        }
    }

    /// The materialized table, if the game did not fail
    pub fn table(&self) -> Option<&GameStateTable> {
        match self {
            GameBuildResult::Success(table) | GameBuildResult::Partial(table) => Some(table),
            GameBuildResult::Failed { .. } => None,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            GameBuildResult::Success(_) => "success",
            GameBuildResult::Partial(_) => "partial",
            GameBuildResult::Failed { .. } => "failed",
        }
    }
}

/// Results of a batch run over many games
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<GameBuildResult>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, GameBuildResult::Success(_)))
            .count()
    }

    pub fn partial(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, GameBuildResult::Partial(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, GameBuildResult::Failed { .. }))
            .count()
    }

    pub fn tables(&self) -> impl Iterator<Item = &GameStateTable> {
        self.results.iter().filter_map(|r| r.table())
    }
}

/// Input for building one game's table
#[derive(Debug)]
pub struct GameInput {
    pub game_id: GameId,
    pub events: Vec<RawEvent>,
    pub facts: GameStaticFacts,
}

/// Builds GameStateTables from raw event streams
pub struct TableBuilder {
    config: EngineConfig,
}

impl TableBuilder {
    pub fn new(config: &EngineConfig) -> Self {
        TableBuilder {
            config: config.clone(),
        }
    }

    /// Build one game's table.
    ///
    /// Per-event malformation is recovered locally (skip, log, flag); an
    /// ordering violation aborts this game only and surfaces as Failed.
    pub fn build_game(
        &self,
        game_id: GameId,
        mut events: Vec<RawEvent>,
        facts: &GameStaticFacts,
    ) -> GameBuildResult {
        let normalizer = EventNormalizer::new(&self.config);
        let deriver = FeatureDeriver::new(&self.config);
        let mut tracker = StateTracker::new(game_id.clone(), &self.config);
        if let (Some(home), Some(away)) = (facts.home_team, facts.away_team) {
            tracker = tracker.with_teams(home, away);
        }

        // Input ordering is a precondition; the ingestion sequence number is
        // the stable tie-breaker for same-timestamp events.
        events.sort_by_key(|e| e.sequence);

        let mut flags = DataQualityFlags {
            missing_top_scorer: !facts.top_scorers_resolved(),
            ..DataQualityFlags::default()
        };

        // Pass 1: fold the tracker and deriver over the stream.
        let mut enriched: Vec<EnrichedEvent> = Vec::with_capacity(events.len());
        for raw in &events {
            let canonical = match normalizer.normalize(raw) {
                Ok(canonical) => canonical,
                Err(e) => {
                    log::warn!("skipping malformed event: {}", e);
                    flags.malformed_skipped += 1;
                    continue;
                }
            };
            if canonical.clock_clamped {
                flags.clocks_clamped += 1;
            }

            let pre = match tracker.apply(&canonical) {
                Ok(pre) => pre,
                Err(error) => {
                    log::error!("aborting {}: {}", game_id, error);
                    return GameBuildResult::Failed { game_id, error };
                }
            };

            let record = deriver.derive(&canonical, &pre, &tracker.snapshot(), facts);
            if record.shot_clock_anomaly {
                flags.shot_clock_anomalies += 1;
            }
            enriched.push(record);
        }

        // Pass 2: back-fill the final score differential onto every record.
        let final_score_diff = enriched.last().map(|e| e.score_diff).unwrap_or(0);
        for record in &mut enriched {
            record.final_score_diff = final_score_diff;
        }

        let clean = flags.is_clean();
        let table = GameStateTable::new(game_id, enriched, flags);
        if clean {
            GameBuildResult::Success(table)
        } else {
            GameBuildResult::Partial(table)
        }
    }

    /// Build many games. Games are independent (one tracker each), so the
    /// batch runs them in parallel; a failed game never aborts the batch.
    pub fn build_batch(&self, games: Vec<GameInput>) -> BatchOutcome {
        let mut results: Vec<GameBuildResult> = games
            .into_par_iter()
            .map(|game| self.build_game(game.game_id, game.events, &game.facts))
            .collect();
        results.sort_by(|a, b| a.game_id().cmp(b.game_id()));
        BatchOutcome { results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, PlayerId, TeamId};
    use std::collections::HashMap;

    const HOME: TeamId = TeamId(1);
    const AWAY: TeamId = TeamId(2);

    fn raw(
        sequence: u32,
        period: u32,
        clock: &str,
        team: TeamId,
        action: &str,
        scores: (u32, u32),
    ) -> RawEvent {
        RawEvent {
            game_id: GameId("g1".to_string()),
            sequence,
            period: Some(period),
            clock: Some(clock.to_string()),
            action_type: Some(action.to_string()),
            sub_type: None,
            shot_type: None,
            shot_result: if action == "shot" {
                Some("Made".to_string())
            } else {
                None
            },
            player_id: Some(PlayerId(23)),
            team_id: Some(team),
            home_score: Some(scores.0),
            away_score: Some(scores.1),
        }
    }

    fn facts() -> GameStaticFacts {
        GameStaticFacts {
            home_team: Some(HOME),
            away_team: Some(AWAY),
            top_scorers: HashMap::from([(HOME, PlayerId(23)), (AWAY, PlayerId(30))]),
        }
    }

    fn builder() -> TableBuilder {
        TableBuilder::new(&Config::default().engine)
    }

    fn game_events() -> Vec<RawEvent> {
        vec![
            raw(1, 4, "03:00", HOME, "shot", (96, 95)),
            raw(2, 4, "02:00", AWAY, "shot", (96, 97)),
            raw(3, 4, "00:30", HOME, "shot", (98, 97)),
        ]
    }

    #[test]
    fn test_final_score_diff_backfilled_on_every_event() {
        let result = builder().build_game(GameId("g1".to_string()), game_events(), &facts());
        let table = result.table().unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.events().iter().all(|e| e.final_score_diff == 1));
        assert_eq!(table.final_score_diff(), 1);
        // last event's own diff matches the back-filled value
        assert_eq!(table.events().last().unwrap().score_diff, 1);
    }

    #[test]
    fn test_malformed_event_skipped_and_flagged() {
        let mut events = game_events();
        events[1].clock = None;
        let result = builder().build_game(GameId("g1".to_string()), events, &facts());
        assert_eq!(result.status_label(), "partial");
        let table = result.table().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.flags().malformed_skipped, 1);
    }

    #[test]
    fn test_out_of_order_fails_the_game() {
        let mut events = game_events();
        // sequence says this comes last, but its clock jumps backwards
        events.push(raw(4, 4, "02:30", HOME, "shot", (100, 97)));
        let result = builder().build_game(GameId("g1".to_string()), events, &facts());
        assert_eq!(result.status_label(), "failed");
        assert!(result.table().is_none());
        assert!(matches!(
            result,
            GameBuildResult::Failed {
                error: ClutchError::OutOfOrderEvent { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_missing_top_scorer_is_partial_not_failed() {
        let facts = GameStaticFacts {
            home_team: Some(HOME),
            away_team: Some(AWAY),
            top_scorers: HashMap::new(),
        };
        let result = builder().build_game(GameId("g1".to_string()), game_events(), &facts);
        assert_eq!(result.status_label(), "partial");
        let table = result.table().unwrap();
        assert!(table.flags().missing_top_scorer);
        assert!(table.events().iter().all(|e| !e.is_clutch_player_event));
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let a = builder().build_game(GameId("g1".to_string()), game_events(), &facts());
        let b = builder().build_game(GameId("g1".to_string()), game_events(), &facts());
        let a = serde_json::to_vec(a.table().unwrap()).unwrap();
        let b = serde_json::to_vec(b.table().unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_batch_isolates_failures() {
        let good = GameInput {
            game_id: GameId("g1".to_string()),
            events: game_events(),
            facts: facts(),
        };
        let mut bad_events = game_events();
        bad_events.push(raw(4, 4, "02:30", HOME, "shot", (100, 97)));
        let bad = GameInput {
            game_id: GameId("g2".to_string()),
            events: bad_events,
            facts: facts(),
        };

        let outcome = builder().build_batch(vec![good, bad]);
        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.tables().count(), 1);
    }

    #[test]
    fn test_empty_game_builds_empty_table() {
        let result = builder().build_game(GameId("g1".to_string()), vec![], &facts());
        let table = result.table().unwrap();
        assert!(table.is_empty());
        assert_eq!(table.final_score_diff(), 0);
    }
}
