//! Play-by-play and boxscore ingestion
//!
//! Parses the NBA liveData JSON shapes from local files:
//! `playbyplay_<game_id>.json` for the event stream and
//! `boxscore_<game_id>.json` for the top-scorer lookup. Ingestion sequence
//! numbers are assigned in feed order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::derive::GameStaticFacts;
use crate::engine::table::GameInput;
use crate::{ClutchError, GameId, PlayerId, RawEvent, Result, TeamId};

#[derive(Debug, Deserialize)]
struct LiveFile {
    game: LiveGame,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveGame {
    game_id: String,
    #[serde(default)]
    actions: Vec<LiveAction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveAction {
    period: Option<u32>,
    clock: Option<String>,
    action_type: Option<String>,
    sub_type: Option<String>,
    shot_type: Option<String>,
    shot_result: Option<String>,
    person_id: Option<i64>,
    team_id: Option<i64>,
    home_score: Option<u32>,
    away_score: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BoxscoreFile {
    game: BoxscoreGame,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoxscoreGame {
    game_id: String,
    home_team: Option<BoxscoreTeam>,
    away_team: Option<BoxscoreTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoxscoreTeam {
    team_id: i64,
    #[serde(default)]
    players: Vec<BoxscorePlayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoxscorePlayer {
    person_id: i64,
    statistics: Option<PlayerStatistics>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerStatistics {
    #[serde(default)]
    points: u32,
}

/// Parse a liveData play-by-play document into raw events
pub fn parse_play_by_play(json: &str) -> Result<(GameId, Vec<RawEvent>)> {
    let file: LiveFile = serde_json::from_str(json)?;
    let game_id = GameId(file.game.game_id);

    let events = file
        .game
        .actions
        .into_iter()
        .enumerate()
        .map(|(index, action)| RawEvent {
            game_id: game_id.clone(),
            sequence: index as u32,
            period: action.period,
            clock: action.clock,
            action_type: action.action_type,
            sub_type: action.sub_type,
            shot_type: action.shot_type,
            shot_result: action.shot_result,
            // personId 0 marks team-level actions with no acting player
            player_id: action.person_id.filter(|id| *id != 0).map(PlayerId),
            team_id: action.team_id.map(TeamId),
            home_score: action.home_score,
            away_score: action.away_score,
        })
        .collect();

    Ok((game_id, events))
}

/// Parse a liveData boxscore document into per-game static facts.
///
/// The top scorer per team is the player with the most points; ties keep
/// the first listed player so re-ingestion is deterministic.
pub fn parse_boxscore(json: &str) -> Result<(GameId, GameStaticFacts)> {
    let file: BoxscoreFile = serde_json::from_str(json)?;
    let game_id = GameId(file.game.game_id);

    let mut facts = GameStaticFacts::default();
    let mut top_scorers = HashMap::new();

    for (team, slot) in [
        (file.game.home_team, &mut facts.home_team),
        (file.game.away_team, &mut facts.away_team),
    ] {
        if let Some(team) = team {
            let team_id = TeamId(team.team_id);
            *slot = Some(team_id);
            // min_by with a reversed comparison keeps the first listed
            // player on ties (max_by would keep the last)
            let top = team
                .players
                .iter()
                .min_by(|a, b| points_of(b).cmp(&points_of(a)));
            if let Some(player) = top {
                top_scorers.insert(team_id, PlayerId(player.person_id));
            }
        }
    }

    facts.top_scorers = top_scorers;
    Ok((game_id, facts))
}

fn points_of(player: &BoxscorePlayer) -> u32 {
    player.statistics.as_ref().map(|s| s.points).unwrap_or(0)
}

/// Load one play-by-play file
pub fn load_play_by_play(path: &Path) -> Result<(GameId, Vec<RawEvent>)> {
    let content = std::fs::read_to_string(path)?;
    parse_play_by_play(&content)
        .map_err(|e| ClutchError::Parse(format!("{}: {}", path.display(), e)))
}

/// Load one boxscore file
pub fn load_boxscore(path: &Path) -> Result<(GameId, GameStaticFacts)> {
    let content = std::fs::read_to_string(path)?;
    parse_boxscore(&content).map_err(|e| ClutchError::Parse(format!("{}: {}", path.display(), e)))
}

/// Play-by-play files under a raw data directory, sorted for determinism
pub fn scan_raw_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("playbyplay_") && n.ends_with(".json"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Inputs assembled from disk, plus the games whose files could not be read.
///
/// An unreadable file is reported with the game id recovered from its
/// filename so the caller can record a failed build for that game.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub inputs: Vec<GameInput>,
    pub unreadable: Vec<(GameId, ClutchError)>,
}

fn game_id_from_path(path: &Path) -> GameId {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    GameId(stem.strip_prefix("playbyplay_").unwrap_or(stem).to_string())
}

/// Assemble engine inputs from a raw directory plus an optional boxscore
/// directory. A game without a boxscore file still builds; its table just
/// carries the missing-top-scorer flag. A file that fails to parse loses
/// that game only, never the rest of the load.
pub fn load_game_inputs(raw_dir: &Path, boxscore_dir: &Path) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for path in scan_raw_dir(raw_dir)? {
        let (game_id, events) = match load_play_by_play(&path) {
            Ok(parsed) => parsed,
            Err(error) => {
                log::warn!("skipping unreadable {}: {}", path.display(), error);
                report.unreadable.push((game_id_from_path(&path), error));
                continue;
            }
        };

        let boxscore_path = boxscore_dir.join(format!("boxscore_{}.json", game_id.0));
        let facts = if boxscore_path.exists() {
            match load_boxscore(&boxscore_path) {
                Ok((boxscore_game, facts)) if boxscore_game == game_id => facts,
                Ok((boxscore_game, _)) => {
                    log::warn!(
                        "boxscore {} does not match {}, ignoring it",
                        boxscore_game,
                        game_id
                    );
                    GameStaticFacts::default()
                }
                Err(error) => {
                    log::warn!(
                        "unreadable boxscore for {}, clutch attribution degraded: {}",
                        game_id,
                        error
                    );
                    GameStaticFacts::default()
                }
            }
        } else {
            log::debug!("no boxscore for {}, clutch attribution degraded", game_id);
            GameStaticFacts::default()
        };

        report.inputs.push(GameInput {
            game_id,
            events,
            facts,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PBP_JSON: &str = r#"{
        "game": {
            "gameId": "0022300001",
            "actions": [
                {"period": 4, "clock": "PT2M50.00S", "actionType": "shot",
                 "shotType": "3pt", "shotResult": "Made",
                 "personId": 23, "teamId": 100,
                 "homeScore": 98, "awayScore": 98},
                {"period": 4, "clock": "PT2M40.00S", "actionType": "rebound",
                 "subType": "defensive", "personId": 0, "teamId": 200,
                 "homeScore": 98, "awayScore": 98}
            ]
        }
    }"#;

    const BOXSCORE_JSON: &str = r#"{
        "game": {
            "gameId": "0022300001",
            "homeTeam": {"teamId": 100, "players": [
                {"personId": 23, "statistics": {"points": 31}},
                {"personId": 7, "statistics": {"points": 12}}
            ]},
            "awayTeam": {"teamId": 200, "players": [
                {"personId": 30, "statistics": {"points": 28}}
            ]}
        }
    }"#;

    #[test]
    fn test_parse_play_by_play() {
        let (game_id, events) = parse_play_by_play(PBP_JSON).unwrap();
        assert_eq!(game_id, GameId("0022300001".to_string()));
        assert_eq!(events.len(), 2);

        let shot = &events[0];
        assert_eq!(shot.sequence, 0);
        assert_eq!(shot.player_id, Some(PlayerId(23)));
        assert_eq!(shot.team_id, Some(TeamId(100)));
        assert_eq!(shot.home_score, Some(98));

        // personId 0 is a team-level action, not a player
        assert_eq!(events[1].player_id, None);
        assert_eq!(events[1].sub_type.as_deref(), Some("defensive"));
    }

    #[test]
    fn test_parse_boxscore_top_scorers() {
        let (game_id, facts) = parse_boxscore(BOXSCORE_JSON).unwrap();
        assert_eq!(game_id, GameId("0022300001".to_string()));
        assert_eq!(facts.home_team, Some(TeamId(100)));
        assert_eq!(facts.away_team, Some(TeamId(200)));
        assert_eq!(facts.top_scorers.get(&TeamId(100)), Some(&PlayerId(23)));
        assert_eq!(facts.top_scorers.get(&TeamId(200)), Some(&PlayerId(30)));
        assert!(facts.top_scorers_resolved());
    }

    #[test]
    fn test_parse_play_by_play_rejects_bad_json() {
        assert!(parse_play_by_play("{").is_err());
        assert!(parse_play_by_play(r#"{"game": {}}"#).is_err());
    }

    #[test]
    fn test_corrupt_file_loses_one_game_not_the_load() {
        let dir = std::env::temp_dir().join("clutch_test_corrupt_pbp");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("playbyplay_0022300001.json"), PBP_JSON).unwrap();
        std::fs::write(dir.join("playbyplay_0022300002.json"), "{ not json").unwrap();

        let report = load_game_inputs(&dir, &dir).unwrap();
        assert_eq!(report.inputs.len(), 1);
        assert_eq!(report.inputs[0].game_id, GameId("0022300001".to_string()));
        assert_eq!(report.unreadable.len(), 1);
        assert_eq!(report.unreadable[0].0, GameId("0022300002".to_string()));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_boxscore_degrades_to_default_facts() {
        let dir = std::env::temp_dir().join("clutch_test_corrupt_boxscore");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("playbyplay_0022300001.json"), PBP_JSON).unwrap();
        std::fs::write(dir.join("boxscore_0022300001.json"), "{ not json").unwrap();

        let report = load_game_inputs(&dir, &dir).unwrap();
        assert_eq!(report.inputs.len(), 1);
        assert!(report.unreadable.is_empty());
        assert!(!report.inputs[0].facts.top_scorers_resolved());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_actions_is_empty_stream() {
        let (_, events) = parse_play_by_play(r#"{"game": {"gameId": "x"}}"#).unwrap();
        assert!(events.is_empty());
    }
}
