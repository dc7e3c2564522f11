//! NBA clutch-time game-state reconstruction
//!
//! Rebuilds a per-event game-state timeline from play-by-play logs and derives
//! the clutch-time features the hypothesis tests consume.

pub mod data;
pub mod engine;
pub mod stats;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for a game (NBA game ids are strings like "0022300001")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub String);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Game({})", self.0)
    }
}

/// Unique identifier for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Unique identifier for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// One raw play-by-play record, as ingested from the feed.
///
/// Immutable once ingested; the source of truth for everything downstream.
/// `sequence` is assigned in feed order at ingestion and is the stable
/// tie-breaker for same-timestamp events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub game_id: GameId,
    pub sequence: u32,
    pub period: Option<u32>,
    pub clock: Option<String>,
    pub action_type: Option<String>,
    pub sub_type: Option<String>,
    pub shot_type: Option<String>,
    pub shot_result: Option<String>,
    pub player_id: Option<PlayerId>,
    pub team_id: Option<TeamId>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum ClutchError {
    #[error("Malformed event {sequence} in {game_id}: {message}")]
    MalformedEvent {
        game_id: GameId,
        sequence: u32,
        message: String,
    },

    #[error(
        "Out-of-order event {sequence} in {game_id}: elapsed {elapsed:.1}s \
         precedes previous {previous:.1}s beyond tolerance"
    )]
    OutOfOrderEvent {
        game_id: GameId,
        sequence: u32,
        elapsed: f64,
        previous: f64,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, ClutchError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub data: DataConfig,
    pub stats: StatsConfig,
}

/// Tunables for the reconstruction engine.
///
/// Bonus threshold and shot-clock cap are league rules that vary between
/// competitions, so they live here rather than in the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period fouls the opposing team needs for the bonus
    pub bonus_foul_threshold: u32,
    /// Cap for shot_clock_used; longer possessions are flagged as anomalous
    pub shot_clock_max_seconds: f64,
    /// Clutch window size at the end of regulation
    pub clutch_window_seconds: u32,
    /// Permitted backwards slack before an event is rejected as out of order
    pub time_tolerance_seconds: f64,
    /// Periods in regulation play
    pub regulation_period_count: u32,
    /// Length of a regulation period
    pub regulation_period_seconds: f64,
    /// Length of an overtime period
    pub overtime_period_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    /// Directory of playbyplay_<game_id>.json files
    pub raw_dir: String,
    /// Directory of boxscore_<game_id>.json files
    pub boxscore_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Significance level for all hypothesis tests
    pub alpha: f64,
    /// Minimum per-group sample size before a test is attempted
    pub min_sample_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            engine: EngineConfig {
                bonus_foul_threshold: 5,
                shot_clock_max_seconds: 24.0,
                clutch_window_seconds: 180,
                time_tolerance_seconds: 0.5,
                regulation_period_count: 4,
                regulation_period_seconds: 720.0,
                overtime_period_seconds: 300.0,
            },
            data: DataConfig {
                database_path: "data/clutch.db".to_string(),
                raw_dir: "data/raw".to_string(),
                boxscore_dir: "data/boxscores".to_string(),
            },
            stats: StatsConfig {
                alpha: 0.05,
                min_sample_size: 5,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClutchError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| ClutchError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClutchError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
