//! SQLite persistence for materialized game-state tables

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::engine::derive::EnrichedEvent;
use crate::engine::normalize::{CanonicalEvent, EventKind, ShotCategory};
use crate::engine::table::{DataQualityFlags, GameBuildResult, GameStateTable};
use crate::engine::window::TimeBin;
use crate::{GameId, PlayerId, Result, TeamId};

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                game_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                final_score_diff INTEGER NOT NULL DEFAULT 0,
                event_count INTEGER NOT NULL DEFAULT 0,
                malformed_skipped INTEGER NOT NULL DEFAULT 0,
                missing_top_scorer INTEGER NOT NULL DEFAULT 0,
                shot_clock_anomalies INTEGER NOT NULL DEFAULT 0,
                clocks_clamped INTEGER NOT NULL DEFAULT 0,
                error TEXT
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL REFERENCES games(game_id),
                sequence INTEGER NOT NULL,
                period INTEGER NOT NULL,
                seconds_remaining REAL NOT NULL,
                elapsed_seconds REAL NOT NULL,
                kind TEXT NOT NULL,
                shot_category TEXT,
                player_id INTEGER,
                team_id INTEGER,
                home_score INTEGER NOT NULL,
                away_score INTEGER NOT NULL,
                clock_clamped INTEGER NOT NULL,
                score_diff INTEGER NOT NULL,
                in_bonus INTEGER NOT NULL,
                possession_duration REAL,
                shot_clock_used REAL,
                shot_clock_anomaly INTEGER NOT NULL,
                is_clutch_player_event INTEGER NOT NULL,
                final_score_diff INTEGER NOT NULL,
                time_bin TEXT NOT NULL,
                UNIQUE(game_id, sequence)
            );

            CREATE INDEX IF NOT EXISTS idx_events_game ON events(game_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Game Operations ====================

    /// Store a build result, replacing any previous rows for the game
    pub fn store_result(&mut self, result: &GameBuildResult) -> Result<()> {
        match result {
            GameBuildResult::Success(table) | GameBuildResult::Partial(table) => {
                self.store_table(table, result.status_label())
            }
            GameBuildResult::Failed { game_id, error } => {
                self.conn.execute(
                    "DELETE FROM events WHERE game_id = ?1",
                    params![game_id.0],
                )?;
                self.conn.execute(
                    r#"
                    INSERT INTO games (game_id, status, error)
                    VALUES (?1, 'failed', ?2)
                    ON CONFLICT(game_id) DO UPDATE SET
                        status = 'failed',
                        final_score_diff = 0,
                        event_count = 0,
                        error = excluded.error
                    "#,
                    params![game_id.0, error.to_string()],
                )?;
                Ok(())
            }
        }
    }

    /// Store a materialized table, replacing any previous rows for the game
    pub fn store_table(&mut self, table: &GameStateTable, status: &str) -> Result<()> {
        let flags = table.flags();
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM events WHERE game_id = ?1",
            params![table.game_id().0],
        )?;
        tx.execute(
            r#"
            INSERT INTO games (game_id, status, final_score_diff, event_count,
                               malformed_skipped, missing_top_scorer,
                               shot_clock_anomalies, clocks_clamped, error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)
            ON CONFLICT(game_id) DO UPDATE SET
                status = excluded.status,
                final_score_diff = excluded.final_score_diff,
                event_count = excluded.event_count,
                malformed_skipped = excluded.malformed_skipped,
                missing_top_scorer = excluded.missing_top_scorer,
                shot_clock_anomalies = excluded.shot_clock_anomalies,
                clocks_clamped = excluded.clocks_clamped,
                error = NULL
            "#,
            params![
                table.game_id().0,
                status,
                table.final_score_diff(),
                table.len() as i64,
                flags.malformed_skipped,
                flags.missing_top_scorer,
                flags.shot_clock_anomalies,
                flags.clocks_clamped,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO events (game_id, sequence, period, seconds_remaining,
                                    elapsed_seconds, kind, shot_category, player_id,
                                    team_id, home_score, away_score, clock_clamped,
                                    score_diff, in_bonus, possession_duration,
                                    shot_clock_used, shot_clock_anomaly,
                                    is_clutch_player_event, final_score_diff, time_bin)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                        ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                "#,
            )?;
            for record in table.events() {
                let event = &record.event;
                stmt.execute(params![
                    event.game_id.0,
                    event.sequence,
                    event.period,
                    event.seconds_remaining,
                    event.elapsed_seconds,
                    event.kind.code(),
                    event.shot_category.map(|c| c.code()),
                    event.player_id.map(|p| p.0),
                    event.team_id.map(|t| t.0),
                    event.home_score,
                    event.away_score,
                    event.clock_clamped,
                    record.score_diff,
                    record.in_bonus,
                    record.possession_duration,
                    record.shot_clock_used,
                    record.shot_clock_anomaly,
                    record.is_clutch_player_event,
                    record.final_score_diff,
                    record.time_bin.label(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Load one game's table; None when the game is unknown or failed
    pub fn load_table(&self, game_id: &GameId) -> Result<Option<GameStateTable>> {
        let header: Option<(String, DataQualityFlags)> = self
            .conn
            .query_row(
                "SELECT status, malformed_skipped, missing_top_scorer,
                        shot_clock_anomalies, clocks_clamped
                 FROM games WHERE game_id = ?1",
                params![game_id.0],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        DataQualityFlags {
                            malformed_skipped: row.get(1)?,
                            missing_top_scorer: row.get(2)?,
                            shot_clock_anomalies: row.get(3)?,
                            clocks_clamped: row.get(4)?,
                        },
                    ))
                },
            )
            .optional()?;

        let (status, flags) = match header {
            Some(header) => header,
            None => return Ok(None),
        };
        if status == "failed" {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT sequence, period, seconds_remaining, elapsed_seconds, kind,
                    shot_category, player_id, team_id, home_score, away_score,
                    clock_clamped, score_diff, in_bonus, possession_duration,
                    shot_clock_used, shot_clock_anomaly, is_clutch_player_event,
                    final_score_diff, time_bin
             FROM events WHERE game_id = ?1 ORDER BY sequence",
        )?;

        let events = stmt
            .query_map(params![game_id.0], |row| Self::row_to_event(game_id, row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(GameStateTable::new(game_id.clone(), events, flags)))
    }

    /// All stored games with their build status
    pub fn list_games(&self) -> Result<Vec<(GameId, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT game_id, status FROM games ORDER BY game_id")?;
        let games = stmt
            .query_map([], |row| {
                Ok((GameId(row.get(0)?), row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    fn row_to_event(game_id: &GameId, row: &rusqlite::Row) -> rusqlite::Result<EnrichedEvent> {
        let kind_code: String = row.get(4)?;
        let shot_code: Option<String> = row.get(5)?;
        let bin_label: String = row.get(18)?;

        Ok(EnrichedEvent {
            event: CanonicalEvent {
                game_id: game_id.clone(),
                sequence: row.get(0)?,
                period: row.get(1)?,
                seconds_remaining: row.get(2)?,
                elapsed_seconds: row.get(3)?,
                kind: EventKind::from_code(&kind_code).unwrap_or(EventKind::Other),
                shot_category: shot_code.as_deref().and_then(ShotCategory::from_code),
                player_id: row.get::<_, Option<i64>>(6)?.map(PlayerId),
                team_id: row.get::<_, Option<i64>>(7)?.map(TeamId),
                home_score: row.get(8)?,
                away_score: row.get(9)?,
                clock_clamped: row.get(10)?,
            },
            score_diff: row.get(11)?,
            in_bonus: row.get(12)?,
            possession_duration: row.get(13)?,
            shot_clock_used: row.get(14)?,
            shot_clock_anomaly: row.get(15)?,
            is_clutch_player_event: row.get(16)?,
            final_score_diff: row.get(17)?,
            time_bin: TimeBin::from_label(&bin_label).unwrap_or(TimeBin::Outside),
        })
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let game_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        let event_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        let failed_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM games WHERE status = 'failed'",
            [],
            |row| row.get(0),
        )?;

        Ok(DatabaseStats {
            game_count: game_count as usize,
            event_count: event_count as usize,
            failed_count: failed_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub game_count: usize,
    pub event_count: usize,
    pub failed_count: usize,
}
