//! Event normalization
//!
//! Converts raw feed records into canonical typed events with the clock
//! expressed as seconds remaining in the period.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{ClutchError, EngineConfig, GameId, PlayerId, RawEvent, Result, TeamId};

/// Closed enumeration of play-by-play event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    ShotMade,
    ShotMissed,
    FreeThrowMade,
    FreeThrowMissed,
    Foul,
    ReboundOffensive,
    ReboundDefensive,
    Turnover,
    Timeout,
    Substitution,
    Other,
}

impl EventKind {
    /// Scoring attempts (field goals and free throws)
    pub fn is_shot_attempt(&self) -> bool {
        matches!(
            self,
            EventKind::ShotMade
                | EventKind::ShotMissed
                | EventKind::FreeThrowMade
                | EventKind::FreeThrowMissed
        )
    }

    pub fn is_made_shot(&self) -> bool {
        matches!(self, EventKind::ShotMade | EventKind::FreeThrowMade)
    }

    pub fn code(&self) -> &'static str {
        match self {
            EventKind::ShotMade => "shot_made",
            EventKind::ShotMissed => "shot_missed",
            EventKind::FreeThrowMade => "ft_made",
            EventKind::FreeThrowMissed => "ft_missed",
            EventKind::Foul => "foul",
            EventKind::ReboundOffensive => "rebound_off",
            EventKind::ReboundDefensive => "rebound_def",
            EventKind::Turnover => "turnover",
            EventKind::Timeout => "timeout",
            EventKind::Substitution => "substitution",
            EventKind::Other => "other",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "shot_made" => Some(EventKind::ShotMade),
            "shot_missed" => Some(EventKind::ShotMissed),
            "ft_made" => Some(EventKind::FreeThrowMade),
            "ft_missed" => Some(EventKind::FreeThrowMissed),
            "foul" => Some(EventKind::Foul),
            "rebound_off" => Some(EventKind::ReboundOffensive),
            "rebound_def" => Some(EventKind::ReboundDefensive),
            "turnover" => Some(EventKind::Turnover),
            "timeout" => Some(EventKind::Timeout),
            "substitution" => Some(EventKind::Substitution),
            "other" => Some(EventKind::Other),
            _ => None,
        }
    }
}

/// Shot bucket used by the hypothesis tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShotCategory {
    Two,
    Three,
    FreeThrow,
}

impl ShotCategory {
    pub fn code(&self) -> &'static str {
        match self {
            ShotCategory::Two => "2PT",
            ShotCategory::Three => "3PT",
            ShotCategory::FreeThrow => "FT",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "2PT" => Some(ShotCategory::Two),
            "3PT" => Some(ShotCategory::Three),
            "FT" => Some(ShotCategory::FreeThrow),
            _ => None,
        }
    }
}

/// A normalized play-by-play event.
///
/// `seconds_remaining` is non-increasing within a period; `elapsed_seconds`
/// is the monotone game clock across periods, used for ordering and
/// possession timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub game_id: GameId,
    pub sequence: u32,
    pub period: u32,
    pub seconds_remaining: f64,
    pub elapsed_seconds: f64,
    pub kind: EventKind,
    pub shot_category: Option<ShotCategory>,
    pub player_id: Option<PlayerId>,
    pub team_id: Option<TeamId>,
    pub home_score: u32,
    pub away_score: u32,
    /// True when the raw clock fell outside the period and was clamped
    pub clock_clamped: bool,
}

/// Pure RawEvent -> CanonicalEvent converter
pub struct EventNormalizer {
    regulation_period_count: u32,
    regulation_period_seconds: f64,
    overtime_period_seconds: f64,
}

impl EventNormalizer {
    pub fn new(config: &EngineConfig) -> Self {
        EventNormalizer {
            regulation_period_count: config.regulation_period_count,
            regulation_period_seconds: config.regulation_period_seconds,
            overtime_period_seconds: config.overtime_period_seconds,
        }
    }

    /// Length of the given period in seconds
    pub fn period_length(&self, period: u32) -> f64 {
        if period <= self.regulation_period_count {
            self.regulation_period_seconds
        } else {
            self.overtime_period_seconds
        }
    }

    /// Game seconds elapsed at `seconds_remaining` within `period`
    pub fn elapsed_seconds(&self, period: u32, seconds_remaining: f64) -> f64 {
        let mut elapsed = 0.0;
        for p in 1..period {
            elapsed += self.period_length(p);
        }
        elapsed + self.period_length(period) - seconds_remaining
    }

    /// Normalize one raw event.
    ///
    /// Fails with `MalformedEvent` when period, clock or the score pair is
    /// missing, or the clock string cannot be parsed.
    pub fn normalize(&self, raw: &RawEvent) -> Result<CanonicalEvent> {
        let malformed = |message: String| ClutchError::MalformedEvent {
            game_id: raw.game_id.clone(),
            sequence: raw.sequence,
            message,
        };

        let period = raw
            .period
            .ok_or_else(|| malformed("missing period".to_string()))?;
        if period == 0 {
            return Err(malformed("period must be >= 1".to_string()));
        }

        let clock = raw
            .clock
            .as_deref()
            .ok_or_else(|| malformed("missing clock".to_string()))?;
        let raw_seconds = parse_clock(clock)
            .ok_or_else(|| malformed(format!("unparseable clock '{}'", clock)))?;

        let home_score = raw
            .home_score
            .ok_or_else(|| malformed("missing home score".to_string()))?;
        let away_score = raw
            .away_score
            .ok_or_else(|| malformed("missing away score".to_string()))?;

        // Out-of-range clocks are clamped with a warning, not rejected.
        let period_len = self.period_length(period);
        let mut clock_clamped = false;
        let seconds_remaining = if raw_seconds > period_len {
            clock_clamped = true;
            log::warn!(
                "{} event {}: clock {:.1}s exceeds period length {:.0}s, clamping",
                raw.game_id,
                raw.sequence,
                raw_seconds,
                period_len
            );
            period_len
        } else {
            raw_seconds
        };

        let kind = classify_kind(raw);
        let shot_category = classify_shot(kind, raw.shot_type.as_deref(), raw.action_type.as_deref());

        Ok(CanonicalEvent {
            game_id: raw.game_id.clone(),
            sequence: raw.sequence,
            period,
            seconds_remaining,
            elapsed_seconds: self.elapsed_seconds(period, seconds_remaining),
            kind,
            shot_category,
            player_id: raw.player_id,
            team_id: raw.team_id,
            home_score,
            away_score,
            clock_clamped,
        })
    }
}

/// Parse a game clock string into seconds remaining in the period.
///
/// Handles the two observed feed formats, ISO-duration ('PT2M34.00S') and
/// 'MM:SS', plus a bare-seconds fallback. Returns None when unparseable.
pub fn parse_clock(clock: &str) -> Option<f64> {
    let clock = clock.trim();
    if clock.is_empty() {
        return None;
    }

    if let Some(rest) = clock.strip_prefix("PT") {
        let minutes_re = Regex::new(r"(\d+)M").unwrap();
        let seconds_re = Regex::new(r"(\d+(?:\.\d+)?)S").unwrap();

        let minutes: f64 = minutes_re
            .captures(rest)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0.0);
        let seconds: f64 = seconds_re
            .captures(rest)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0.0);

        if minutes_re.is_match(rest) || seconds_re.is_match(rest) {
            return Some(minutes * 60.0 + seconds);
        }
        return None;
    }

    if let Some((minutes, seconds)) = clock.split_once(':') {
        let minutes: f64 = minutes.trim().parse().ok()?;
        let seconds: f64 = seconds.trim().parse().ok()?;
        if minutes < 0.0 || seconds < 0.0 {
            return None;
        }
        return Some(minutes * 60.0 + seconds);
    }

    clock.parse::<f64>().ok().filter(|s| *s >= 0.0)
}

fn classify_kind(raw: &RawEvent) -> EventKind {
    let action = raw
        .action_type
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    let sub = raw.sub_type.as_deref().unwrap_or("").to_ascii_lowercase();
    let made = raw
        .shot_result
        .as_deref()
        .map(|r| r.eq_ignore_ascii_case("made"))
        .unwrap_or(false);

    match action.as_str() {
        "shot" | "2pt" | "3pt" => {
            if made {
                EventKind::ShotMade
            } else {
                EventKind::ShotMissed
            }
        }
        "freethrow" => {
            if made {
                EventKind::FreeThrowMade
            } else {
                EventKind::FreeThrowMissed
            }
        }
        "foul" => EventKind::Foul,
        "rebound" => {
            if sub.contains("offensive") {
                EventKind::ReboundOffensive
            } else if sub.contains("defensive") {
                EventKind::ReboundDefensive
            } else {
                EventKind::Other
            }
        }
        "turnover" => EventKind::Turnover,
        "timeout" => EventKind::Timeout,
        "substitution" => EventKind::Substitution,
        _ => EventKind::Other,
    }
}

fn classify_shot(
    kind: EventKind,
    shot_type: Option<&str>,
    action_type: Option<&str>,
) -> Option<ShotCategory> {
    if !kind.is_shot_attempt() {
        return None;
    }
    if matches!(kind, EventKind::FreeThrowMade | EventKind::FreeThrowMissed) {
        return Some(ShotCategory::FreeThrow);
    }
    // the feed carries the arc either in shotType ("3pt") or, in the newer
    // shape, directly in actionType
    let shot_type = shot_type.unwrap_or("").to_ascii_uppercase();
    let action_type = action_type.unwrap_or("").to_ascii_uppercase();
    if shot_type.contains('3') || action_type.contains('3') {
        Some(ShotCategory::Three)
    } else {
        Some(ShotCategory::Two)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sequence: u32) -> RawEvent {
        RawEvent {
            game_id: GameId("0022300001".to_string()),
            sequence,
            period: Some(4),
            clock: Some("PT2M34.00S".to_string()),
            action_type: Some("shot".to_string()),
            sub_type: None,
            shot_type: Some("3pt".to_string()),
            shot_result: Some("Made".to_string()),
            player_id: Some(PlayerId(23)),
            team_id: Some(TeamId(1610612747)),
            home_score: Some(98),
            away_score: Some(95),
        }
    }

    fn normalizer() -> EventNormalizer {
        EventNormalizer::new(&crate::Config::default().engine)
    }

    #[test]
    fn test_parse_clock_iso_duration() {
        assert_eq!(parse_clock("PT2M34.00S"), Some(154.0));
        assert_eq!(parse_clock("PT12M"), Some(720.0));
        assert_eq!(parse_clock("PT0.50S"), Some(0.5));
    }

    #[test]
    fn test_parse_clock_mm_ss() {
        assert_eq!(parse_clock("02:34"), Some(154.0));
        assert_eq!(parse_clock("0:05"), Some(5.0));
        assert_eq!(parse_clock("12:00"), Some(720.0));
    }

    #[test]
    fn test_parse_clock_bare_and_invalid() {
        assert_eq!(parse_clock("154"), Some(154.0));
        assert_eq!(parse_clock(""), None);
        assert_eq!(parse_clock("abc"), None);
        assert_eq!(parse_clock("-5"), None);
    }

    #[test]
    fn test_normalize_shot_made() {
        let event = normalizer().normalize(&raw(1)).unwrap();
        assert_eq!(event.kind, EventKind::ShotMade);
        assert_eq!(event.shot_category, Some(ShotCategory::Three));
        assert!((event.seconds_remaining - 154.0).abs() < 1e-9);
        // three full quarters plus elapsed part of the fourth
        assert!((event.elapsed_seconds - (3.0 * 720.0 + 720.0 - 154.0)).abs() < 1e-9);
        assert!(!event.clock_clamped);
    }

    #[test]
    fn test_normalize_missing_fields() {
        let normalizer = normalizer();

        let mut event = raw(1);
        event.period = None;
        assert!(matches!(
            normalizer.normalize(&event),
            Err(ClutchError::MalformedEvent { .. })
        ));

        let mut event = raw(2);
        event.clock = None;
        assert!(normalizer.normalize(&event).is_err());

        let mut event = raw(3);
        event.home_score = None;
        assert!(normalizer.normalize(&event).is_err());

        let mut event = raw(4);
        event.clock = Some("not a clock".to_string());
        assert!(normalizer.normalize(&event).is_err());
    }

    #[test]
    fn test_normalize_clamps_out_of_range_clock() {
        let mut event = raw(1);
        event.clock = Some("PT20M0S".to_string());
        let canonical = normalizer().normalize(&event).unwrap();
        assert!((canonical.seconds_remaining - 720.0).abs() < 1e-9);
        assert!(canonical.clock_clamped);
    }

    #[test]
    fn test_overtime_period_length() {
        let normalizer = normalizer();
        assert!((normalizer.period_length(4) - 720.0).abs() < 1e-9);
        assert!((normalizer.period_length(5) - 300.0).abs() < 1e-9);
        // start of first overtime equals end of regulation
        assert!((normalizer.elapsed_seconds(5, 300.0) - 4.0 * 720.0).abs() < 1e-9);
    }

    #[test]
    fn test_classify_rebounds() {
        let mut event = raw(1);
        event.action_type = Some("rebound".to_string());
        event.shot_type = None;
        event.shot_result = None;

        event.sub_type = Some("defensive".to_string());
        assert_eq!(
            normalizer().normalize(&event).unwrap().kind,
            EventKind::ReboundDefensive
        );

        event.sub_type = Some("offensive".to_string());
        assert_eq!(
            normalizer().normalize(&event).unwrap().kind,
            EventKind::ReboundOffensive
        );

        // untyped rebounds carry no possession information
        event.sub_type = None;
        assert_eq!(normalizer().normalize(&event).unwrap().kind, EventKind::Other);
    }

    #[test]
    fn test_free_throw_category() {
        let mut event = raw(1);
        event.action_type = Some("freethrow".to_string());
        event.shot_type = None;
        event.shot_result = Some("Missed".to_string());
        let canonical = normalizer().normalize(&event).unwrap();
        assert_eq!(canonical.kind, EventKind::FreeThrowMissed);
        assert_eq!(canonical.shot_category, Some(ShotCategory::FreeThrow));
    }
}
