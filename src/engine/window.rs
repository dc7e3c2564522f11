//! Clutch-window selection and temporal bucketing
//!
//! The clutch window is the last 180 seconds of the final regulation period
//! plus every overtime period.

use serde::{Deserialize, Serialize};

use crate::engine::table::GameStateTable;

/// 30-second buckets over the clutch window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeBin {
    S0To30,
    S31To60,
    S61To90,
    S91To120,
    S121To150,
    S151To180,
    Overtime,
    /// Outside the clutch window (earlier periods or > 180s remaining)
    Outside,
}

impl TimeBin {
    /// Bucket an event by period and seconds remaining
    pub fn for_event(period: u32, seconds_remaining: f64, regulation_period_count: u32) -> Self {
        if period > regulation_period_count {
            return TimeBin::Overtime;
        }
        if period < regulation_period_count {
            return TimeBin::Outside;
        }
        match seconds_remaining {
            s if s <= 30.0 => TimeBin::S0To30,
            s if s <= 60.0 => TimeBin::S31To60,
            s if s <= 90.0 => TimeBin::S61To90,
            s if s <= 120.0 => TimeBin::S91To120,
            s if s <= 150.0 => TimeBin::S121To150,
            s if s <= 180.0 => TimeBin::S151To180,
            _ => TimeBin::Outside,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeBin::S0To30 => "0-30s",
            TimeBin::S31To60 => "31-60s",
            TimeBin::S61To90 => "61-90s",
            TimeBin::S91To120 => "91-120s",
            TimeBin::S121To150 => "121-150s",
            TimeBin::S151To180 => "151-180s",
            TimeBin::Overtime => "overtime",
            TimeBin::Outside => "outside",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "0-30s" => Some(TimeBin::S0To30),
            "31-60s" => Some(TimeBin::S31To60),
            "61-90s" => Some(TimeBin::S61To90),
            "91-120s" => Some(TimeBin::S91To120),
            "121-150s" => Some(TimeBin::S121To150),
            "151-180s" => Some(TimeBin::S151To180),
            "overtime" => Some(TimeBin::Overtime),
            "outside" => Some(TimeBin::Outside),
            _ => None,
        }
    }
}

/// Select the clutch subsequence of a table.
///
/// Includes every event of the final regulation period with at most
/// `clutch_window_seconds` remaining, plus every overtime event. Preserves
/// the original order and never mutates the input.
pub fn select_clutch(
    table: &GameStateTable,
    regulation_period_count: u32,
    clutch_window_seconds: u32,
) -> GameStateTable {
    let window = clutch_window_seconds as f64;
    let events = table
        .events()
        .iter()
        .filter(|e| {
            let period = e.event.period;
            (period == regulation_period_count && e.event.seconds_remaining <= window)
                || period > regulation_period_count
        })
        .cloned()
        .collect();
    table.with_events(events)
}
