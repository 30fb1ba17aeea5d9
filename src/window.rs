//! Time window computation for a single run.
//!
//! The window is computed once at startup from a caller-supplied time frame
//! (`"30"` or `"30d"` for days, `"4w"` for weeks) and never changes while the
//! run is in flight.

use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

/// A trailing duration expressed in whole days.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeFrame {
    days: i64,
}

impl TimeFrame {
    pub fn days(days: i64) -> Self {
        Self { days }
    }

    pub fn num_days(&self) -> i64 {
        self.days
    }
}

impl Default for TimeFrame {
    fn default() -> Self {
        Self { days: 30 }
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
            Some((idx, _)) => s.split_at(idx),
            None => (s, ""),
        };

        let value: i64 = number
            .parse()
            .map_err(|_| format!("unparsable time frame '{s}'"))?;
        if value <= 0 {
            return Err(format!("time frame must be positive, got '{s}'"));
        }

        match unit.trim() {
            "" | "d" | "day" | "days" => Ok(Self { days: value }),
            "w" | "week" | "weeks" => Ok(Self { days: value * 7 }),
            other => Err(format!("unknown time frame unit '{other}'")),
        }
    }
}

/// The trailing range `[start, end]` over which items are aggregated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Computes the window ending at `now` and starting `frame` earlier.
    pub fn trailing(frame: TimeFrame, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(frame.num_days()),
            end: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}
