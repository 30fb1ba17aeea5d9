//! DORA performance bands.
//!
//! Pure threshold classification from one scalar metric to an ordinal rating
//! plus a badge color. Band edges are part of the external contract and are
//! pinned by tests.

use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Rating {
    Elite,
    High,
    Medium,
    Low,
    None,
}

impl Rating {
    pub fn color(&self) -> &'static str {
        match self {
            Rating::Elite => "brightgreen",
            Rating::High => "green",
            Rating::Medium => "yellow",
            Rating::Low => "red",
            Rating::None => "lightgrey",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rating::Elite => "Elite",
            Rating::High => "High",
            Rating::Medium => "Medium",
            Rating::Low => "Low",
            Rating::None => "None",
        };
        f.write_str(name)
    }
}

const DAILY: f64 = 1.0;
const WEEKLY: f64 = 1.0 / 7.0;
const MONTHLY: f64 = 1.0 / 30.0;
const YEARLY: f64 = 1.0 / 365.0;

/// Classifies a deployments-per-day rate.
pub fn deployment_frequency(per_day: f64) -> Rating {
    if per_day > DAILY {
        Rating::Elite
    } else if (WEEKLY..=DAILY).contains(&per_day) {
        Rating::High
    } else if (MONTHLY..WEEKLY).contains(&per_day) {
        Rating::Medium
    } else if per_day > YEARLY && per_day < MONTHLY {
        Rating::Low
    } else {
        Rating::None
    }
}

const ONE_DAY_HOURS: f64 = 24.0;
const ONE_WEEK_HOURS: f64 = 168.0;
const SIX_MONTHS_HOURS: f64 = 4320.0;

/// Classifies a lead time expressed in hours. Non-positive values mean
/// nothing was measured and rate as `None`.
pub fn lead_time(hours: f64) -> Rating {
    if hours <= 0.0 {
        Rating::None
    } else if hours <= ONE_DAY_HOURS {
        Rating::Elite
    } else if hours <= ONE_WEEK_HOURS {
        Rating::High
    } else if hours <= SIX_MONTHS_HOURS {
        Rating::Medium
    } else {
        Rating::Low
    }
}
