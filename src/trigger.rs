//! Time-of-day trigger evaluation with idempotency markers.
//!
//! A delivery fires when the current wall-clock minute matches one of the
//! destination's configured times and the marker for that instant has not
//! been recorded yet. There is no catch-up: a minute missed while the
//! process was down is simply lost (at-most-once).

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::WirdError;

/// A delivery time at hour:minute granularity.
///
/// Serialises as `"HH:MM"` so the state file and config stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    /// Hour of day (0-23).
    pub hour: u8,
    /// Minute of hour (0-59).
    pub minute: u8,
}

impl TimeOfDay {
    /// Build a time of day, rejecting out-of-range components.
    pub fn new(hour: u8, minute: u8) -> crate::Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(WirdError::Config(format!(
                "invalid time of day {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = WirdError;

    fn from_str(s: &str) -> crate::Result<Self> {
        let invalid = || WirdError::Config(format!("invalid time of day `{s}`, expected HH:MM"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which trigger identity the idempotency marker records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerPolicy {
    /// Marker is the fired `HH:MM`. Allows several deliveries per day at
    /// distinct configured times and never double-fires within a minute.
    #[default]
    ExactMinute,
    /// Marker is the calendar date. At most one delivery of the type per
    /// day regardless of how many configured times match.
    OncePerDay,
}

/// The marker identity for `now` under the given policy.
pub fn marker_for(now: NaiveDateTime, policy: MarkerPolicy) -> String {
    match policy {
        MarkerPolicy::ExactMinute => format!("{:02}:{:02}", now.hour(), now.minute()),
        MarkerPolicy::OncePerDay => now.date().format("%Y-%m-%d").to_string(),
    }
}

/// Decide whether a delivery should fire at `now`.
///
/// Returns the marker to record after a successful send, or `None` when
/// the delivery type is inactive, no configured time matches the current
/// minute, or the marker was already recorded for this instant.
pub fn should_fire(
    now: NaiveDateTime,
    times: &BTreeSet<TimeOfDay>,
    active: bool,
    last_marker: Option<&str>,
    policy: MarkerPolicy,
) -> Option<String> {
    if !active {
        return None;
    }

    let minute = TimeOfDay {
        hour: now.hour() as u8,
        minute: now.minute() as u8,
    };
    if !times.contains(&minute) {
        return None;
    }

    let marker = marker_for(now, policy);
    if last_marker == Some(marker.as_str()) {
        return None;
    }
    Some(marker)
}
