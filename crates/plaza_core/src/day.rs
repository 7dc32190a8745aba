//! Calendar day of the simulated world.
//!
//! Days travel through the engine as `YYYY-MM-DD` strings. Anything that does
//! not match that shape, or names a date that does not exist, is rejected.

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static ISO_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid day pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DayError {
    #[error("day '{0}' is not in YYYY-MM-DD form")]
    Malformed(String),
    #[error("day '{0}' is not a calendar date")]
    NotADate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorldDay(NaiveDate);

impl WorldDay {
    pub fn parse(raw: &str) -> Result<Self, DayError> {
        let s = raw.trim();
        if !ISO_DAY.is_match(s) {
            return Err(DayError::Malformed(s.to_string()));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(WorldDay)
            .map_err(|_| DayError::NotADate(s.to_string()))
    }

    /// Today's date on the host clock. Only a last-resort fallback.
    pub fn today() -> Self {
        WorldDay(Local::now().date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        WorldDay(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for WorldDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for WorldDay {
    type Err = DayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorldDay::parse(s)
    }
}

impl Serialize for WorldDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WorldDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        WorldDay::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_day() {
        let d = WorldDay::parse(" 2026-03-09 ").unwrap();
        assert_eq!(d.to_string(), "2026-03-09");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(matches!(WorldDay::parse("2026-3-9"), Err(DayError::Malformed(_))));
        assert!(matches!(WorldDay::parse(""), Err(DayError::Malformed(_))));
        assert!(matches!(WorldDay::parse("2026-03-09T00:00"), Err(DayError::Malformed(_))));
        assert!(matches!(WorldDay::parse("2026-02-30"), Err(DayError::NotADate(_))));
    }

    #[test]
    fn test_serde_as_string() {
        let d = WorldDay::parse("2025-12-31").unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"2025-12-31\"");
        let back: WorldDay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert!(serde_json::from_str::<WorldDay>("\"12/31/2025\"").is_err());
    }
}
