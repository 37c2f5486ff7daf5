//! Commit timestamps
//!
//! Commit timestamps order every document in the catalog. They are compared
//! as instants, but rendered back in the same round-trip form the feed uses,
//! because persisted cursors are compared against the feed's own text.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An offset-aware commit timestamp
///
/// Equality, ordering and hashing compare the instant, so the same moment
/// expressed with two different offsets is one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    /// Parses an ISO-8601 timestamp
    ///
    /// Values without an offset are treated as UTC, matching how the feed
    /// renders older documents.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(s) {
            Ok(value) => Ok(Self(value)),
            Err(rfc_error) => {
                match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                    Ok(naive) => Ok(Self(naive.and_utc().fixed_offset())),
                    Err(_) => Err(rfc_error),
                }
            }
        }
    }

    /// Returns the instant in UTC
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }
}

impl fmt::Display for Timestamp {
    /// Renders `yyyy-MM-ddTHH:mm:ss[.fffffff]+HH:MM`, trimming trailing
    /// fractional zeros
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))?;

        // Leap seconds carry an extra second in the nanosecond field.
        let nanos = self.0.nanosecond() % 1_000_000_000;
        if nanos != 0 {
            let digits = format!("{:09}", nanos);
            write!(f, ".{}", digits.trim_end_matches('0'))?;
        }

        write!(f, "{}", self.0.format("%:z"))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(|e| serde::de::Error::custom(format!("{}: '{}'", e, s)))
    }
}
