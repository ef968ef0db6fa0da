/// Shared types used across the codebase

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Two-state lifecycle tag carried by every gradebook record.
/// `Tobedeleted` is a tombstone: stored, but invisible to every read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Active,
    Tobedeleted,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Active => "active",
            LifecycleStatus::Tobedeleted => "tobedeleted",
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LifecycleStatus::Active),
            "tobedeleted" => Ok(LifecycleStatus::Tobedeleted),
            other => Err(format!("unknown lifecycle status '{}'", other)),
        }
    }
}

/// Canonical timestamp text: fixed-width UTC with millisecond precision, so
/// lexical order equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accept RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_round_trip_text() {
        assert_eq!("active".parse::<LifecycleStatus>().unwrap(), LifecycleStatus::Active);
        assert_eq!(LifecycleStatus::Tobedeleted.as_str(), "tobedeleted");
        assert!("deleted".parse::<LifecycleStatus>().is_err());
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T00:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T01:00:00+01:00").unwrap(), expected);
        assert!(parse_timestamp("March 1st").is_none());
    }

    #[test]
    fn test_format_is_lexically_ordered() {
        let a = format_timestamp(&Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        let b = format_timestamp(&Utc.with_ymd_and_hms(2024, 11, 2, 3, 4, 5).unwrap());
        assert_eq!(a, "2024-01-02T03:04:05.000Z");
        assert!(a < b);
    }
}
