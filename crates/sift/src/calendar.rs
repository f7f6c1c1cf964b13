//! Calendar helpers: reading timestamps out of JSON values, relative days
//! and truncation to the start of a calendar unit.
//!
//! All arithmetic happens in UTC.

use chrono::{
    DateTime, Datelike, Days, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc,
    Weekday,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reads a value as an instant.
///
/// Accepts epoch milliseconds, RFC 3339 strings, `YYYY-MM-DD` dates and
/// `YYYY-MM-DDTHH:MM:SS` naive datetimes (taken as UTC). Anything else is
/// not a date.
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = match n.as_i64() {
                Some(ms) => ms,
                None => n.as_f64().filter(|f| f.is_finite())?.floor() as i64,
            };
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::String(s) => parse_instant_str(s),
        _ => None,
    }
}

fn parse_instant_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Returns the instant `days` days before `now`. Negative values look ahead.
pub fn days_ago(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    if days >= 0 {
        now.checked_sub_days(Days::new(days.unsigned_abs()))
    } else {
        now.checked_add_days(Days::new(days.unsigned_abs()))
    }
}

/// Calendar day (UTC) of an instant, for day-granularity comparisons.
pub fn day_of(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Formats an instant the way bucket keys carry dates.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Calendar unit used for date bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateUnit {
    /// Start of the hour.
    Hour,
    /// Midnight.
    Day,
    /// Midnight on the first day of the week.
    Week,
    /// Midnight on the first of the month.
    Month,
    /// Midnight on January 1st.
    Year,
}

impl DateUnit {
    /// Truncates an instant to the start of this unit.
    ///
    /// `week_start` only matters for [`DateUnit::Week`].
    pub fn truncate(self, instant: DateTime<Utc>, week_start: Weekday) -> Option<DateTime<Utc>> {
        let date = instant.date_naive();
        let start = match self {
            Self::Hour => date.and_hms_opt(instant.hour(), 0, 0)?,
            Self::Day => date.and_hms_opt(0, 0, 0)?,
            Self::Week => {
                let offset = (7 + date.weekday().num_days_from_monday()
                    - week_start.num_days_from_monday())
                    % 7;
                date.checked_sub_days(Days::new(u64::from(offset)))?
                    .and_hms_opt(0, 0, 0)?
            }
            Self::Month => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)?
            }
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
        };
        Some(start.and_utc())
    }

    /// Returns the display name of this unit.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl std::fmt::Display for DateUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
