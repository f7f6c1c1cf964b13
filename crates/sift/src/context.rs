//! Evaluation settings.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings sampled once per evaluation.
///
/// `now` anchors relative-date conditions (`{"daysAgo": n}`), `week_start`
/// decides where weekly date buckets begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Context {
    now: DateTime<Utc>,
    week_start: Weekday,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            now: Utc::now(),
            week_start: Weekday::Mon,
        }
    }
}

impl Context {
    /// Creates a context anchored at the current time.
    pub fn new() -> Self {
        Context::default()
    }

    /// Creates a context anchored at a fixed instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Context::default().with_now(now)
    }

    /// Loads settings from a JSON document. Missing keys keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the reference instant.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Sets the first day of the week.
    pub fn with_week_start(mut self, day: Weekday) -> Self {
        self.week_start = day;
        self
    }

    /// Returns the reference instant.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Returns the first day of the week.
    pub fn week_start(&self) -> Weekday {
        self.week_start
    }
}
