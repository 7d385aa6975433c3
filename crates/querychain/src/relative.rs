//! Dates expressed relative to the moment a filter is evaluated.

use std::fmt;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// A calendar offset from the start of the current UTC day.
///
/// Stored filters keep the offset, not the resolved instant, so a filter
/// saved as "posted since yesterday" keeps meaning that on later days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RelativeDate {
    #[default]
    #[serde(rename = "Today")]
    Today,
    #[serde(rename = "Yesterday")]
    Yesterday,
    #[serde(rename = "One week ago")]
    OneWeekAgo,
    #[serde(rename = "One month ago")]
    OneMonthAgo,
    #[serde(rename = "One year ago")]
    OneYearAgo,
}

impl RelativeDate {
    /// All offsets, nearest first.
    pub const ALL: &'static [RelativeDate] = &[
        RelativeDate::Today,
        RelativeDate::Yesterday,
        RelativeDate::OneWeekAgo,
        RelativeDate::OneMonthAgo,
        RelativeDate::OneYearAgo,
    ];

    /// Resolves against `now`, truncated to the start of its UTC day.
    ///
    /// Returns `None` only when the arithmetic leaves chrono's range.
    pub fn resolve_at(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
        match self {
            RelativeDate::Today => Some(today),
            RelativeDate::Yesterday => today.checked_sub_signed(Duration::days(1)),
            RelativeDate::OneWeekAgo => today.checked_sub_signed(Duration::weeks(1)),
            RelativeDate::OneMonthAgo => today.checked_sub_months(Months::new(1)),
            RelativeDate::OneYearAgo => today.checked_sub_months(Months::new(12)),
        }
    }

    /// Resolves against the current time.
    pub fn resolve(self) -> Option<DateTime<Utc>> {
        self.resolve_at(Utc::now())
    }

    /// Returns the display label.
    pub fn as_str(self) -> &'static str {
        match self {
            RelativeDate::Today => "Today",
            RelativeDate::Yesterday => "Yesterday",
            RelativeDate::OneWeekAgo => "One week ago",
            RelativeDate::OneMonthAgo => "One month ago",
            RelativeDate::OneYearAgo => "One year ago",
        }
    }
}

impl fmt::Display for RelativeDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
