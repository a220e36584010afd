//! Calendar arithmetic for report date ranges.
//!
//! Everything here works in UTC. Boundaries are always normalised to the
//! start of their interval before an offset is applied, so "9 months ago"
//! means the first of the month nine months before the reference month.

mod billing;

pub use billing::{BillingCycle, DEFAULT_BILLING_CUTOVER_DAY, MAX_BILLING_MONTHS};

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Format used for every date boundary handed to the database
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Granularity used to group cost rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Year,
    Month,
    Day,
}

impl Default for Interval {
    fn default() -> Self {
        Self::Month
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Month => write!(f, "month"),
            Self::Day => write!(f, "day"),
        }
    }
}

impl std::str::FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "day" => Ok(Self::Day),
            _ => Err(format!("Unknown interval: {}", s)),
        }
    }
}

impl Interval {
    /// The strftime pattern that both groups and labels a date at this
    /// granularity. SQLite's `strftime` and chrono share the same tokens.
    pub fn pattern(&self) -> &'static str {
        match self {
            Self::Year => "%Y",
            Self::Month => "%Y-%m",
            Self::Day => "%Y-%m-%d",
        }
    }

    /// Reset `date` to the first instant of its year, month or day.
    pub fn truncate(&self, date: DateTime<Utc>) -> DateTime<Utc> {
        let day = date.date_naive();
        let start = match self {
            Self::Year => day.with_ordinal(1).unwrap_or(day),
            Self::Month => day.with_day(1).unwrap_or(day),
            Self::Day => day,
        };
        start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Move `date` by `offset` whole intervals. Month and year steps follow
    /// the calendar.
    ///
    /// A step that would leave chrono's representable range returns `date`
    /// unchanged, so callers taking offsets from user input must bound them
    /// first.
    pub fn shift(&self, date: DateTime<Utc>, offset: i32) -> DateTime<Utc> {
        let shifted = match self {
            Self::Year => shift_months(date, offset.saturating_mul(12)),
            Self::Month => shift_months(date, offset),
            Self::Day => date.checked_add_signed(Duration::days(i64::from(offset))),
        };
        shifted.unwrap_or(date)
    }

    /// Truncate `reference` to this interval then apply `offset`.
    pub fn resolve(&self, offset: i32, reference: DateTime<Utc>) -> DateTime<Utc> {
        self.shift(self.truncate(reference), offset)
    }

    /// Label for `date` at this granularity, e.g. `2024-01` for months.
    pub fn label(&self, date: DateTime<Utc>) -> String {
        date.format(self.pattern()).to_string()
    }
}

fn shift_months(date: DateTime<Utc>, months: i32) -> Option<DateTime<Utc>> {
    let step = Months::new(months.unsigned_abs());
    if months < 0 {
        date.checked_sub_months(step)
    } else {
        date.checked_add_months(step)
    }
}

/// Resolve a boundary from a textual unit.
///
/// An unrecognised unit leaves `reference` untouched: no truncation and no
/// offset are applied.
pub fn resolve(unit: &str, offset: i32, reference: DateTime<Utc>) -> DateTime<Utc> {
    match unit.parse::<Interval>() {
        Ok(interval) => interval.resolve(offset, reference),
        Err(_) => reference,
    }
}

/// Truncation pattern for a textual unit, defaulting to months for anything
/// that is not a known interval.
pub fn truncation_pattern(unit: &str) -> &'static str {
    unit.parse::<Interval>().unwrap_or_default().pattern()
}

/// Format a boundary as `YYYY-MM-DD`
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid date: {0}")]
pub struct DateParseError(pub String);

/// Parse `YYYY`, `YYYY-MM`, `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM[:SS]` into a
/// UTC instant. Impossible calendar dates are rejected.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, DateParseError> {
    let invalid = || DateParseError(value.to_string());
    let value = value.trim();

    let day = match value.len() {
        4 => {
            let year: i32 = value.parse().map_err(|_| invalid())?;
            NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?
        }
        7 => NaiveDate::parse_from_str(&format!("{}-01", value), DATE_FORMAT)
            .map_err(|_| invalid())?,
        10 => NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())?,
        _ => {
            let timestamp = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
                .map_err(|_| invalid())?;
            return Ok(timestamp.and_utc());
        }
    };

    Ok(day.and_time(NaiveTime::MIN).and_utc())
}

/// Every bucket label between `start` (inclusive) and `end` (exclusive)
/// after both are truncated to `interval`.
pub fn bucket_labels(start: DateTime<Utc>, end: DateTime<Utc>, interval: Interval) -> Vec<String> {
    let end = interval.truncate(end);
    let mut current = interval.truncate(start);
    let mut labels = Vec::new();

    while current < end {
        labels.push(interval.label(current));
        let next = interval.shift(current, 1);
        if next <= current {
            break;
        }
        current = next;
    }

    labels
}

/// Half-open date range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Build a range from two offsets relative to `reference`, e.g.
    /// `(Month, -9, 0)` covers the nine whole months before this one.
    pub fn relative(
        interval: Interval,
        start_offset: i32,
        end_offset: i32,
        reference: DateTime<Utc>,
    ) -> Self {
        Self {
            start: interval.resolve(start_offset, reference),
            end: interval.resolve(end_offset, reference),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn start_date(&self) -> String {
        format_date(self.start)
    }

    pub fn end_date(&self) -> String {
        format_date(self.end)
    }

    pub fn labels(&self, interval: Interval) -> Vec<String> {
        bucket_labels(self.start, self.end, interval)
    }
}
