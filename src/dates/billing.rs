//! Billing month resolution.
//!
//! Cost data arrives up to a month late, and the previous month is not
//! considered complete until the cutover day. Before the cutover the
//! current billing month is two months behind the calendar, on or after it
//! the billing month is one month behind.

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;

use super::{DateRange, Interval};

/// Day of month on which the previous month's costs are treated as final
pub const DEFAULT_BILLING_CUTOVER_DAY: u32 = 15;

/// Longest window `range` will produce
pub const MAX_BILLING_MONTHS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BillingCycle {
    pub cutover_day: u32,
}

impl Default for BillingCycle {
    fn default() -> Self {
        Self {
            cutover_day: DEFAULT_BILLING_CUTOVER_DAY,
        }
    }
}

impl BillingCycle {
    pub fn new(cutover_day: u32) -> Self {
        Self { cutover_day }
    }

    /// Months between the reference month and the current billing month
    pub fn offset_months(&self, reference: DateTime<Utc>) -> i32 {
        if reference.day() < self.cutover_day {
            -2
        } else {
            -1
        }
    }

    /// First day of the current billing month
    pub fn current_month(&self, reference: DateTime<Utc>) -> DateTime<Utc> {
        Interval::Month.resolve(self.offset_months(reference), reference)
    }

    /// First day of the billing month, moved by `modifier` further months
    pub fn start_date(&self, reference: DateTime<Utc>, modifier: i32) -> DateTime<Utc> {
        Interval::Month.shift(self.current_month(reference), modifier)
    }

    /// Exclusive upper bound: the first day of the month after the billing
    /// month, moved by `modifier` further months
    pub fn end_date(&self, reference: DateTime<Utc>, modifier: i32) -> DateTime<Utc> {
        Interval::Month.shift(self.current_month(reference), modifier.saturating_add(1))
    }

    /// The `months` billing months up to and including the current one.
    /// `months` is clamped to `1..=MAX_BILLING_MONTHS`.
    pub fn range(&self, reference: DateTime<Utc>, months: u32) -> DateRange {
        let back = months.clamp(1, MAX_BILLING_MONTHS) as i32 - 1;
        DateRange::new(
            self.start_date(reference, -back),
            self.end_date(reference, 0),
        )
    }
}
