//! Calendar-day arithmetic
//!
//! All dates are timezone-free calendar days (`NaiveDate`). Year and month
//! arithmetic is calendar based; a Feb 29 anchor maps to Feb 28 in common years.

use chrono::{Duration, Months, NaiveDate};

/// Format accepted for every date string in the input
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` string; empty or invalid dates yield `None`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).ok()
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(if days < 0 {
        NaiveDate::MIN
    } else {
        NaiveDate::MAX
    })
}

pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

pub fn sub_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

pub fn add_years(date: NaiveDate, years: u32) -> NaiveDate {
    add_months(date, years.saturating_mul(12))
}

pub fn sub_years(date: NaiveDate, years: u32) -> NaiveDate {
    sub_months(date, years.saturating_mul(12))
}

/// Signed calendar difference `to - from`
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Number of days in the closed range `[start, end]`; zero when empty
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> u32 {
    let span = days_between(start, end) + 1;
    span.max(0) as u32
}

/// Intersection of two closed ranges, if any
pub fn intersect(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    (start <= end).then_some((start, end))
}
